use super::constants::{Word, SEGMENT_HEADER_WORDS};
use super::error::SpillError;

/// A completed spill, handed off to a sink once every module has been harvested.
///
/// The words are an ordered sequence of module segments, each one prefixed by
/// `[data words + 2, module index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spill {
    pub index: u64,
    pub words: Vec<Word>,
}

impl Spill {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Location of one module segment within a SpillBuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub module: usize,
    header: usize,
}

impl Segment {
    fn data_start(&self) -> usize {
        self.header + SEGMENT_HEADER_WORDS
    }
}

/// The buffer a spill is assembled into during one cycle.
///
/// The capacity is fixed at creation from the FIFO length and module count and is never
/// exceeded; writes past it fail with `SpillError::Overflow`.
#[derive(Debug)]
pub struct SpillBuffer {
    words: Vec<Word>,
    capacity: usize,
}

impl SpillBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    fn reserve(&self, extra: usize) -> Result<(), SpillError> {
        let requested = self.words.len() + extra;
        if requested > self.capacity {
            Err(SpillError::Overflow {
                requested,
                capacity: self.capacity,
            })
        } else {
            Ok(())
        }
    }

    /// Write the two word header of a module which had nothing to read
    pub fn push_empty_segment(&mut self, module: usize) -> Result<(), SpillError> {
        self.reserve(SEGMENT_HEADER_WORDS)?;
        self.words.push(SEGMENT_HEADER_WORDS as Word);
        self.words.push(module as Word);
        Ok(())
    }

    /// Write a segment header and reserve `n_words` zeroed data words behind it
    pub fn begin_segment(&mut self, module: usize, n_words: usize) -> Result<Segment, SpillError> {
        self.reserve(SEGMENT_HEADER_WORDS + n_words)?;
        let header = self.words.len();
        self.words.push((n_words + SEGMENT_HEADER_WORDS) as Word);
        self.words.push(module as Word);
        self.words.resize(self.words.len() + n_words, 0);
        Ok(Segment { module, header })
    }

    pub fn segment_data(&self, segment: &Segment) -> &[Word] {
        &self.words[segment.data_start()..]
    }

    pub fn segment_data_mut(&mut self, segment: &Segment) -> &mut [Word] {
        let start = segment.data_start();
        &mut self.words[start..]
    }

    /// Declared word count of the segment (data words plus header)
    pub fn segment_header_count(&self, segment: &Segment) -> Word {
        self.words[segment.header]
    }

    /// Append `extra` zeroed words to the segment, which must be the last one written,
    /// and correct its header. Returns the newly appended words.
    pub fn extend_segment(
        &mut self,
        segment: &Segment,
        extra: usize,
    ) -> Result<&mut [Word], SpillError> {
        self.reserve(extra)?;
        let old_len = self.words.len();
        self.words.resize(old_len + extra, 0);
        self.words[segment.header] = (self.words.len() - segment.header) as Word;
        Ok(&mut self.words[old_len..])
    }

    /// Shrink the segment to its first `keep` data words and correct its header
    pub fn truncate_segment(&mut self, segment: &Segment, keep: usize) {
        let end = segment.data_start() + keep;
        if end < self.words.len() {
            self.words.truncate(end);
        }
        self.words[segment.header] = (self.words.len() - segment.header) as Word;
    }

    /// Remove the segment, header included
    pub fn discard_segment(&mut self, segment: Segment) {
        self.words.truncate(segment.header);
    }

    /// Hand the assembled words off as a Spill. The buffer is left empty.
    pub fn finish(&mut self, index: u64) -> Spill {
        Spill {
            index,
            words: std::mem::take(&mut self.words),
        }
    }

    /// Take back the allocation of a spill that a sink is done with
    pub fn recycle(&mut self, spill: Spill) {
        let mut words = spill.words;
        words.clear();
        if words.capacity() >= self.words.capacity() {
            self.words = words;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_in_order() {
        let mut buffer = SpillBuffer::new(100);
        let seg = buffer.begin_segment(0, 3).unwrap();
        buffer.segment_data_mut(&seg).copy_from_slice(&[7, 8, 9]);
        buffer.push_empty_segment(1).unwrap();
        assert_eq!(buffer.words(), &[5, 0, 7, 8, 9, 2, 1]);
    }

    #[test]
    fn test_extend_fixes_header() {
        let mut buffer = SpillBuffer::new(100);
        let seg = buffer.begin_segment(3, 4).unwrap();
        let tail = buffer.extend_segment(&seg, 2).unwrap();
        tail.copy_from_slice(&[1, 1]);
        assert_eq!(buffer.segment_header_count(&seg), 8);
        assert_eq!(buffer.segment_data(&seg).len(), 6);
    }

    #[test]
    fn test_truncate_and_discard() {
        let mut buffer = SpillBuffer::new(100);
        buffer.push_empty_segment(0).unwrap();
        let seg = buffer.begin_segment(1, 10).unwrap();
        buffer.truncate_segment(&seg, 4);
        assert_eq!(buffer.segment_header_count(&seg), 6);
        assert_eq!(buffer.len(), 8);
        buffer.discard_segment(seg);
        assert_eq!(buffer.words(), &[2, 0]);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut buffer = SpillBuffer::new(10);
        assert!(buffer.begin_segment(0, 8).is_ok());
        match buffer.push_empty_segment(1) {
            Err(SpillError::Overflow {
                requested: 12,
                capacity: 10,
            }) => (),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_finish_hands_off() {
        let mut buffer = SpillBuffer::new(10);
        buffer.push_empty_segment(0).unwrap();
        let spill = buffer.finish(4);
        assert_eq!(spill.index, 4);
        assert_eq!(spill.words, vec![2, 0]);
        assert!(buffer.is_empty());
        buffer.recycle(spill);
        assert!(buffer.is_empty());
    }
}
