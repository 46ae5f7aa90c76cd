use std::fmt::Write;

use super::constants::{Word, HEX_DUMP_WORDS_PER_ROW};
use super::error::EventParseError;
use super::event_header::EventHeader;

/// An event at the end of a segment whose tail has not been read from the FIFO yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialEvent {
    /// Offset of the event header within the segment
    pub event_offset: usize,
    pub event_size: usize,
    pub missing_words: usize,
}

impl PartialEvent {
    /// Words of the event which are already in the segment
    pub fn present_words(&self) -> usize {
        self.event_size - self.missing_words
    }
}

/// Result of a successful walk over a module segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentReport {
    pub events: usize,
    pub consumed: usize,
    pub partial: Option<PartialEvent>,
}

/// EventStreamValidator walks one module's FIFO words event by event.
///
/// Each event header must carry the slot of the module and a nonzero size, and the
/// events must tile the words exactly. A final event which runs past the end of the
/// words is not an error; it is reported as a PartialEvent so the rest can be read.
#[derive(Debug, Clone, Copy)]
pub struct EventStreamValidator {
    module: usize,
    expected_slot: u32,
}

impl EventStreamValidator {
    pub fn new(module: usize, expected_slot: u32) -> Self {
        Self {
            module,
            expected_slot,
        }
    }

    pub fn module(&self) -> usize {
        self.module
    }

    /// Validate the words of one segment.
    ///
    /// `on_event` is called for every accepted non-virtual event, in order. A partial
    /// event is not reported; that is left to whoever completes it. On error the events
    /// before the rejected offset have already been accepted and reported.
    pub fn validate<F>(&self, words: &[Word], mut on_event: F) -> Result<SegmentReport, EventParseError>
    where
        F: FnMut(&EventHeader),
    {
        let mut offset: usize = 0;
        let mut events: usize = 0;
        let mut last_size: usize = 0;
        while offset < words.len() {
            let header = EventHeader::decode(words[offset]);
            if header.slot != self.expected_slot {
                return Err(EventParseError::SlotMismatch {
                    module: self.module,
                    offset,
                    read: header.slot,
                    expected: self.expected_slot,
                });
            } else if header.event_size == 0 {
                return Err(EventParseError::ZeroEventSize {
                    module: self.module,
                    offset,
                });
            }

            last_size = header.event_size as usize;
            if !header.virtual_channel && offset + last_size <= words.len() {
                on_event(&header);
            }
            events += 1;
            offset += last_size;
        }

        let partial = if offset > words.len() {
            Some(PartialEvent {
                event_offset: offset - last_size,
                event_size: last_size,
                missing_words: offset - words.len(),
            })
        } else {
            None
        };

        Ok(SegmentReport {
            events,
            consumed: offset,
            partial,
        })
    }
}

/// Format words as hex, HEX_DUMP_WORDS_PER_ROW to a row
pub fn hex_dump(words: &[Word]) -> String {
    let mut dump = String::new();
    for (idx, word) in words.iter().enumerate() {
        if idx % HEX_DUMP_WORDS_PER_ROW == 0 {
            dump.push_str("\n\t");
        }
        let _ = write!(dump, "{word:x} ");
    }
    dump
}
