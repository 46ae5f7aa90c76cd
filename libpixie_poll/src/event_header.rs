use bitvec::prelude::*;

use super::constants::*;

/// The decoded first word of a digitizer event record.
///
/// Bit layout of the header word (Lsb0):
///
/// ```text
/// [0:3]   channel number
/// [4:7]   slot number
/// [17:30] event size in words, header included
/// 29      virtual channel flag (shares a bit with the event size field)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub channel: u32,
    pub slot: u32,
    pub event_size: u32,
    pub virtual_channel: bool,
}

impl EventHeader {
    /// Decode the bit fields of a header word
    pub fn decode(word: Word) -> Self {
        let bits = word.view_bits::<Lsb0>();
        Self {
            channel: bits[CHANNEL_BITS].load_le::<u32>(),
            slot: bits[SLOT_BITS].load_le::<u32>(),
            event_size: bits[EVENT_SIZE_BITS].load_le::<u32>(),
            virtual_channel: bits[VIRTUAL_CHANNEL_BIT],
        }
    }

    /// Pack the fields back into a header word. Fields are truncated to their bit widths.
    pub fn encode(&self) -> Word {
        let mut word: Word = 0;
        let bits = word.view_bits_mut::<Lsb0>();
        bits[CHANNEL_BITS].store_le(self.channel);
        bits[SLOT_BITS].store_le(self.slot);
        bits[EVENT_SIZE_BITS].store_le(self.event_size);
        if self.virtual_channel {
            bits.set(VIRTUAL_CHANNEL_BIT, true);
        }
        word
    }

    /// Size of the whole event record in bytes
    pub fn byte_length(&self) -> usize {
        self.event_size as usize * WORD_SIZE_BYTES
    }
}
