// Data sizes and types
pub type Word = u32;
pub const WORD_SIZE_BYTES: usize = std::mem::size_of::<Word>();
pub const SEGMENT_HEADER_WORDS: usize = 2; // word count (+2), module index
pub const HEX_DUMP_WORDS: usize = 100;
pub const HEX_DUMP_WORDS_PER_ROW: usize = 10;

// Event header bit fields (bit ranges are inclusive-exclusive over an Lsb0 word)
pub const CHANNEL_BITS: std::ops::Range<usize> = 0..4;
pub const SLOT_BITS: std::ops::Range<usize> = 4..8;
pub const EVENT_SIZE_BITS: std::ops::Range<usize> = 17..31;
pub const VIRTUAL_CHANNEL_BIT: usize = 29;
pub const MAX_EVENT_WORDS: usize = (1 << 14) - 1; // largest size the header can carry

// Electronics constants
pub const NUMBER_OF_CHANNELS: usize = 16; // per module
pub const DEFAULT_FIFO_LENGTH: u32 = 131_072; // words
pub const DEFAULT_FIRST_SLOT: u32 = 2;

// Timing between hardware calls
pub const DEFAULT_POLL_TRIES: u32 = 100;
pub const DEFAULT_END_RUN_PAUSE_US: u64 = 100;
pub const DEFAULT_PARTIAL_WAIT_SLEEP_US: u64 = 15;
pub const DEFAULT_PARTIAL_WAIT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_IDLE_WAIT_MS: u64 = 10;
pub const DEFAULT_DIAGNOSTIC_SECONDS: u64 = 10;
pub const DIAGNOSTIC_TICK_MS: u64 = 50;
