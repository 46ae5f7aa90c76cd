use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("Failed to start list mode run; try rebooting the crate")]
    StartFailed,
    #[error("Failed to end the run")]
    EndRunFailed,
    #[error("Failed to start a diagnostic run")]
    DiagnosticFailed,
    #[error("Failed to read {requested} words from the FIFO of module {module}")]
    ReadFailed { module: usize, requested: usize },
    #[error("Failed to query the run status of module {0}")]
    StatusFailed(usize),
    #[error("Failed to boot the crate: {0}")]
    BootFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventParseError {
    #[error("Slot read ({read}) not the same as slot expected ({expected}) at word {offset} of module {module}")]
    SlotMismatch {
        module: usize,
        offset: usize,
        read: u32,
        expected: u32,
    },
    #[error("Zero event size at word {offset} of module {module}")]
    ZeroEventSize { module: usize, offset: usize },
}

impl EventParseError {
    /// Word offset into the module segment of the rejected event header. Every word
    /// before it belongs to a validated event.
    pub fn offset(&self) -> usize {
        match self {
            Self::SlotMismatch { offset, .. } => *offset,
            Self::ZeroEventSize { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpillError {
    #[error("Spill buffer overflow: {requested} words requested with capacity {capacity}")]
    Overflow { requested: usize, capacity: usize },
}

#[derive(Debug, Error)]
pub enum ReassemblyError {
    #[error("Timed out waiting for {missing} words from module {module}; only {available} available")]
    Timeout {
        module: usize,
        missing: usize,
        available: i64,
    },
    #[error("Reassembly failed due to hardware error: {0}")]
    Hardware(#[from] HardwareError),
    #[error("Reassembly failed due to spill error: {0}")]
    Spill(#[from] SpillError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Output directory {0:?} does not exist")]
    BadDirectory(PathBuf),
    #[error("Could not resolve broadcast address {0}")]
    BadAddress(String),
    #[error("Sink failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Threshold of {0} words must be less than the FIFO length of {1} words")]
    InvalidThreshold(u32, u32),
    #[error("FIFO length must be nonzero")]
    InvalidFifoLength,
    #[error("Number of poll tries must be at least 1")]
    InvalidPollTries,
}

/// Failures inside a single spill cycle. None of these escape the acquisition loop;
/// each one is converted into a forced stop of the run.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Really full FIFO in module {module}: {words}/{capacity} words")]
    FifoOverflow {
        module: usize,
        words: i64,
        capacity: u32,
    },
    #[error("Parsing indicated corrupted data: {0}")]
    CorruptData(#[from] EventParseError),
    #[error("Acquisition failed due to hardware error: {0}")]
    Hardware(#[from] HardwareError),
    #[error("Acquisition failed to complete a partial event: {0}")]
    Reassembly(#[from] ReassemblyError),
    #[error("Acquisition failed due to spill error: {0}")]
    Spill(#[from] SpillError),
    #[error("Acquisition failed to write spill: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Acquisition thread is no longer accepting commands")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Poll failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Poll failed due to sink error: {0}")]
    SinkError(#[from] SinkError),
    #[error("Poll found no modules in the crate")]
    NoModules,
    #[error("Poll failed to spawn the acquisition thread: {0}")]
    IOError(#[from] std::io::Error),
}
