use super::constants::Word;
use super::error::HardwareError;

/// The interface to a crate of digitizer modules.
///
/// Implementations wrap the vendor driver (or a simulation of it). All calls are
/// synchronous and are only ever made from the acquisition thread, so no two calls for
/// the same module are ever in flight at once.
pub trait HardwareFifoSource {
    /// Number of modules discovered in the crate
    fn module_count(&self) -> usize;

    /// Backplane slot the given module is expected to report in its event headers
    fn slot_number(&self, module: usize) -> u32;

    /// Words waiting in the FIFO of a module. Negative values signal a driver error.
    fn word_count(&mut self, module: usize) -> i64;

    /// Read exactly `dest.len()` words out of the FIFO of a module
    fn read_words(&mut self, module: usize, dest: &mut [Word]) -> Result<(), HardwareError>;

    /// Start a new list mode run in every module
    fn start_run(&mut self) -> Result<(), HardwareError>;

    /// End the active run (list mode or diagnostic) in every module
    fn end_run(&mut self) -> Result<(), HardwareError>;

    /// Returns true if the module is still running
    fn run_status(&mut self, module: usize) -> Result<bool, HardwareError>;

    /// Start a histogramming (MCA) run used for diagnostics
    fn start_diagnostic_run(&mut self) -> Result<(), HardwareError>;

    /// Reboot every module in the crate
    fn boot(&mut self) -> Result<(), HardwareError>;
}
