use std::time::{Duration, Instant};

use super::config::Config;
use super::error::ReassemblyError;
use super::hardware::HardwareFifoSource;
use super::spill::{Segment, SpillBuffer};
use super::validator::{EventStreamValidator, PartialEvent};

/// PartialEventReassembler finishes an event whose tail was still in the FIFO when the
/// module was read.
///
/// It waits for the hardware to report the missing words, then reads them onto the end
/// of the module segment so the event is contiguous in the spill, and corrects the
/// segment header. The wait sleeps between polls and gives up after the configured
/// timeout, if any.
///
/// The tail words are payload and are not checked. Once the declared size is met the
/// event is complete, and the next header in the FIFO is checked by the following read.
#[derive(Debug, Clone)]
pub struct PartialEventReassembler {
    sleep: Duration,
    timeout: Option<Duration>,
}

impl PartialEventReassembler {
    pub fn new(config: &Config) -> Self {
        Self {
            sleep: config.partial_wait_sleep(),
            timeout: config.partial_wait_timeout(),
        }
    }

    /// Complete the partial event at the end of `segment`, which must be the last
    /// segment in the spill. Returns the number of words added.
    pub fn complete<H: HardwareFifoSource>(
        &self,
        hardware: &mut H,
        validator: &EventStreamValidator,
        spill: &mut SpillBuffer,
        segment: &Segment,
        partial: &PartialEvent,
    ) -> Result<usize, ReassemblyError> {
        let module = validator.module();
        let missing = partial.missing_words;
        let started = Instant::now();
        loop {
            let available = hardware.word_count(module);
            if available >= missing as i64 {
                break;
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(ReassemblyError::Timeout {
                        module,
                        missing,
                        available,
                    });
                }
            }
            std::thread::sleep(self.sleep);
        }

        let tail = spill.extend_segment(segment, missing)?;
        hardware.read_words(module, tail)?;
        Ok(missing)
    }
}
