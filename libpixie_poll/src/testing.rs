// Test doubles for the hardware and sink boundaries.
use std::collections::VecDeque;

use super::config::Config;
use super::constants::{Word, NUMBER_OF_CHANNELS};
use super::error::{HardwareError, SinkError};
use super::event_header::EventHeader;
use super::hardware::HardwareFifoSource;
use super::sink::SpillSink;
use super::spill::Spill;

/// One event of `size` words: header followed by recognizable payload
pub fn make_event(slot: u32, channel: u32, size: u32) -> Vec<Word> {
    let header = EventHeader {
        channel,
        slot,
        event_size: size,
        virtual_channel: false,
    };
    let mut words = vec![header.encode()];
    words.extend((1..size).map(|idx| 0xABC0_0000 | idx));
    words
}

/// `n` back to back events, channels counting up from `first_channel`
pub fn make_events(slot: u32, first_channel: u32, n: usize, size: u32) -> Vec<Word> {
    (0..n)
        .flat_map(|idx| {
            let channel = (first_channel + idx as u32) % NUMBER_OF_CHANNELS as u32;
            make_event(slot, channel, size)
        })
        .collect()
}

/// Short timings so the loop never waits on anything in tests
pub fn test_config() -> Config {
    Config {
        fifo_length: 1000,
        threshold_words: 100,
        poll_tries: 5,
        partial_wait_sleep_us: 0,
        partial_wait_timeout_ms: Some(200),
        end_run_pause_us: 0,
        idle_wait_ms: 0,
        broadcast_address: None,
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct ScriptedModule {
    pub slot: u32,
    pub fifo: VecDeque<Word>,
    /// Chunks delivered into the FIFO, one per word count query
    pub arrivals: VecDeque<Vec<Word>>,
    /// Word count results returned verbatim ahead of the FIFO length
    pub counts: VecDeque<i64>,
    pub fail_reads: bool,
    pub keeps_running: bool,
    pub polls: usize,
}

/// A crate whose FIFO contents are scripted ahead of time
#[derive(Debug, Default)]
pub struct ScriptedCrate {
    pub modules: Vec<ScriptedModule>,
    pub running: bool,
    pub diagnostic: bool,
    pub fail_start: bool,
    pub fail_boot: bool,
    pub reads: Vec<(usize, usize)>,
    pub starts: usize,
    pub end_runs: usize,
    pub boots: usize,
}

impl ScriptedCrate {
    pub fn new(slots: &[u32]) -> Self {
        Self {
            modules: slots
                .iter()
                .map(|slot| ScriptedModule {
                    slot: *slot,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn arrive(&mut self, module: usize, words: Vec<Word>) {
        self.modules[module].arrivals.push_back(words);
    }
}

impl HardwareFifoSource for ScriptedCrate {
    fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn slot_number(&self, module: usize) -> u32 {
        self.modules[module].slot
    }

    fn word_count(&mut self, module: usize) -> i64 {
        let m = &mut self.modules[module];
        m.polls += 1;
        if let Some(count) = m.counts.pop_front() {
            return count;
        }
        if let Some(chunk) = m.arrivals.pop_front() {
            m.fifo.extend(chunk);
        }
        m.fifo.len() as i64
    }

    fn read_words(&mut self, module: usize, dest: &mut [Word]) -> Result<(), HardwareError> {
        let m = &mut self.modules[module];
        if m.fail_reads || m.fifo.len() < dest.len() {
            return Err(HardwareError::ReadFailed {
                module,
                requested: dest.len(),
            });
        }
        let n_words = dest.len();
        for (word, value) in dest.iter_mut().zip(m.fifo.drain(..n_words)) {
            *word = value;
        }
        self.reads.push((module, n_words));
        Ok(())
    }

    fn start_run(&mut self) -> Result<(), HardwareError> {
        self.starts += 1;
        if self.fail_start {
            return Err(HardwareError::StartFailed);
        }
        self.running = true;
        Ok(())
    }

    fn end_run(&mut self) -> Result<(), HardwareError> {
        self.end_runs += 1;
        self.running = false;
        self.diagnostic = false;
        Ok(())
    }

    fn run_status(&mut self, module: usize) -> Result<bool, HardwareError> {
        Ok(self.running || self.diagnostic || self.modules[module].keeps_running)
    }

    fn start_diagnostic_run(&mut self) -> Result<(), HardwareError> {
        self.diagnostic = true;
        Ok(())
    }

    fn boot(&mut self) -> Result<(), HardwareError> {
        self.boots += 1;
        if self.fail_boot {
            return Err(HardwareError::BootFailed(String::from("scripted")));
        }
        Ok(())
    }
}

/// Keeps everything it is given
#[derive(Debug, Default)]
pub struct MemorySink {
    pub spills: Vec<Spill>,
    pub broadcasts: usize,
    pub events: Vec<(usize, usize, usize)>,
    pub intervals: Vec<f64>,
    pub fail_writes: bool,
}

impl MemorySink {
    pub fn events_for(&self, module: usize) -> usize {
        self.events.iter().filter(|(m, _, _)| *m == module).count()
    }
}

impl SpillSink for MemorySink {
    fn write(&mut self, spill: &Spill) -> Result<usize, SinkError> {
        if self.fail_writes {
            return Err(SinkError::IOError(std::io::Error::other("scripted")));
        }
        self.spills.push(spill.clone());
        Ok(spill.word_count() * 4)
    }

    fn broadcast(&mut self, _spill: &Spill) {
        self.broadcasts += 1;
    }

    fn record_event(&mut self, module: usize, channel: usize, byte_length: usize) {
        self.events.push((module, channel, byte_length));
    }

    fn record_spill_interval(&mut self, seconds: f64) {
        self.intervals.push(seconds);
    }
}
