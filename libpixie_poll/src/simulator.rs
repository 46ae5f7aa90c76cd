use std::collections::VecDeque;

use super::config::{Config, SimulationConfig};
use super::constants::Word;
use super::error::HardwareError;
use super::event_header::EventHeader;
use super::hardware::HardwareFifoSource;

#[derive(Debug, Default)]
struct SimulatedModule {
    slot: u32,
    fifo: VecDeque<Word>,
    next_channel: u32,
    clock: u32,
}

/// SimulatedCrate stands in for the vendor driver.
///
/// While a run is active every word count query first deposits a batch of well formed
/// events into each FIFO, up to the FIFO length. Nothing is produced while idle.
#[derive(Debug)]
pub struct SimulatedCrate {
    modules: Vec<SimulatedModule>,
    fifo_length: usize,
    event_words: u32,
    events_per_poll: u32,
    channels: u32,
    running: bool,
    diagnostic: bool,
}

impl SimulatedCrate {
    pub fn new(simulation: &SimulationConfig, fifo_length: u32) -> Self {
        let modules = (0..simulation.n_modules)
            .map(|m| SimulatedModule {
                slot: simulation.first_slot + m as u32,
                ..Default::default()
            })
            .collect();
        Self {
            modules,
            fifo_length: fifo_length as usize,
            event_words: simulation.event_words.max(1),
            events_per_poll: simulation.events_per_poll,
            channels: simulation.channels.max(1),
            running: false,
            diagnostic: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.simulation, config.fifo_length)
    }

    fn produce(&mut self, module: usize) {
        let event_words = self.event_words as usize;
        let m = &mut self.modules[module];
        for _ in 0..self.events_per_poll {
            if m.fifo.len() + event_words > self.fifo_length {
                break;
            }
            let header = EventHeader {
                channel: m.next_channel,
                slot: m.slot,
                event_size: self.event_words,
                virtual_channel: false,
            };
            m.fifo.push_back(header.encode());
            for _ in 1..event_words {
                m.clock = m.clock.wrapping_add(1);
                m.fifo.push_back(m.clock);
            }
            m.next_channel = (m.next_channel + 1) % self.channels;
        }
    }
}

impl HardwareFifoSource for SimulatedCrate {
    fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn slot_number(&self, module: usize) -> u32 {
        self.modules[module].slot
    }

    fn word_count(&mut self, module: usize) -> i64 {
        if module >= self.modules.len() {
            return -1;
        }
        if self.running {
            self.produce(module);
        }
        self.modules[module].fifo.len() as i64
    }

    fn read_words(&mut self, module: usize, dest: &mut [Word]) -> Result<(), HardwareError> {
        let requested = dest.len();
        let m = self
            .modules
            .get_mut(module)
            .ok_or(HardwareError::ReadFailed { module, requested })?;
        if m.fifo.len() < requested {
            return Err(HardwareError::ReadFailed { module, requested });
        }
        for (word, value) in dest.iter_mut().zip(m.fifo.drain(..requested)) {
            *word = value;
        }
        Ok(())
    }

    fn start_run(&mut self) -> Result<(), HardwareError> {
        for module in self.modules.iter_mut() {
            module.fifo.clear();
        }
        self.running = true;
        Ok(())
    }

    fn end_run(&mut self) -> Result<(), HardwareError> {
        self.running = false;
        self.diagnostic = false;
        Ok(())
    }

    fn run_status(&mut self, module: usize) -> Result<bool, HardwareError> {
        if module >= self.modules.len() {
            return Err(HardwareError::StatusFailed(module));
        }
        Ok(self.running || self.diagnostic)
    }

    fn start_diagnostic_run(&mut self) -> Result<(), HardwareError> {
        if self.running {
            return Err(HardwareError::DiagnosticFailed);
        }
        self.diagnostic = true;
        Ok(())
    }

    fn boot(&mut self) -> Result<(), HardwareError> {
        if self.running || self.diagnostic {
            return Err(HardwareError::BootFailed(String::from(
                "modules are still taking data",
            )));
        }
        for module in self.modules.iter_mut() {
            module.fifo.clear();
            module.next_channel = 0;
            module.clock = 0;
        }
        spdlog::info!("Booted {} simulated modules", self.modules.len());
        Ok(())
    }
}
