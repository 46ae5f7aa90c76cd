use bit_set::BitSet;
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::config::Config;
use super::constants::{DIAGNOSTIC_TICK_MS, HEX_DUMP_WORDS};
use super::controller::{run_channel, ControlStep, RunController, RunHandle};
use super::error::{AcquisitionError, PollError};
use super::event_header::EventHeader;
use super::hardware::HardwareFifoSource;
use super::reassembler::PartialEventReassembler;
use super::run_status::RunEvent;
use super::sink::SpillSink;
use super::spill::SpillBuffer;
use super::validator::{hex_dump, EventStreamValidator};

/// Per module bookkeeping owned by the acquisition loop
#[derive(Debug, Clone)]
pub struct ModuleState {
    pub index: usize,
    pub slot: u32,
    validator: EventStreamValidator,
    /// FIFO words seen in the most recent poll, plus any reassembled words
    pub words: i64,
    /// Words of a partial event still being waited on, zero when none
    pub missing_words: usize,
    pub partial_events: u64,
}

impl ModuleState {
    fn new(index: usize, slot: u32) -> Self {
        Self {
            index,
            slot,
            validator: EventStreamValidator::new(index, slot),
            words: 0,
            missing_words: 0,
            partial_events: 0,
        }
    }
}

/// The SpillAcquisitionLoop is the acquisition thread.
///
/// Each cycle it applies the operator intents, then does whatever the RunController
/// asks for: idle, start or end a run, reboot, run diagnostics, or poll the FIFOs and
/// harvest a spill. It exclusively owns the hardware, the sink and the spill buffer.
/// Failures while acquiring never escape the loop; they stop the run.
#[derive(Debug)]
pub struct SpillAcquisitionLoop<H: HardwareFifoSource, S: SpillSink> {
    config: Config,
    hardware: H,
    sink: S,
    controller: RunController,
    modules: Vec<ModuleState>,
    spill: SpillBuffer,
    reassembler: PartialEventReassembler,
    spill_index: u64,
    last_spill: Instant,
}

impl<H: HardwareFifoSource, S: SpillSink> SpillAcquisitionLoop<H, S> {
    pub fn new(
        config: Config,
        hardware: H,
        sink: S,
        controller: RunController,
    ) -> Result<Self, PollError> {
        config.validate()?;
        let n_modules = hardware.module_count();
        if n_modules == 0 {
            return Err(PollError::NoModules);
        }
        let modules = (0..n_modules)
            .map(|m| ModuleState::new(m, hardware.slot_number(m)))
            .collect();
        Ok(Self {
            spill: SpillBuffer::new(config.spill_capacity(n_modules)),
            reassembler: PartialEventReassembler::new(&config),
            config,
            hardware,
            sink,
            controller,
            modules,
            spill_index: 0,
            last_spill: Instant::now(),
        })
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn controller(&self) -> &RunController {
        &self.controller
    }

    pub fn modules(&self) -> &[ModuleState] {
        &self.modules
    }

    pub fn into_parts(self) -> (H, S) {
        (self.hardware, self.sink)
    }

    /// Run cycles until the controller says to exit
    pub fn run(&mut self) {
        spdlog::info!(
            "Acquisition ready with {} modules in slots {:?}",
            self.modules.len(),
            self.modules.iter().map(|m| m.slot).collect::<Vec<u32>>()
        );
        while self.run_cycle() {}
        spdlog::info!("Acquisition loop exiting");
        self.controller.exited();
    }

    /// One cycle of the loop. Returns false once the loop should exit.
    pub fn run_cycle(&mut self) -> bool {
        self.controller.drain_intents();
        match self.controller.next_step() {
            ControlStep::Exit => return false,
            ControlStep::Idle => std::thread::sleep(self.config.idle_wait()),
            ControlStep::Start => self.start_run(),
            ControlStep::Acquire => self.acquire(),
            ControlStep::Reboot => self.reboot(),
            ControlStep::Diagnostic(duration) => self.diagnostic_run(duration),
        }
        true
    }

    fn start_run(&mut self) {
        self.controller.begin_start();
        let result = self.hardware.start_run();
        if result.is_ok() {
            for module in self.modules.iter_mut() {
                module.words = 0;
                module.missing_words = 0;
            }
            self.spill_index = 0;
            self.last_spill = Instant::now();
            spdlog::info!("List mode run started");
        }
        self.controller.start_acknowledged(result);
    }

    fn acquire(&mut self) {
        let max_words = self.poll_fifos();
        let stopping = self.controller.stop_requested();
        let forced = self.controller.take_force_flush();
        if forced {
            spdlog::info!("Forcing spill with {max_words} words in the fullest FIFO");
        }
        if max_words > self.config.threshold_words as i64 || stopping || forced {
            self.harvest();
        }
        if self.controller.stop_requested() {
            self.stop_run();
        }
    }

    /// Poll every FIFO until one is above threshold or the tries run out.
    /// Returns the largest count seen on the final try.
    fn poll_fifos(&mut self) -> i64 {
        let threshold = self.config.threshold_words as i64;
        let mut max_words: i64 = 0;
        for _ in 0..self.config.poll_tries {
            max_words = 0;
            for module in self.modules.iter_mut() {
                module.words = self.hardware.word_count(module.index);
                max_words = max_words.max(module.words);
            }
            if max_words > threshold {
                break;
            }
        }
        max_words
    }

    fn harvest(&mut self) {
        self.spill.clear();
        for idx in 0..self.modules.len() {
            if let Err(e) = self.harvest_module(idx) {
                spdlog::error!("{e}");
                self.controller.request_stop(e.to_string());
                break;
            }
        }
        self.finish_spill();
    }

    /// Read one module into the spill and validate it. On error the segment holds only
    /// validated events.
    fn harvest_module(&mut self, idx: usize) -> Result<(), AcquisitionError> {
        let index = self.modules[idx].index;
        let words = self.modules[idx].words;
        if words == 0 {
            self.spill.push_empty_segment(index)?;
            return Ok(());
        } else if words < 0 {
            spdlog::warn!("Module {index} reported an invalid FIFO word count of {words}");
            self.spill.push_empty_segment(index)?;
            return Ok(());
        } else if words >= self.config.fifo_length as i64 {
            return Err(AcquisitionError::FifoOverflow {
                module: index,
                words,
                capacity: self.config.fifo_length,
            });
        }

        let segment = self.spill.begin_segment(index, words as usize)?;
        if let Err(e) = self
            .hardware
            .read_words(index, self.spill.segment_data_mut(&segment))
        {
            self.spill.discard_segment(segment);
            return Err(e.into());
        }
        if self.config.quiet {
            spdlog::debug!("Read {words} words from module {index}");
        } else {
            spdlog::info!("Read {words} words from module {index}");
        }

        let validator = self.modules[idx].validator;
        let sink = &mut self.sink;
        let result = validator.validate(self.spill.segment_data(&segment), |header| {
            sink.record_event(index, header.channel as usize, header.byte_length())
        });

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                let offset = e.offset();
                let data = self.spill.segment_data(&segment);
                let end = data.len().min(offset + HEX_DUMP_WORDS);
                spdlog::error!(
                    "Corrupted data in module {index} at word {offset}:{}",
                    hex_dump(&data[offset..end])
                );
                self.spill.truncate_segment(&segment, offset);
                return Err(e.into());
            }
        };

        if let Some(partial) = report.partial {
            self.modules[idx].missing_words = partial.missing_words;
            spdlog::debug!(
                "Partial event in module {index}: {} of {} words read",
                partial.present_words(),
                partial.event_size
            );
            let result = self.reassembler.complete(
                &mut self.hardware,
                &validator,
                &mut self.spill,
                &segment,
                &partial,
            );
            let module = &mut self.modules[idx];
            module.missing_words = 0;
            match result {
                Ok(added) => {
                    module.words += added as i64;
                    module.partial_events += 1;
                    self.controller.record_partial_event();
                    let first = self.spill.segment_data(&segment)[partial.event_offset];
                    let header = EventHeader::decode(first);
                    if !header.virtual_channel {
                        self.sink.record_event(
                            index,
                            header.channel as usize,
                            header.byte_length(),
                        );
                    }
                }
                Err(e) => {
                    self.spill.truncate_segment(&segment, partial.event_offset);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    fn finish_spill(&mut self) {
        let index = self.spill_index;
        self.spill_index += 1;
        let spill = self.spill.finish(index);
        let now = Instant::now();
        self.sink
            .record_spill_interval(now.duration_since(self.last_spill).as_secs_f64());
        self.last_spill = now;

        if self.controller.is_recording() && !spill.words.is_empty() {
            match self.sink.write(&spill) {
                Ok(bytes) => spdlog::debug!("Wrote spill {index} ({bytes} bytes)"),
                Err(e) => {
                    spdlog::error!("{e}");
                    self.controller
                        .request_stop(AcquisitionError::from(e).to_string());
                }
            }
            self.sink.broadcast(&spill);
        }
        self.controller.record_spill(index, spill.word_count());
        self.spill.recycle(spill);
    }

    /// End the run in the hardware and collect which modules confirmed it
    fn stop_run(&mut self) {
        self.controller.begin_stop();
        if let Err(e) = self.hardware.end_run() {
            spdlog::error!("{e}");
        }
        std::thread::sleep(self.config.end_run_pause());

        let mut confirmed = BitSet::with_capacity(self.modules.len());
        for module in self.modules.iter() {
            match self.hardware.run_status(module.index) {
                Ok(false) => {
                    confirmed.insert(module.index);
                }
                Ok(true) => spdlog::warn!("Module {} still reports an active run", module.index),
                Err(e) => spdlog::error!("{e}"),
            }
        }
        self.controller.stop_completed(&confirmed, self.modules.len());
    }

    fn reboot(&mut self) {
        self.controller.begin_reboot();
        spdlog::info!("Rebooting crate...");
        let result = self.hardware.boot();
        if result.is_ok() {
            spdlog::info!("Crate rebooted");
        }
        self.controller.reboot_completed(result);
    }

    fn diagnostic_run(&mut self, duration: Option<Duration>) {
        self.controller.begin_diagnostic();
        if let Err(e) = self.hardware.start_diagnostic_run() {
            self.controller.diagnostic_failed(e);
            return;
        }
        match duration {
            Some(d) => spdlog::info!("Diagnostic run started for {} s", d.as_secs_f64()),
            None => spdlog::info!("Diagnostic run started until stopped"),
        }

        let started = Instant::now();
        let tick = Duration::from_millis(DIAGNOSTIC_TICK_MS);
        loop {
            self.controller.drain_intents();
            if self.controller.stop_requested() {
                break;
            }
            if let Some(d) = duration {
                let elapsed = started.elapsed();
                if elapsed >= d {
                    spdlog::info!("Diagnostic run complete");
                    break;
                }
                std::thread::sleep(tick.min(d - elapsed));
            } else {
                std::thread::sleep(tick);
            }
        }
        self.stop_run();
    }
}

/// Start the acquisition thread.
///
/// Returns the handle used to send intents, the receiver of run events, and the join
/// handle of the thread, which gives back the hardware and sink once it exits. Dropping
/// every RunHandle kills the loop.
#[allow(clippy::type_complexity)]
pub fn spawn_acquisition<H, S>(
    config: Config,
    hardware: H,
    sink: S,
) -> Result<(RunHandle, Receiver<RunEvent>, JoinHandle<(H, S)>), PollError>
where
    H: HardwareFifoSource + Send + 'static,
    S: SpillSink + Send + 'static,
{
    let (handle, controller, events) = run_channel();
    let mut acquisition = SpillAcquisitionLoop::new(config, hardware, sink, controller)?;
    let thread = std::thread::Builder::new()
        .name(String::from("acquisition"))
        .spawn(move || {
            acquisition.run();
            acquisition.into_parts()
        })?;
    Ok((handle, events, thread))
}
