use bit_set::BitSet;
use std::fmt::Display;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;

use super::error::{ControlError, HardwareError};
use super::run_status::{RunEvent, RunState, RunStatus};

/// A request from the operator. Intents are queued and applied by the acquisition
/// thread at the top of each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunIntent {
    Start { record: bool },
    Stop,
    StopRecording,
    ForceFlush,
    Reboot,
    DiagnosticRun(Option<Duration>),
    Kill,
}

impl Display for RunIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunIntent::Start { record: true } => write!(f, "start (recording)"),
            RunIntent::Start { record: false } => write!(f, "start"),
            RunIntent::Stop => write!(f, "stop"),
            RunIntent::StopRecording => write!(f, "stop recording"),
            RunIntent::ForceFlush => write!(f, "force spill"),
            RunIntent::Reboot => write!(f, "reboot"),
            RunIntent::DiagnosticRun(_) => write!(f, "diagnostic run"),
            RunIntent::Kill => write!(f, "kill"),
        }
    }
}

/// The operator side of the run control channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RunHandle {
    tx: Sender<RunIntent>,
    status: Arc<Mutex<RunStatus>>,
}

impl RunHandle {
    pub fn send(&self, intent: RunIntent) -> Result<(), ControlError> {
        self.tx.send(intent).map_err(|_| ControlError::Disconnected)
    }

    /// Latest published snapshot of the run
    pub fn status(&self) -> RunStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// What the acquisition loop should do this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStep {
    Idle,
    Start,
    Acquire,
    Reboot,
    Diagnostic(Option<Duration>),
    Exit,
}

#[derive(Debug, Default)]
struct PendingIntents {
    start: bool,
    record: bool,
    stop: bool,
    reboot: bool,
    diagnostic: Option<Option<Duration>>,
    kill: bool,
    force_flush: bool,
}

/// RunController owns the run state and arbitrates operator intents against it.
///
/// It lives on the acquisition thread. Intents arrive over a channel and are only
/// applied in `drain_intents`, so the state never changes underneath a spill cycle.
/// Every change is published to the shared RunStatus and announced as a RunEvent.
#[derive(Debug)]
pub struct RunController {
    intents: Receiver<RunIntent>,
    events: Sender<RunEvent>,
    shared: Arc<Mutex<RunStatus>>,
    status: RunStatus,
    pending: PendingIntents,
}

/// Create a connected handle/controller pair and the receiver for run events
pub fn run_channel() -> (RunHandle, RunController, Receiver<RunEvent>) {
    let (intent_tx, intent_rx) = mpsc::channel::<RunIntent>();
    let (event_tx, event_rx) = mpsc::channel::<RunEvent>();
    let shared = Arc::new(Mutex::new(RunStatus::default()));
    let handle = RunHandle {
        tx: intent_tx,
        status: shared.clone(),
    };
    let controller = RunController {
        intents: intent_rx,
        events: event_tx,
        shared,
        status: RunStatus::default(),
        pending: PendingIntents::default(),
    };
    (handle, controller, event_rx)
}

impl RunController {
    pub fn state(&self) -> RunState {
        self.status.state
    }

    pub fn is_recording(&self) -> bool {
        self.status.recording
    }

    pub fn stop_requested(&self) -> bool {
        self.pending.stop
    }

    pub fn kill_requested(&self) -> bool {
        self.pending.kill
    }

    /// Apply every queued intent. A dropped handle counts as a kill.
    pub fn drain_intents(&mut self) {
        loop {
            match self.intents.try_recv() {
                Ok(intent) => self.apply(intent),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.pending.kill {
                        spdlog::warn!("Run control handle dropped; shutting down acquisition");
                        self.apply(RunIntent::Kill);
                    }
                    break;
                }
            }
        }
    }

    fn apply(&mut self, intent: RunIntent) {
        let state = self.status.state;
        match intent {
            RunIntent::Kill => {
                self.pending.kill = true;
                if state.is_active() {
                    self.pending.stop = true;
                }
            }
            RunIntent::Start { record } => match state {
                RunState::Running => {
                    if record && !self.status.recording {
                        spdlog::info!("Recording data to disk");
                        self.status.recording = true;
                    }
                    self.notify(RunEvent::AlreadyRunning);
                }
                RunState::DiagnosticRun => self.refuse(intent, "diagnostic run in progress"),
                _ => {
                    self.pending.start = true;
                    self.pending.record = record;
                }
            },
            RunIntent::Stop => {
                if state.is_active() {
                    self.pending.stop = true;
                } else {
                    self.notify(RunEvent::NotRunning);
                }
            }
            RunIntent::StopRecording => {
                if state == RunState::Running && self.status.recording {
                    spdlog::info!("No longer recording data to disk");
                    self.status.recording = false;
                } else {
                    self.notify(RunEvent::NotRunning);
                }
            }
            RunIntent::ForceFlush => {
                if state == RunState::Running {
                    self.pending.force_flush = true;
                } else {
                    self.notify(RunEvent::NotRunning);
                }
            }
            RunIntent::Reboot => {
                if state.is_active() {
                    self.refuse(intent, "acquisition running; stopping first");
                    self.pending.stop = true;
                }
                self.pending.reboot = true;
            }
            RunIntent::DiagnosticRun(duration) => match state {
                RunState::DiagnosticRun => self.refuse(intent, "already in progress"),
                _ => {
                    if state.is_active() {
                        self.refuse(intent, "acquisition running; stopping first");
                        self.pending.stop = true;
                    }
                    self.pending.diagnostic = Some(duration);
                }
            },
        }
        self.status.force_flush_pending = self.pending.force_flush;
        self.status.kill_requested = self.pending.kill;
        self.publish();
    }

    /// Decide the work for this cycle. Kill takes priority over everything else.
    pub fn next_step(&mut self) -> ControlStep {
        if self.status.state == RunState::Running {
            if self.pending.kill {
                self.pending.stop = true;
            }
            return ControlStep::Acquire;
        }

        // Stop and force have no meaning without a run
        self.pending.stop = false;
        self.pending.force_flush = false;

        if self.pending.kill {
            ControlStep::Exit
        } else if std::mem::take(&mut self.pending.reboot) {
            ControlStep::Reboot
        } else if let Some(duration) = self.pending.diagnostic.take() {
            ControlStep::Diagnostic(duration)
        } else if std::mem::take(&mut self.pending.start) {
            ControlStep::Start
        } else {
            ControlStep::Idle
        }
    }

    /// Consume a pending forced spill
    pub fn take_force_flush(&mut self) -> bool {
        let force = std::mem::take(&mut self.pending.force_flush);
        if force {
            self.status.force_flush_pending = false;
            self.publish();
        }
        force
    }

    /// Stop the run from the acquisition side after a fault
    pub fn request_stop(&mut self, reason: String) {
        if self.status.state.is_active() {
            self.pending.stop = true;
            self.notify(RunEvent::AcquisitionFault(reason));
        }
    }

    pub fn begin_start(&mut self) {
        self.set_state(RunState::Starting);
    }

    pub fn start_acknowledged(&mut self, result: Result<(), HardwareError>) {
        match result {
            Ok(()) => {
                self.status.recording = self.pending.record;
                self.status.run_started = Some(OffsetDateTime::now_utc());
                self.set_state(RunState::Running);
            }
            Err(e) => {
                spdlog::error!("{e}");
                self.notify(RunEvent::StartFailed(e.to_string()));
                self.set_state(RunState::Idle);
            }
        }
    }

    pub fn begin_stop(&mut self) {
        self.set_state(RunState::Stopping);
    }

    /// Finish a stop. Modules missing from `confirmed` did not report the end of run.
    pub fn stop_completed(&mut self, confirmed: &BitSet, n_modules: usize) {
        let undone: Vec<usize> = (0..n_modules).filter(|m| !confirmed.contains(*m)).collect();
        if !undone.is_empty() {
            spdlog::warn!("Run not properly finished in modules {undone:?}");
        }
        self.pending.stop = false;
        self.pending.force_flush = false;
        self.status.recording = false;
        self.status.force_flush_pending = false;
        self.status.run_started = None;
        self.notify(RunEvent::RunEnded {
            confirmed: confirmed.iter().collect(),
            undone,
        });
        self.set_state(RunState::Idle);
    }

    pub fn begin_reboot(&mut self) {
        self.set_state(RunState::Rebooting);
    }

    pub fn reboot_completed(&mut self, result: Result<(), HardwareError>) {
        if let Err(e) = result {
            spdlog::error!("{e}");
            self.notify(RunEvent::RebootFailed(e.to_string()));
        }
        self.set_state(RunState::Idle);
    }

    pub fn begin_diagnostic(&mut self) {
        self.set_state(RunState::DiagnosticRun);
    }

    pub fn diagnostic_failed(&mut self, error: HardwareError) {
        spdlog::error!("{error}");
        self.notify(RunEvent::AcquisitionFault(error.to_string()));
        self.set_state(RunState::Idle);
    }

    pub fn record_spill(&mut self, index: u64, words: usize) {
        self.status.spill_count += 1;
        self.publish();
        self.notify(RunEvent::SpillWritten { index, words });
    }

    pub fn record_partial_event(&mut self) {
        self.status.partial_events += 1;
        self.publish();
    }

    pub fn exited(&mut self) {
        self.status.exited = true;
        self.publish();
        self.notify(RunEvent::Exited);
    }

    fn refuse(&self, intent: RunIntent, reason: &str) {
        spdlog::warn!("Refused {intent}: {reason}");
        self.notify(RunEvent::Refused {
            request: intent.to_string(),
            reason: reason.to_string(),
        });
    }

    fn set_state(&mut self, state: RunState) {
        if self.status.state == state {
            return;
        }
        spdlog::info!("Run state {} -> {}", self.status.state, state);
        self.status.state = state;
        self.publish();
        self.notify(RunEvent::StateChanged(state));
    }

    fn publish(&self) {
        match self.shared.lock() {
            Ok(mut shared) => *shared = self.status.clone(),
            Err(e) => spdlog::error!("Run status lock poisoned: {e}"),
        }
    }

    fn notify(&self, event: RunEvent) {
        if self.events.send(event).is_err() {
            spdlog::debug!("No operator listening for run events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> (RunHandle, RunController, Receiver<RunEvent>) {
        let (handle, mut controller, events) = run_channel();
        handle.send(RunIntent::Start { record: true }).unwrap();
        controller.drain_intents();
        assert_eq!(controller.next_step(), ControlStep::Start);
        controller.begin_start();
        controller.start_acknowledged(Ok(()));
        assert_eq!(controller.state(), RunState::Running);
        while events.try_recv().is_ok() {}
        (handle, controller, events)
    }

    fn stop(controller: &mut RunController, n_modules: usize) {
        controller.begin_stop();
        let mut confirmed = BitSet::new();
        for m in 0..n_modules {
            confirmed.insert(m);
        }
        controller.stop_completed(&confirmed, n_modules);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let (handle, mut controller, events) = running();
        handle.send(RunIntent::Start { record: true }).unwrap();
        controller.drain_intents();
        assert_eq!(controller.state(), RunState::Running);
        assert_eq!(events.try_recv().unwrap(), RunEvent::AlreadyRunning);
        assert_eq!(controller.next_step(), ControlStep::Acquire);
        assert!(!controller.stop_requested());
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (handle, mut controller, events) = run_channel();
        handle.send(RunIntent::Stop).unwrap();
        controller.drain_intents();
        assert_eq!(events.try_recv().unwrap(), RunEvent::NotRunning);
        assert_eq!(controller.next_step(), ControlStep::Idle);
        assert_eq!(controller.state(), RunState::Idle);
    }

    #[test]
    fn test_reboot_while_running_stops_first() {
        let (handle, mut controller, events) = running();
        handle.send(RunIntent::Reboot).unwrap();
        controller.drain_intents();
        assert_eq!(controller.state(), RunState::Running);
        assert!(matches!(
            events.try_recv().unwrap(),
            RunEvent::Refused { .. }
        ));
        assert!(controller.stop_requested());
        assert_eq!(controller.next_step(), ControlStep::Acquire);

        stop(&mut controller, 2);
        let states: Vec<RunEvent> = events.try_iter().collect();
        assert!(states.contains(&RunEvent::StateChanged(RunState::Stopping)));
        assert_eq!(controller.next_step(), ControlStep::Reboot);
        controller.begin_reboot();
        controller.reboot_completed(Ok(()));
        assert_eq!(controller.state(), RunState::Idle);
        assert_eq!(controller.next_step(), ControlStep::Idle);
    }

    #[test]
    fn test_diagnostic_while_running_stops_first() {
        let (handle, mut controller, _events) = running();
        let duration = Some(Duration::from_secs(1));
        handle.send(RunIntent::DiagnosticRun(duration)).unwrap();
        controller.drain_intents();
        assert_eq!(controller.next_step(), ControlStep::Acquire);
        stop(&mut controller, 1);
        assert_eq!(controller.next_step(), ControlStep::Diagnostic(duration));
    }

    #[test]
    fn test_kill_while_running() {
        let (handle, mut controller, _events) = running();
        handle.send(RunIntent::Kill).unwrap();
        controller.drain_intents();
        assert_eq!(controller.next_step(), ControlStep::Acquire);
        assert!(controller.stop_requested());
        stop(&mut controller, 1);
        assert_eq!(controller.next_step(), ControlStep::Exit);
    }

    #[test]
    fn test_kill_supersedes_pending() {
        let (handle, mut controller, _events) = run_channel();
        handle.send(RunIntent::Start { record: false }).unwrap();
        handle.send(RunIntent::Reboot).unwrap();
        handle.send(RunIntent::Kill).unwrap();
        controller.drain_intents();
        assert_eq!(controller.next_step(), ControlStep::Exit);
    }

    #[test]
    fn test_dropped_handle_kills() {
        let (handle, mut controller, _events) = run_channel();
        drop(handle);
        controller.drain_intents();
        assert!(controller.kill_requested());
        assert_eq!(controller.next_step(), ControlStep::Exit);
    }

    #[test]
    fn test_start_failure_reverts() {
        let (handle, mut controller, events) = run_channel();
        handle.send(RunIntent::Start { record: true }).unwrap();
        controller.drain_intents();
        assert_eq!(controller.next_step(), ControlStep::Start);
        controller.begin_start();
        controller.start_acknowledged(Err(HardwareError::StartFailed));
        assert_eq!(controller.state(), RunState::Idle);
        let received: Vec<RunEvent> = events.try_iter().collect();
        assert!(received
            .iter()
            .any(|e| matches!(e, RunEvent::StartFailed(_))));
        // The operator may retry
        handle.send(RunIntent::Start { record: true }).unwrap();
        controller.drain_intents();
        assert_eq!(controller.next_step(), ControlStep::Start);
    }

    #[test]
    fn test_undone_modules_reported() {
        let (_handle, mut controller, events) = running();
        controller.begin_stop();
        let mut confirmed = BitSet::new();
        confirmed.insert(0);
        confirmed.insert(2);
        controller.stop_completed(&confirmed, 3);
        assert_eq!(controller.state(), RunState::Idle);
        let received: Vec<RunEvent> = events.try_iter().collect();
        assert!(received.contains(&RunEvent::RunEnded {
            confirmed: vec![0, 2],
            undone: vec![1],
        }));
    }

    #[test]
    fn test_force_flush_is_one_shot() {
        let (handle, mut controller, _events) = running();
        handle.send(RunIntent::ForceFlush).unwrap();
        controller.drain_intents();
        assert!(handle.status().force_flush_pending);
        assert!(controller.take_force_flush());
        assert!(!controller.take_force_flush());
        assert!(!handle.status().force_flush_pending);
    }

    #[test]
    fn test_force_flush_needs_run() {
        let (handle, mut controller, events) = run_channel();
        handle.send(RunIntent::ForceFlush).unwrap();
        controller.drain_intents();
        assert_eq!(events.try_recv().unwrap(), RunEvent::NotRunning);
        assert!(!controller.take_force_flush());
    }

    #[test]
    fn test_status_is_published() {
        let (handle, mut controller, _events) = running();
        assert_eq!(handle.status().state, RunState::Running);
        assert!(handle.status().recording);
        assert!(handle.status().run_started.is_some());
        handle.send(RunIntent::StopRecording).unwrap();
        controller.drain_intents();
        assert!(!handle.status().recording);
        controller.record_spill(0, 10);
        assert_eq!(handle.status().spill_count, 1);
    }
}
