use std::fmt::Display;
use time::OffsetDateTime;

/// Lifecycle state of the acquisition.
///
/// ```text
/// Idle --start--> Starting --ack--> Running --stop--> Stopping --ack--> Idle
/// Idle --reboot--> Rebooting --done--> Idle
/// Idle --diagnostic--> DiagnosticRun --stop or timeout--> Stopping --> Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Rebooting,
    DiagnosticRun,
}

impl RunState {
    /// True while the hardware is taking data in any mode
    pub fn is_active(&self) -> bool {
        !matches!(self, RunState::Idle)
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Starting => write!(f, "Starting"),
            RunState::Running => write!(f, "Running"),
            RunState::Stopping => write!(f, "Stopping"),
            RunState::Rebooting => write!(f, "Rebooting"),
            RunState::DiagnosticRun => write!(f, "DiagnosticRun"),
        }
    }
}

/// Notifications sent from the acquisition thread back to the operator
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StateChanged(RunState),
    AlreadyRunning,
    NotRunning,
    Refused { request: String, reason: String },
    StartFailed(String),
    RebootFailed(String),
    AcquisitionFault(String),
    RunEnded { confirmed: Vec<usize>, undone: Vec<usize> },
    SpillWritten { index: u64, words: usize },
    Exited,
}

impl Display for RunEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunEvent::StateChanged(state) => write!(f, "Run state is now {state}"),
            RunEvent::AlreadyRunning => write!(f, "Acquisition is already running"),
            RunEvent::NotRunning => write!(f, "Acquisition is not running"),
            RunEvent::Refused { request, reason } => write!(f, "Refused {request}: {reason}"),
            RunEvent::StartFailed(e) => write!(f, "Failed to start run: {e}"),
            RunEvent::RebootFailed(e) => write!(f, "Failed to reboot: {e}"),
            RunEvent::AcquisitionFault(e) => write!(f, "Stopping run after fault: {e}"),
            RunEvent::RunEnded { confirmed, undone } => {
                if undone.is_empty() {
                    write!(f, "Run ended in all {} modules", confirmed.len())
                } else {
                    write!(f, "Run not properly finished in modules {undone:?}")
                }
            }
            RunEvent::SpillWritten { index, words } => {
                write!(f, "Spill {index} harvested with {words} words")
            }
            RunEvent::Exited => write!(f, "Acquisition thread exited"),
        }
    }
}

/// Snapshot of the run, shared with the operator for status queries
#[derive(Debug, Clone, Default)]
pub struct RunStatus {
    pub state: RunState,
    pub recording: bool,
    pub force_flush_pending: bool,
    pub kill_requested: bool,
    pub spill_count: u64,
    pub partial_events: u64,
    pub run_started: Option<OffsetDateTime>,
    pub exited: bool,
}

impl RunStatus {
    /// Human readable report in the style of the poll status command
    pub fn report(&self) -> String {
        let started = self
            .run_started
            .and_then(|t| {
                t.format(&time::format_description::well_known::Rfc3339)
                    .ok()
            })
            .unwrap_or_else(|| String::from("-"));
        format!(
            "Run state       - {}\nWrite to disk   - {}\nForce spill     - {}\nKill requested  - {}\nSpills          - {}\nPartial events  - {}\nRun started     - {}\nRun ctrl exited - {}",
            self.state,
            yesno(self.recording),
            yesno(self.force_flush_pending),
            yesno(self.kill_requested),
            self.spill_count,
            self.partial_events,
            started,
            yesno(self.exited)
        )
    }
}

fn yesno(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report() {
        let status = RunStatus {
            state: RunState::Running,
            recording: true,
            spill_count: 3,
            ..Default::default()
        };
        let report = status.report();
        assert!(report.contains("Run state       - Running"));
        assert!(report.contains("Write to disk   - Yes"));
        assert!(report.contains("Spills          - 3"));
    }

    #[test]
    fn test_run_ended_display() {
        let event = RunEvent::RunEnded {
            confirmed: vec![0],
            undone: vec![1],
        };
        assert_eq!(event.to_string(), "Run not properly finished in modules [1]");
    }
}
