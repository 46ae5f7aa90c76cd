use libpixie_poll::config::Config;
use libpixie_poll::controller::RunIntent;

pub const HELP: &str = "  Run control commands:
   run | trun | start - Start acquisition and record data to disk
   startvme           - Start acquisition without recording
   stop               - Stop acquisition and recording
   tstop              - Stop recording data to disk, keep acquiring
   hup | force        - Force a spill of whatever is in the FIFOs
   reboot             - Reboot the crate (stops any active run first)
   mca [seconds]      - Diagnostic run for the given time (0 runs until stopped)
   status             - Show the run status
   version | v        - Show the version
   help | h           - Show this message
   quit | exit        - Close the program (refused while taking data)
   kill               - Stop whatever is running and close the program";

/// A parsed line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Help,
    Version,
    Status,
    Quit,
    Kill,
    Intent(RunIntent),
}

/// Parse one line of input. Errors are messages for the operator.
pub fn parse_command(line: &str, config: &Config) -> Result<OperatorCommand, String> {
    let mut words = line.split_whitespace();
    let cmd = words.next().unwrap_or("");
    let args: Vec<&str> = words.collect();
    let command = match cmd {
        "help" | "h" => OperatorCommand::Help,
        "version" | "v" => OperatorCommand::Version,
        "status" => OperatorCommand::Status,
        "quit" | "exit" => OperatorCommand::Quit,
        "kill" => OperatorCommand::Kill,
        "run" | "trun" | "start" => OperatorCommand::Intent(RunIntent::Start { record: true }),
        "startvme" => OperatorCommand::Intent(RunIntent::Start { record: false }),
        "stop" => OperatorCommand::Intent(RunIntent::Stop),
        "tstop" => OperatorCommand::Intent(RunIntent::StopRecording),
        "hup" | "force" => OperatorCommand::Intent(RunIntent::ForceFlush),
        "reboot" => OperatorCommand::Intent(RunIntent::Reboot),
        "mca" | "MCA" => {
            let seconds = match args.first() {
                Some(arg) => Some(
                    arg.parse::<u64>()
                        .map_err(|_| format!("Invalid diagnostic run time '{arg}'"))?,
                ),
                None => None,
            };
            OperatorCommand::Intent(RunIntent::DiagnosticRun(
                config.diagnostic_duration(seconds),
            ))
        }
        "" => return Err(String::from("Empty command")),
        other => return Err(format!("Unknown command '{other}'. Type 'help' for commands")),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_run_commands() {
        let config = Config::default();
        for cmd in ["run", "trun", "start", "  run  "] {
            assert_eq!(
                parse_command(cmd, &config),
                Ok(OperatorCommand::Intent(RunIntent::Start { record: true }))
            );
        }
        assert_eq!(
            parse_command("startvme", &config),
            Ok(OperatorCommand::Intent(RunIntent::Start { record: false }))
        );
        assert_eq!(
            parse_command("hup", &config),
            Ok(OperatorCommand::Intent(RunIntent::ForceFlush))
        );
        assert_eq!(
            parse_command("tstop", &config),
            Ok(OperatorCommand::Intent(RunIntent::StopRecording))
        );
    }

    #[test]
    fn test_mca_duration() {
        let config = Config::default();
        assert_eq!(
            parse_command("mca", &config),
            Ok(OperatorCommand::Intent(RunIntent::DiagnosticRun(Some(
                Duration::from_secs(config.diagnostic_seconds)
            ))))
        );
        assert_eq!(
            parse_command("mca 30", &config),
            Ok(OperatorCommand::Intent(RunIntent::DiagnosticRun(Some(
                Duration::from_secs(30)
            ))))
        );
        assert_eq!(
            parse_command("mca 0", &config),
            Ok(OperatorCommand::Intent(RunIntent::DiagnosticRun(None)))
        );
        assert!(parse_command("mca forever", &config).is_err());
    }

    #[test]
    fn test_unknown() {
        let config = Config::default();
        assert!(parse_command("launch", &config).is_err());
        assert!(parse_command("", &config).is_err());
        assert!(parse_command("stopvme", &config).is_err());
        assert_eq!(
            parse_command("stop", &config),
            Ok(OperatorCommand::Intent(RunIntent::Stop))
        );
        assert_eq!(parse_command("exit", &config), Ok(OperatorCommand::Quit));
    }
}
