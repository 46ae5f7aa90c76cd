//! # pixie_poll_cli
//!
//! Part of the pixie_poll crate family.
//!
//! This is the operator terminal for the pixie_poll acquisition. Commands are read from
//! stdin one per line and forwarded to the acquisition thread; type `help` for the list.
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! pixie_poll_cli -p /path/to/config.yml new
//! ```
//!
//! then start the terminal with
//!
//! ```bash
//! pixie_poll_cli -p /path/to/config.yml
//! ```
//!
//! Everything is logged to `./pixie_poll.log` as well as the terminal.

mod commands;

use clap::{Arg, ArgAction, Command};
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use commands::{parse_command, OperatorCommand, HELP};
use libpixie_poll::acquisition::spawn_acquisition;
use libpixie_poll::config::Config;
use libpixie_poll::controller::RunIntent;
use libpixie_poll::hardware::HardwareFifoSource;
use libpixie_poll::run_status::RunEvent;
use libpixie_poll::simulator::SimulatedCrate;
use libpixie_poll::sink::OutputSink;

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Log to ./pixie_poll.log and to the terminal
fn init_logging(verbose: bool) {
    let pattern = || {
        spdlog::formatter::PatternFormatter::new(spdlog::formatter::pattern!(
            "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
        ))
    };
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./pixie_poll.log"))
            .formatter(Box::new(pattern()))
            .truncate(true)
            .build()
            .unwrap(),
    );
    let stdout_sink = Arc::new(
        spdlog::sink::StdStreamSink::builder()
            .std_stream(spdlog::sink::StdStream::Stdout)
            .formatter(Box::new(pattern()))
            .build()
            .unwrap(),
    );
    let level = if verbose {
        spdlog::LevelFilter::All
    } else {
        spdlog::LevelFilter::MoreSevereEqual(spdlog::Level::Info)
    };
    let logger = Arc::new(
        spdlog::Logger::builder()
            .level_filter(level)
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .sink(stdout_sink)
            .build()
            .unwrap(),
    );
    spdlog::set_default_logger(logger);
}

fn log_run_event(event: &RunEvent) {
    match event {
        RunEvent::SpillWritten { .. } => spdlog::debug!("{event}"),
        RunEvent::AlreadyRunning | RunEvent::NotRunning | RunEvent::Refused { .. } => {
            spdlog::warn!("{event}")
        }
        RunEvent::RunEnded { undone, .. } if !undone.is_empty() => spdlog::warn!("{event}"),
        RunEvent::StartFailed(_) | RunEvent::RebootFailed(_) | RunEvent::AcquisitionFault(_) => {
            spdlog::error!("{event}")
        }
        _ => spdlog::info!("{event}"),
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("pixie_poll_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log debug messages"),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        spdlog::info!("Done.");
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!(
        "FIFO length: {} words Threshold: {} words",
        config.fifo_length,
        config.threshold_words
    );
    spdlog::info!(
        "Output: {} Run: {}",
        config.output_directory.join(&config.output_filename).display(),
        config.run_number
    );
    match &config.broadcast_address {
        Some(address) => spdlog::info!("Broadcasting spills to {address}"),
        None => spdlog::info!("Spill broadcast disabled"),
    }

    let hardware = SimulatedCrate::from_config(&config);
    let sink = match OutputSink::new(&config, hardware.module_count()) {
        Ok(s) => s,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    let (handle, events, acquisition) = match spawn_acquisition(config.clone(), hardware, sink)
    {
        Ok(spawned) => spawned,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    let event_logger = std::thread::spawn(move || {
        for event in events {
            log_run_event(&event);
        }
    });

    println!("{HELP}");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                spdlog::error!("Failed to read command: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line, &config) {
            Ok(OperatorCommand::Help) => println!("{HELP}"),
            Ok(OperatorCommand::Version) => {
                println!("  pixie_poll_cli v{}", env!("CARGO_PKG_VERSION"))
            }
            Ok(OperatorCommand::Status) => println!("{}", handle.status().report()),
            Ok(OperatorCommand::Quit) => {
                let status = handle.status();
                if status.state.is_active() {
                    spdlog::warn!(
                        "Cannot quit while the acquisition is {}; use stop or kill",
                        status.state
                    );
                } else {
                    break;
                }
            }
            Ok(OperatorCommand::Kill) => {
                spdlog::info!("Sending KILL signal");
                break;
            }
            Ok(OperatorCommand::Intent(intent)) => {
                if let Err(e) = handle.send(intent) {
                    spdlog::error!("{e}");
                    break;
                }
            }
            Err(message) => spdlog::warn!("{message}"),
        }
    }

    // End of input counts as a kill
    if let Err(e) = handle.send(RunIntent::Kill) {
        spdlog::warn!("{e}");
    }
    match acquisition.join() {
        Ok((_, sink)) => spdlog::info!(
            "Wrote {} in total",
            human_bytes::human_bytes(sink.writer().total_bytes() as f64)
        ),
        Err(_) => spdlog::error!("Failed to join acquisition thread!"),
    }
    if event_logger.join().is_err() {
        spdlog::error!("Failed to join event logging thread!");
    }

    spdlog::info!("Done.");
}
