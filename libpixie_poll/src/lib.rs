//! # pixie_poll
//!
//! pixie_poll is the acquisition controller for a crate of Pixie-16 style digitizer
//! modules, written in Rust. Each module streams event records into an on-board FIFO.
//! pixie_poll harvests those FIFOs in spills, checks that every event record is
//! structurally sound, stitches back together events which were split between two reads,
//! and hands complete spills off to be written to disk and announced to live monitors.
//! Runs are driven by operator commands from a separate thread.
//!
//! ## Installation
//!
//! Currently the only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./pixie_poll_cli` from the top
//! level pixie_poll repository. The binary is installed to your cargo install location
//! (typically something like `~/.cargo/bin/`).
//!
//! ## Library layout
//!
//! - [hardware::HardwareFifoSource] is the boundary to the vendor driver.
//! [simulator::SimulatedCrate] implements it with synthetic data.
//! - [validator::EventStreamValidator] walks the words of one module segment.
//! - [reassembler::PartialEventReassembler] completes an event cut off by a read.
//! - [acquisition::SpillAcquisitionLoop] is the acquisition thread; start it with
//! [acquisition::spawn_acquisition].
//! - [controller::RunController] owns the run state. Operators talk to it through a
//! [controller::RunHandle] and hear back through [run_status::RunEvent]s.
//! - [sink::SpillSink] receives completed spills. [sink::OutputSink] writes run files,
//! broadcasts spill notifications over UDP and accumulates statistics.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! fifo_length: 131072
//! threshold_words: 26214
//! poll_tries: 100
//! partial_wait_sleep_us: 15
//! partial_wait_timeout_ms: 10000
//! end_run_pause_us: 100
//! idle_wait_ms: 10
//! quiet: false
//! output_directory: ./
//! output_filename: pixie
//! run_number: 0
//! max_file_size: 2000000000
//! broadcast_address: 127.0.0.1:5555
//! stats_interval: null
//! diagnostic_seconds: 10
//! simulation:
//!   n_modules: 2
//!   first_slot: 2
//!   event_words: 4
//!   events_per_poll: 16
//!   channels: 16
//! ```
//!
//! Setting `partial_wait_timeout_ms` to `null` makes the wait for the rest of a split
//! event unbounded. Setting `broadcast_address` to `null` disables spill notifications.
//!
//! ## Output
//!
//! Spills are written to `<output_directory>/<output_filename>_<run>.bin` as
//! little-endian 32-bit words, rolling over to `<output_filename>_<run>-<n>.bin` when
//! `max_file_size` is reached. Each spill is a sequence of module segments:
//!
//! ```text
//! [data words + 2][module index][event words ...]
//! ```
//!
//! Modules with nothing to read contribute only the two header words.
pub mod acquisition;
pub mod broadcast;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod event_header;
pub mod hardware;
pub mod output;
pub mod reassembler;
pub mod run_status;
pub mod simulator;
pub mod sink;
pub mod spill;
pub mod stats;
pub mod validator;

#[cfg(test)]
mod testing;
