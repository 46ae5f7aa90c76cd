use super::broadcast::SpillBroadcaster;
use super::config::Config;
use super::error::SinkError;
use super::output::SpillFileWriter;
use super::spill::Spill;
use super::stats::StatsHandler;

/// Destination of completed spills and of the statistics gathered while validating them.
pub trait SpillSink {
    /// Durably write a spill. Returns the number of bytes written.
    fn write(&mut self, spill: &Spill) -> Result<usize, SinkError>;

    /// Announce a spill to live consumers. Best effort, must never block acquisition.
    fn broadcast(&mut self, spill: &Spill);

    /// Count one validated event of a (module, channel)
    fn record_event(&mut self, module: usize, channel: usize, byte_length: usize);

    /// Add the time elapsed since the previous spill
    fn record_spill_interval(&mut self, seconds: f64);
}

/// The standard sink: run files on disk, UDP spill notifications and statistics.
#[derive(Debug)]
pub struct OutputSink {
    writer: SpillFileWriter,
    broadcaster: Option<SpillBroadcaster>,
    stats: StatsHandler,
}

impl OutputSink {
    pub fn new(config: &Config, n_modules: usize) -> Result<Self, SinkError> {
        let broadcaster = match &config.broadcast_address {
            Some(address) => Some(SpillBroadcaster::new(address, config.run_number)?),
            None => None,
        };
        Ok(Self {
            writer: SpillFileWriter::new(config)?,
            broadcaster,
            stats: StatsHandler::new(n_modules, config.stats_interval),
        })
    }

    pub fn stats(&self) -> &StatsHandler {
        &self.stats
    }

    pub fn writer(&self) -> &SpillFileWriter {
        &self.writer
    }
}

impl SpillSink for OutputSink {
    fn write(&mut self, spill: &Spill) -> Result<usize, SinkError> {
        self.writer.write_spill(&spill.words)
    }

    fn broadcast(&mut self, spill: &Spill) {
        if let Some(broadcaster) = &self.broadcaster {
            if let Err(e) = broadcaster.notify(spill) {
                spdlog::warn!("Failed to broadcast spill {}: {e}", spill.index);
            }
        }
    }

    fn record_event(&mut self, module: usize, channel: usize, byte_length: usize) {
        self.stats.add_event(module, channel, byte_length);
    }

    fn record_spill_interval(&mut self, seconds: f64) {
        self.stats.add_time(seconds);
    }
}
