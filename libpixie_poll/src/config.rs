use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::constants::*;
use super::error::ConfigError;

/// Parameters of the simulated crate used when no hardware driver is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_modules: usize,
    pub first_slot: u32,
    pub event_words: u32,
    pub events_per_poll: u32,
    pub channels: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_modules: 2,
            first_slot: DEFAULT_FIRST_SLOT,
            event_words: 4,
            events_per_poll: 16,
            channels: NUMBER_OF_CHANNELS as u32,
        }
    }
}

/// Structure representing the poll configuration. Contains acquisition tuning, output
/// and statistics information.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fifo_length: u32,
    pub threshold_words: u32,
    pub poll_tries: u32,
    pub partial_wait_sleep_us: u64,
    pub partial_wait_timeout_ms: Option<u64>,
    pub end_run_pause_us: u64,
    pub idle_wait_ms: u64,
    pub quiet: bool,
    pub output_directory: PathBuf,
    pub output_filename: String,
    pub run_number: u32,
    pub max_file_size: u64,
    pub broadcast_address: Option<String>,
    pub stats_interval: Option<u64>,
    pub diagnostic_seconds: u64,
    pub simulation: SimulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fifo_length: DEFAULT_FIFO_LENGTH,
            threshold_words: DEFAULT_FIFO_LENGTH / 5,
            poll_tries: DEFAULT_POLL_TRIES,
            partial_wait_sleep_us: DEFAULT_PARTIAL_WAIT_SLEEP_US,
            partial_wait_timeout_ms: Some(DEFAULT_PARTIAL_WAIT_TIMEOUT_MS),
            end_run_pause_us: DEFAULT_END_RUN_PAUSE_US,
            idle_wait_ms: DEFAULT_IDLE_WAIT_MS,
            quiet: false,
            output_directory: PathBuf::from("./"),
            output_filename: String::from("pixie"),
            run_number: 0,
            max_file_size: 2_000_000_000,
            broadcast_address: Some(String::from("127.0.0.1:5555")),
            stats_interval: None,
            diagnostic_seconds: DEFAULT_DIAGNOSTIC_SECONDS,
            simulation: SimulationConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the acquisition parameters for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fifo_length == 0 {
            return Err(ConfigError::InvalidFifoLength);
        }
        if self.threshold_words >= self.fifo_length {
            return Err(ConfigError::InvalidThreshold(
                self.threshold_words,
                self.fifo_length,
            ));
        }
        if self.poll_tries == 0 {
            return Err(ConfigError::InvalidPollTries);
        }
        Ok(())
    }

    pub fn partial_wait_sleep(&self) -> Duration {
        Duration::from_micros(self.partial_wait_sleep_us)
    }

    pub fn partial_wait_timeout(&self) -> Option<Duration> {
        self.partial_wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn end_run_pause(&self) -> Duration {
        Duration::from_micros(self.end_run_pause_us)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    /// Zero seconds means a diagnostic run lasts until stopped
    pub fn diagnostic_duration(&self, seconds: Option<u64>) -> Option<Duration> {
        match seconds.unwrap_or(self.diagnostic_seconds) {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }

    /// Words needed to hold one full FIFO per module plus the segment headers.
    ///
    /// Each module also gets room for one maximum size event, since the tail of a
    /// partial event is read after the FIFO count was taken and can push a segment past
    /// the FIFO length.
    pub fn spill_capacity(&self, n_modules: usize) -> usize {
        (self.fifo_length as usize + SEGMENT_HEADER_WORDS + MAX_EVENT_WORDS) * n_modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.spill_capacity(4), (131_072 + 2 + 16_383) * 4);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "fifo_length: 1000\nthreshold_words: 100\npartial_wait_timeout_ms: null\n";
        let config = serde_yaml::from_str::<Config>(yaml).unwrap();
        assert_eq!(config.fifo_length, 1000);
        assert_eq!(config.threshold_words, 100);
        assert_eq!(config.poll_tries, DEFAULT_POLL_TRIES);
        assert!(config.partial_wait_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_threshold() {
        let config = Config {
            fifo_length: 100,
            threshold_words: 100,
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidThreshold(100, 100)) => (),
            other => panic!("Unexpected validation result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        match Config::read_config_file(Path::new("/definitely/not/a/poll.yaml")) {
            Err(ConfigError::BadFilePath(_)) => (),
            other => panic!("Unexpected read result: {other:?}"),
        }
    }

    #[test]
    fn test_diagnostic_duration() {
        let config = Config::default();
        assert_eq!(
            config.diagnostic_duration(None),
            Some(Duration::from_secs(DEFAULT_DIAGNOSTIC_SECONDS))
        );
        assert_eq!(config.diagnostic_duration(Some(0)), None);
        assert_eq!(
            config.diagnostic_duration(Some(3)),
            Some(Duration::from_secs(3))
        );
    }
}
