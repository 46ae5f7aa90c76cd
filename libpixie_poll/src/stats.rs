use ndarray::Array2;

use super::constants::NUMBER_OF_CHANNELS;

/// StatsHandler accumulates event counts and byte totals per (module, channel).
///
/// Two sets of counters are kept: totals since the handler was created, and counts
/// since the last periodic dump, which are used to report rates.
#[derive(Debug, Clone)]
pub struct StatsHandler {
    event_counts: Array2<u64>,
    byte_totals: Array2<u64>,
    interval_counts: Array2<u64>,
    interval_bytes: Array2<u64>,
    total_time: f64,
    interval_time: f64,
    dump_interval: Option<f64>,
    dumps: u64,
}

impl StatsHandler {
    pub fn new(n_modules: usize, dump_interval: Option<u64>) -> Self {
        let shape = (n_modules, NUMBER_OF_CHANNELS);
        Self {
            event_counts: Array2::zeros(shape),
            byte_totals: Array2::zeros(shape),
            interval_counts: Array2::zeros(shape),
            interval_bytes: Array2::zeros(shape),
            total_time: 0.0,
            interval_time: 0.0,
            dump_interval: dump_interval.filter(|i| *i > 0).map(|i| i as f64),
            dumps: 0,
        }
    }

    pub fn add_event(&mut self, module: usize, channel: usize, byte_length: usize) {
        let idx = (module, channel);
        if self.event_counts.get(idx).is_none() {
            spdlog::debug!("Ignoring statistics for unknown module {module} channel {channel}");
            return;
        }
        self.event_counts[idx] += 1;
        self.byte_totals[idx] += byte_length as u64;
        self.interval_counts[idx] += 1;
        self.interval_bytes[idx] += byte_length as u64;
    }

    /// Add elapsed time, dumping the rates if the dump interval has passed
    pub fn add_time(&mut self, seconds: f64) {
        self.total_time += seconds;
        self.interval_time += seconds;
        if let Some(interval) = self.dump_interval {
            if self.interval_time >= interval {
                self.dump();
                self.interval_counts.fill(0);
                self.interval_bytes.fill(0);
                self.interval_time = 0.0;
            }
        }
    }

    fn dump(&mut self) {
        self.dumps += 1;
        spdlog::info!(
            "Statistics after {:.1} s ({} dumps):",
            self.total_time,
            self.dumps
        );
        for (module, (counts, bytes)) in self
            .interval_counts
            .rows()
            .into_iter()
            .zip(self.interval_bytes.rows())
            .enumerate()
        {
            let n_events: u64 = counts.sum();
            let n_bytes: u64 = bytes.sum();
            spdlog::info!(
                "Module {module}: {:.1} events/s, {}/s",
                n_events as f64 / self.interval_time,
                human_bytes::human_bytes(n_bytes as f64 / self.interval_time)
            );
        }
    }

    pub fn channel_events(&self, module: usize, channel: usize) -> u64 {
        self.event_counts
            .get((module, channel))
            .copied()
            .unwrap_or(0)
    }

    pub fn module_events(&self, module: usize) -> u64 {
        if module >= self.event_counts.nrows() {
            return 0;
        }
        self.event_counts.row(module).sum()
    }

    pub fn module_bytes(&self, module: usize) -> u64 {
        if module >= self.byte_totals.nrows() {
            return 0;
        }
        self.byte_totals.row(module).sum()
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn dump_count(&self) -> u64 {
        self.dumps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut stats = StatsHandler::new(2, None);
        for _ in 0..15 {
            stats.add_event(0, 3, 40);
        }
        stats.add_event(1, 15, 16);
        assert_eq!(stats.module_events(0), 15);
        assert_eq!(stats.channel_events(0, 3), 15);
        assert_eq!(stats.module_bytes(0), 600);
        assert_eq!(stats.module_events(1), 1);
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut stats = StatsHandler::new(1, None);
        stats.add_event(1, 0, 4);
        stats.add_event(0, 16, 4);
        assert_eq!(stats.module_events(0), 0);
        assert_eq!(stats.module_events(1), 0);
    }

    #[test]
    fn test_periodic_dump() {
        let mut stats = StatsHandler::new(1, Some(2));
        stats.add_event(0, 0, 4);
        stats.add_time(1.0);
        assert_eq!(stats.dump_count(), 0);
        stats.add_time(1.5);
        assert_eq!(stats.dump_count(), 1);
        assert_eq!(stats.module_events(0), 1);
        assert!((stats.total_time() - 2.5).abs() < 1e-9);
    }
}
