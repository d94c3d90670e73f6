use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::api::RadarSource;
use crate::config::{Config, LineFilter};
use crate::error::TrackerError;
use crate::models::{extract_movements, PollStats};
use crate::sink::{format_timestamp, CsvSink};

/// What a single fetch-filter-append pass produced
#[derive(Debug)]
pub enum CycleOutcome {
    Saved(usize),
    NoMatch,
    Failed(TrackerError),
}

/// Drives poll cycles for one line against one radar source
pub struct Poller<S> {
    source: S,
    sink: CsvSink,
    filter: LineFilter,
    interval: Duration,
    stats: PollStats,
}

impl<S: RadarSource> Poller<S> {
    pub fn new(config: &Config, source: S, sink: CsvSink) -> Self {
        Self {
            source,
            sink,
            filter: config.line.clone(),
            interval: config.interval(),
            stats: PollStats::default(),
        }
    }

    /// Counters across every cycle run so far
    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// Fetch, filter and append once. Returns the number of rows written.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<usize, TrackerError> {
        let response = self.source.fetch().await?;
        let records = extract_movements(&response, &self.filter);

        tracing::debug!(
            total = response.movements.len(),
            matched = records.len(),
            line = %self.filter.name,
            "Filtered movements"
        );

        if records.is_empty() {
            return Ok(0);
        }
        for record in &records {
            tracing::debug!("{}", record);
        }
        self.sink.append_rows(&records, now)
    }

    /// Run one cycle and report it. Failures are logged and returned, never raised.
    pub async fn tick(&mut self) -> CycleOutcome {
        let now = Utc::now();
        self.stats.cycles += 1;

        let outcome = match self.run_cycle(now).await {
            Ok(0) => {
                self.stats.empty_cycles += 1;
                println!("[{}] No {} found", format_timestamp(now), self.filter.product);
                CycleOutcome::NoMatch
            }
            Ok(count) => {
                self.stats.rows_written += count as u64;
                println!("[{}] Saved {} points", format_timestamp(now), count);
                CycleOutcome::Saved(count)
            }
            Err(e) => {
                self.stats.failed_cycles += 1;
                println!("Error: {}", e);
                tracing::warn!(kind = e.kind(), error = %e, "Poll cycle failed, will retry on next interval");
                CycleOutcome::Failed(e)
            }
        };

        tracing::debug!(stats = ?self.stats, "Cycle finished");
        outcome
    }

    /// Poll forever. Each cycle finishes before the sleep starts, so the
    /// effective period is the interval plus request latency.
    pub async fn run(&mut self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Starting polling loop"
        );
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}
