//! Comparator Lifecycle
//!
//! Drives one comparison run: `Idle -> Running -> Finalized`.
//!
//! The host owns the loop and calls [`Comparator::tick`] with whatever
//! stimulations arrived since the previous call. A tick never blocks and does
//! work proportional to the events handed in:
//!
//! 1. decode every event, in order, into the pending queues
//! 2. drain complete triplets into the metrics accumulator
//! 3. persist a snapshot if anything was drained
//! 4. finalize if a termination code has been seen
//!
//! The final report is produced exactly once, either from a termination code
//! or from [`Comparator::shutdown`], whichever comes first.

use tracing::{debug, info, warn};

use super::clock::{Clock, Nanos, SystemClock};
use super::codes::{Decoded, EventDecoder, StimulationEvent, StreamRole, INPUT_COUNT};
use super::config::ComparatorConfig;
use super::error::ComparatorError;
use super::metrics::MetricsAccumulator;
use super::queue::{PendingQueues, QueueDepths};
use super::report::{ComparisonReport, JsonFileSink, SnapshotSink};

/// Run state of a comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Finalized,
}

/// Everything that changes while a run is in progress.
#[derive(Debug, Clone, Default)]
pub struct ComparatorState {
    pub run_state: RunState,
    pub queues: PendingQueues,
    pub metrics: MetricsAccumulator,
    /// Latched once any termination code is decoded.
    pub termination_seen: bool,
    pub ticks: u64,
    pub events_received: u64,
    backlog_warned: bool,
}

impl ComparatorState {
    fn started_at(start_timestamp: Nanos) -> Self {
        Self {
            run_state: RunState::Running,
            metrics: MetricsAccumulator::new(start_timestamp),
            ..Self::default()
        }
    }
}

/// Outcome of persisting the per-batch snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// Nothing drained this tick.
    Skipped,
    Written,
    /// The write failed; processing continued.
    Failed,
}

/// How the run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Finalization {
    Report {
        report: ComparisonReport,
        summary: String,
    },
    /// Run ended before a single triplet was matched; no artifact written.
    NoPredictions,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    pub decoded: usize,
    pub ignored: usize,
    pub triplets: usize,
    pub snapshot: SnapshotStatus,
    pub termination_seen: bool,
    pub depths: QueueDepths,
    pub state: RunState,
    /// Set only on the tick that finalized the run.
    pub finalization: Option<Finalization>,
}

/// Streaming comparator for two classifiers against ground truth.
pub struct Comparator<C: Clock = SystemClock, S: SnapshotSink = JsonFileSink> {
    config: ComparatorConfig,
    decoder: EventDecoder,
    clock: C,
    sink: S,
    state: ComparatorState,
    final_outcome: Option<Finalization>,
}

impl Comparator<SystemClock, JsonFileSink> {
    /// Wall clock plus a JSON file sink at the configured paths.
    pub fn from_config(config: ComparatorConfig) -> Result<Self, ComparatorError> {
        let sink = JsonFileSink::new(config.report_path.clone())
            .with_summary_path(config.summary_path.clone());
        Self::new(config, SystemClock, sink)
    }
}

impl<C: Clock, S: SnapshotSink> Comparator<C, S> {
    pub fn new(config: ComparatorConfig, clock: C, sink: S) -> Result<Self, ComparatorError> {
        let decoder = EventDecoder::from_config(&config)?;
        Ok(Self {
            config,
            decoder,
            clock,
            sink,
            state: ComparatorState::default(),
            final_outcome: None,
        })
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    pub fn state(&self) -> &ComparatorState {
        &self.state
    }

    pub fn run_state(&self) -> RunState {
        self.state.run_state
    }

    pub fn metrics(&self) -> &MetricsAccumulator {
        &self.state.metrics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// How the run ended, once it has.
    pub fn final_outcome(&self) -> Option<&Finalization> {
        self.final_outcome.as_ref()
    }

    /// Report for the counters as they stand, if anything has been scored.
    pub fn current_report(&self) -> Option<ComparisonReport> {
        (self.state.metrics.samples_processed() > 0)
            .then(|| ComparisonReport::from_metrics(&self.state.metrics, self.clock.now()))
    }

    /// Reset all counters and start the run.
    pub fn initialize(&mut self) -> Result<(), ComparatorError> {
        if self.state.run_state != RunState::Idle {
            return Err(ComparatorError::InvalidState {
                op: "initialize",
                state: self.state.run_state,
            });
        }

        self.state = ComparatorState::started_at(self.clock.now());
        info!(
            classifier_a = %self.config.classifier_a_name,
            classifier_b = %self.config.classifier_b_name,
            report = %self.config.report_path.display(),
            "Comparator initialized"
        );
        Ok(())
    }

    /// Process the stimulations that arrived since the previous tick.
    pub fn tick(&mut self, events: &[StimulationEvent]) -> TickResult {
        if self.state.run_state != RunState::Running {
            if !events.is_empty() {
                debug!(
                    state = ?self.state.run_state,
                    dropped = events.len(),
                    "Tick outside a running comparison; events dropped"
                );
            }
            return self.idle_result(events.len());
        }

        let now = self.clock.now();
        self.state.ticks += 1;
        if self.state.ticks == 1 {
            self.log_first_tick(events);
        }

        let mut decoded = 0;
        let mut ignored = 0;
        for &event in events {
            let ordinal = self.state.events_received;
            self.state.events_received += 1;

            match self.decoder.decode(event) {
                Decoded::Class { role, class } => {
                    self.state.queues.push(role, class);
                    decoded += 1;
                    if self.state.ticks <= self.config.debug_tick_limit {
                        debug!(ordinal, input = %role, code = format_args!("0x{:08x}", event.code), ?class, "Received stim");
                    }
                }
                Decoded::Terminate { code } => {
                    decoded += 1;
                    if !self.state.termination_seen {
                        info!(ordinal, input = %event.role, code = format_args!("0x{:08x}", code), "Received termination signal");
                    }
                    self.state.termination_seen = true;
                }
                Decoded::Ignored => ignored += 1,
            }
        }

        let triplets = self.state.queues.drain_triplets();
        for &triplet in &triplets {
            self.state.metrics.record(triplet, now);
        }

        let snapshot = if triplets.is_empty() {
            SnapshotStatus::Skipped
        } else {
            self.persist_snapshot(now)
        };

        let depths = self.state.queues.depths();
        self.check_backlog(depths);

        let finalization = if self.state.termination_seen {
            self.finalize_at(now)
        } else {
            None
        };

        TickResult {
            decoded,
            ignored,
            triplets: triplets.len(),
            snapshot,
            termination_seen: self.state.termination_seen,
            depths,
            state: self.state.run_state,
            finalization,
        }
    }

    /// Produce the final report. Only the first call on a running comparison
    /// has any effect.
    pub fn finalize(&mut self) -> Option<Finalization> {
        if self.state.run_state != RunState::Running {
            return None;
        }
        let now = self.clock.now();
        self.finalize_at(now)
    }

    /// Host teardown: finalizes a running comparison. No-op when idle or
    /// already finalized.
    pub fn shutdown(&mut self) -> Option<Finalization> {
        if self.state.run_state != RunState::Running {
            debug!(state = ?self.state.run_state, "Shutdown outside a running comparison");
            return None;
        }
        info!(
            samples = self.state.metrics.samples_processed(),
            termination_seen = self.state.termination_seen,
            "Comparator shutdown requested"
        );
        self.finalize()
    }

    fn finalize_at(&mut self, now: Nanos) -> Option<Finalization> {
        if self.state.run_state != RunState::Running {
            return None;
        }
        self.state.run_state = RunState::Finalized;

        let outcome = if self.state.metrics.samples_processed() == 0 {
            warn!("No predictions received; no report written");
            Finalization::NoPredictions
        } else {
            let report = ComparisonReport::from_metrics(&self.state.metrics, now);
            if let Err(e) = self.sink.persist(&report) {
                warn!(error = %e, "Failed to persist final report");
            }

            let summary = report.text_summary(
                &self.config.classifier_a_name,
                &self.config.classifier_b_name,
            );
            for line in summary.lines().filter(|l| !l.is_empty()) {
                info!("{}", line);
            }
            if let Err(e) = self.sink.persist_summary(&summary) {
                warn!(error = %e, "Failed to persist report summary");
            }

            Finalization::Report { report, summary }
        };

        let pending = self.state.queues.depths();
        if pending.max() > 0 {
            debug!(?pending, "Unmatched predictions left at finalization");
        }

        self.final_outcome = Some(outcome.clone());
        Some(outcome)
    }

    fn persist_snapshot(&mut self, now: Nanos) -> SnapshotStatus {
        let report = ComparisonReport::from_metrics(&self.state.metrics, now);
        match self.sink.persist(&report) {
            Ok(()) => SnapshotStatus::Written,
            Err(e) => {
                warn!(
                    error = %e,
                    samples = report.overview.samples_processed,
                    "Snapshot write failed; continuing"
                );
                SnapshotStatus::Failed
            }
        }
    }

    fn check_backlog(&mut self, depths: QueueDepths) {
        let threshold = self.config.backlog_warn_threshold;
        if threshold == 0 {
            return;
        }

        if depths.max() >= threshold {
            if !self.state.backlog_warned {
                warn!(
                    input = %depths.deepest(),
                    depth = depths.max(),
                    ?depths,
                    "Pending queue backlog; a peer stream may be stalled"
                );
                self.state.backlog_warned = true;
            }
        } else {
            self.state.backlog_warned = false;
        }
    }

    fn log_first_tick(&self, events: &[StimulationEvent]) {
        let mut per_input = [0usize; INPUT_COUNT];
        for event in events {
            per_input[event.role.input_index()] += 1;
        }
        info!(inputs = INPUT_COUNT, "First tick");
        for role in StreamRole::ALL {
            debug!(input = %role, events = per_input[role.input_index()], "First tick input");
        }
    }

    fn idle_result(&self, dropped: usize) -> TickResult {
        TickResult {
            decoded: 0,
            ignored: dropped,
            triplets: 0,
            snapshot: SnapshotStatus::Skipped,
            termination_seen: self.state.termination_seen,
            depths: self.state.queues.depths(),
            state: self.state.run_state,
            finalization: None,
        }
    }
}
