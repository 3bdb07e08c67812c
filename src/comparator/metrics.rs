//! Streaming Comparison Metrics
//!
//! Running confusion counts, agreement and timing sums for two classifiers
//! scored against the same ground truth. Every update is O(1); no prediction
//! history is retained. Precision, recall, F1, accuracy and throughput are
//! derived on demand from the counters.
//!
//! # Latency
//!
//! Per-classifier inference latency is not observable from decision events.
//! The inter-arrival time between consecutive triplets is used as a proxy and
//! credited to both classifiers identically. It is a pacing measurement, not
//! an inference timing.

use serde::{Deserialize, Serialize};

use super::clock::{nanos_to_millis, nanos_to_secs, Nanos};
use super::codes::ClassLabel;
use super::queue::Triplet;

/// Which of the two compared classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierSide {
    A,
    B,
}

/// Per-class confusion counts for one classifier.
///
/// For every scored triplet exactly one of `true_positive[truth]` or
/// (`false_positive[pred]` and `false_negative[truth]`) is incremented, so
/// `sum(tp) + sum(fn)` always equals the number of samples scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounters {
    pub true_positive: [u64; 2],
    pub false_positive: [u64; 2],
    pub false_negative: [u64; 2],
}

impl ConfusionCounters {
    /// Score one prediction. Returns whether it was correct.
    pub fn record(&mut self, predicted: ClassLabel, truth: ClassLabel) -> bool {
        if predicted == truth {
            self.true_positive[truth.index()] += 1;
            true
        } else {
            self.false_positive[predicted.index()] += 1;
            self.false_negative[truth.index()] += 1;
            false
        }
    }

    pub fn class_metrics(&self, class: ClassLabel) -> ClassMetrics {
        let c = class.index();
        ClassMetrics::from_counts(
            self.true_positive[c],
            self.false_positive[c],
            self.false_negative[c],
        )
    }

    pub fn macro_f1(&self) -> f64 {
        ClassLabel::ALL
            .iter()
            .map(|&class| self.class_metrics(class).f1)
            .sum::<f64>()
            / ClassLabel::ALL.len() as f64
    }
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassMetrics {
    /// Zero denominators yield zero, never NaN.
    pub fn from_counts(tp: u64, fp: u64, fn_count: u64) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_count);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1,
        }
    }
}

#[inline]
fn ratio(num: u64, denom: u64) -> f64 {
    if denom > 0 {
        num as f64 / denom as f64
    } else {
        0.0
    }
}

#[inline]
fn percent(num: u64, denom: u64) -> f64 {
    if denom > 0 {
        (num as f64 * 100.0) / denom as f64
    } else {
        0.0
    }
}

/// Running tally for one classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierTally {
    pub confusion: ConfusionCounters,
    pub correct: u64,
    pub latency_sum: Nanos,
}

/// Derived metrics for one classifier at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierMetrics {
    pub accuracy_percent: f64,
    pub correct: u64,
    pub avg_latency_ms: f64,
    pub class_0: ClassMetrics,
    pub class_1: ClassMetrics,
    pub macro_f1: f64,
}

/// Run-level counters and timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningTotals {
    pub samples_processed: u64,
    pub agreement_count: u64,
    pub latency_sample_count: u64,
    pub start_timestamp: Nanos,
    pub first_prediction_timestamp: Option<Nanos>,
    pub last_prediction_timestamp: Option<Nanos>,
}

/// Streaming accumulator over matched triplets.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    totals: RunningTotals,
    classifier_a: ClassifierTally,
    classifier_b: ClassifierTally,
}

impl MetricsAccumulator {
    pub fn new(start_timestamp: Nanos) -> Self {
        Self {
            totals: RunningTotals {
                start_timestamp,
                ..RunningTotals::default()
            },
            ..Self::default()
        }
    }

    /// Fold one triplet observed at `now` into the counters.
    pub fn record(&mut self, triplet: Triplet, now: Nanos) {
        if self.classifier_a.confusion.record(triplet.pred_a, triplet.truth) {
            self.classifier_a.correct += 1;
        }
        if self.classifier_b.confusion.record(triplet.pred_b, triplet.truth) {
            self.classifier_b.correct += 1;
        }

        if triplet.pred_a == triplet.pred_b {
            self.totals.agreement_count += 1;
        }

        match self.totals.last_prediction_timestamp {
            Some(last) => {
                let delta = (now - last).max(0);
                self.classifier_a.latency_sum += delta;
                self.classifier_b.latency_sum += delta;
                self.totals.latency_sample_count += 1;
            }
            None => self.totals.first_prediction_timestamp = Some(now),
        }
        // Never moves backward even if the host clock does.
        self.totals.last_prediction_timestamp = Some(
            self.totals
                .last_prediction_timestamp
                .map_or(now, |last| last.max(now)),
        );

        self.totals.samples_processed += 1;
    }

    pub fn totals(&self) -> &RunningTotals {
        &self.totals
    }

    pub fn samples_processed(&self) -> u64 {
        self.totals.samples_processed
    }

    pub fn tally(&self, side: ClassifierSide) -> &ClassifierTally {
        match side {
            ClassifierSide::A => &self.classifier_a,
            ClassifierSide::B => &self.classifier_b,
        }
    }

    pub fn classifier_metrics(&self, side: ClassifierSide) -> ClassifierMetrics {
        let tally = self.tally(side);
        let avg_latency_ms = if self.totals.latency_sample_count > 0 {
            nanos_to_millis(tally.latency_sum) / self.totals.latency_sample_count as f64
        } else {
            0.0
        };

        ClassifierMetrics {
            accuracy_percent: percent(tally.correct, self.totals.samples_processed),
            correct: tally.correct,
            avg_latency_ms,
            class_0: tally.confusion.class_metrics(ClassLabel::Zero),
            class_1: tally.confusion.class_metrics(ClassLabel::One),
            macro_f1: tally.confusion.macro_f1(),
        }
    }

    pub fn agreement_rate_percent(&self) -> f64 {
        percent(self.totals.agreement_count, self.totals.samples_processed)
    }

    /// Span between the first and the latest scored triplet.
    pub fn processing_time_nanos(&self) -> Nanos {
        match (
            self.totals.first_prediction_timestamp,
            self.totals.last_prediction_timestamp,
        ) {
            (Some(first), Some(last)) => (last - first).max(0),
            _ => 0,
        }
    }

    /// Triplets per second over the processing span; 0 for an empty span.
    pub fn throughput(&self) -> f64 {
        let secs = nanos_to_secs(self.processing_time_nanos());
        if secs > 0.0 {
            self.totals.samples_processed as f64 / secs
        } else {
            0.0
        }
    }

    pub fn runtime_nanos(&self, now: Nanos) -> Nanos {
        (now - self.totals.start_timestamp).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::clock::NANOS_PER_MILLI;
    use ClassLabel::{One, Zero};

    fn label(i: u8) -> ClassLabel {
        ClassLabel::from_index(i).unwrap()
    }

    #[test]
    fn test_mixed_batch_accuracy_and_agreement() {
        let mut acc = MetricsAccumulator::new(0);
        let a = [0, 1, 0];
        let b = [0, 0, 0];
        let truth = [0, 1, 1];
        for i in 0..3 {
            acc.record(Triplet::new(label(a[i]), label(b[i]), label(truth[i])), 0);
        }

        assert_eq!(acc.samples_processed(), 3);
        assert_eq!(acc.totals().agreement_count, 2);
        assert!((acc.agreement_rate_percent() - 66.666_666).abs() < 1e-3);

        let ma = acc.classifier_metrics(ClassifierSide::A);
        let mb = acc.classifier_metrics(ClassifierSide::B);
        assert_eq!(ma.correct, 2);
        assert_eq!(mb.correct, 1);
        assert!((ma.accuracy_percent - 66.666_666).abs() < 1e-3);
        assert!((mb.accuracy_percent - 33.333_333).abs() < 1e-3);
    }

    #[test]
    fn test_confusion_bookkeeping() {
        let mut counters = ConfusionCounters::default();
        assert!(counters.record(One, One));
        assert!(!counters.record(Zero, One));
        assert!(!counters.record(One, Zero));

        assert_eq!(counters.true_positive, [0, 1]);
        assert_eq!(counters.false_positive, [1, 1]);
        assert_eq!(counters.false_negative, [1, 1]);

        // class 1: tp=1 fp=1 fn=1 -> p=r=f1=0.5
        let m1 = counters.class_metrics(One);
        assert_eq!(m1.precision, 0.5);
        assert_eq!(m1.recall, 0.5);
        assert_eq!(m1.f1, 0.5);

        // class 0 never correct
        assert_eq!(counters.class_metrics(Zero), ClassMetrics::default());
        assert_eq!(counters.macro_f1(), 0.25);
    }

    #[test]
    fn test_recall_sums_match_sample_count() {
        let mut acc = MetricsAccumulator::new(0);
        for i in 0..37u8 {
            let triplet = Triplet::new(label(i % 2), label((i / 3) % 2), label((i / 2) % 2));
            acc.record(triplet, i as i64);
        }

        for side in [ClassifierSide::A, ClassifierSide::B] {
            let c = acc.tally(side).confusion;
            let total: u64 = (0..2).map(|k| c.true_positive[k] + c.false_negative[k]).sum();
            assert_eq!(total, acc.samples_processed());
        }
    }

    #[test]
    fn test_zero_samples_are_all_zero() {
        let acc = MetricsAccumulator::new(10);
        let m = acc.classifier_metrics(ClassifierSide::A);

        assert_eq!(m.accuracy_percent, 0.0);
        assert_eq!(m.avg_latency_ms, 0.0);
        assert_eq!(m.class_0, ClassMetrics::default());
        assert_eq!(m.class_1, ClassMetrics::default());
        assert_eq!(m.macro_f1, 0.0);
        assert_eq!(acc.throughput(), 0.0);
        assert_eq!(acc.agreement_rate_percent(), 0.0);
        assert_eq!(acc.processing_time_nanos(), 0);
    }

    #[test]
    fn test_eighty_of_hundred_is_exact() {
        let mut acc = MetricsAccumulator::new(0);
        for i in 0..100 {
            let pred = if i < 80 { One } else { Zero };
            acc.record(Triplet::new(pred, One, One), i);
        }
        assert_eq!(
            acc.classifier_metrics(ClassifierSide::A).accuracy_percent,
            80.0
        );
        assert_eq!(
            acc.classifier_metrics(ClassifierSide::B).accuracy_percent,
            100.0
        );
    }

    #[test]
    fn test_latency_uses_inter_triplet_delta() {
        let mut acc = MetricsAccumulator::new(0);
        let t0 = 1_000 * NANOS_PER_MILLI;

        acc.record(Triplet::new(One, One, One), t0);
        assert_eq!(acc.totals().latency_sample_count, 0);
        assert_eq!(acc.totals().first_prediction_timestamp, Some(t0));

        acc.record(Triplet::new(One, One, One), t0 + 40 * NANOS_PER_MILLI);
        acc.record(Triplet::new(One, One, One), t0 + 100 * NANOS_PER_MILLI);

        assert_eq!(acc.totals().latency_sample_count, 2);
        let ma = acc.classifier_metrics(ClassifierSide::A);
        let mb = acc.classifier_metrics(ClassifierSide::B);
        assert_eq!(ma.avg_latency_ms, 50.0);
        assert_eq!(mb.avg_latency_ms, 50.0);

        // 3 samples over 0.1s
        assert_eq!(acc.processing_time_nanos(), 100 * NANOS_PER_MILLI);
        assert!((acc.throughput() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_instant_triplets_have_zero_throughput() {
        let mut acc = MetricsAccumulator::new(0);
        acc.record(Triplet::new(One, Zero, One), 5);
        acc.record(Triplet::new(One, Zero, One), 5);
        assert_eq!(acc.throughput(), 0.0);
        assert_eq!(acc.classifier_metrics(ClassifierSide::A).avg_latency_ms, 0.0);
    }
}
