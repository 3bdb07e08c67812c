//! Pending queues and triplet synchronization
//!
//! One FIFO of decoded labels per label-carrying input. Triplets are formed
//! purely by position: the i-th pending label of each queue describes the same
//! decision. A stream that drops or duplicates an event shifts every later
//! pairing; queue depths are exposed so the caller can notice a stalled peer.

use std::collections::VecDeque;

use serde::Serialize;

use super::codes::{ClassLabel, StreamRole};

/// One aligned decision: both predictions and the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triplet {
    pub pred_a: ClassLabel,
    pub pred_b: ClassLabel,
    pub truth: ClassLabel,
}

impl Triplet {
    pub fn new(pred_a: ClassLabel, pred_b: ClassLabel, truth: ClassLabel) -> Self {
        Self {
            pred_a,
            pred_b,
            truth,
        }
    }
}

/// Current pending depth per queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub classifier_a: usize,
    pub classifier_b: usize,
    pub ground_truth: usize,
}

impl QueueDepths {
    pub fn max(&self) -> usize {
        self.classifier_a
            .max(self.classifier_b)
            .max(self.ground_truth)
    }

    pub fn min(&self) -> usize {
        self.classifier_a
            .min(self.classifier_b)
            .min(self.ground_truth)
    }

    /// Role with the deepest backlog (first in input order on ties).
    pub fn deepest(&self) -> StreamRole {
        let max = self.max();
        if self.classifier_a == max {
            StreamRole::ClassifierA
        } else if self.classifier_b == max {
            StreamRole::ClassifierB
        } else {
            StreamRole::GroundTruth
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingQueues {
    classifier_a: VecDeque<ClassLabel>,
    classifier_b: VecDeque<ClassLabel>,
    ground_truth: VecDeque<ClassLabel>,
}

impl PendingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label in arrival order. Returns false for roles that carry no labels.
    pub fn push(&mut self, role: StreamRole, class: ClassLabel) -> bool {
        match role {
            StreamRole::ClassifierA => self.classifier_a.push_back(class),
            StreamRole::ClassifierB => self.classifier_b.push_back(class),
            StreamRole::GroundTruth => self.ground_truth.push_back(class),
            StreamRole::Clock | StreamRole::Reserved => return false,
        }
        true
    }

    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            classifier_a: self.classifier_a.len(),
            classifier_b: self.classifier_b.len(),
            ground_truth: self.ground_truth.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classifier_a.is_empty() && self.classifier_b.is_empty() && self.ground_truth.is_empty()
    }

    pub fn clear(&mut self) {
        self.classifier_a.clear();
        self.classifier_b.clear();
        self.ground_truth.clear();
    }

    /// Pop every complete triplet, oldest first.
    ///
    /// Exactly `min(depths)` labels leave each queue; the remainder stays for
    /// the next tick.
    pub fn drain_triplets(&mut self) -> Vec<Triplet> {
        let n = self.depths().min();
        if n == 0 {
            return Vec::new();
        }

        self.classifier_a
            .drain(..n)
            .zip(self.classifier_b.drain(..n))
            .zip(self.ground_truth.drain(..n))
            .map(|((pred_a, pred_b), truth)| Triplet::new(pred_a, pred_b, truth))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ClassLabel::{One, Zero};

    fn push_all(queues: &mut PendingQueues, role: StreamRole, labels: &[ClassLabel]) {
        for &label in labels {
            assert!(queues.push(role, label));
        }
    }

    #[test]
    fn test_drain_pairs_by_position() {
        let mut queues = PendingQueues::new();
        push_all(&mut queues, StreamRole::ClassifierA, &[Zero, One, Zero]);
        push_all(&mut queues, StreamRole::ClassifierB, &[Zero, Zero, Zero]);
        push_all(&mut queues, StreamRole::GroundTruth, &[Zero, One, One]);

        let triplets = queues.drain_triplets();
        assert_eq!(
            triplets,
            vec![
                Triplet::new(Zero, Zero, Zero),
                Triplet::new(One, Zero, One),
                Triplet::new(Zero, Zero, One),
            ]
        );
        assert!(queues.is_empty());
    }

    #[test]
    fn test_drain_stops_at_shallowest_queue() {
        let mut queues = PendingQueues::new();
        push_all(&mut queues, StreamRole::ClassifierA, &[One, One, Zero, One]);
        push_all(&mut queues, StreamRole::ClassifierB, &[One, Zero]);
        push_all(&mut queues, StreamRole::GroundTruth, &[One, One, One]);

        let triplets = queues.drain_triplets();
        assert_eq!(triplets.len(), 2);
        assert_eq!(
            queues.depths(),
            QueueDepths {
                classifier_a: 2,
                classifier_b: 0,
                ground_truth: 1,
            }
        );

        // Leftovers pair with the next arrivals in order.
        push_all(&mut queues, StreamRole::ClassifierB, &[Zero]);
        assert_eq!(queues.drain_triplets(), vec![Triplet::new(Zero, Zero, One)]);
    }

    #[test]
    fn test_no_output_when_a_queue_is_empty() {
        let mut queues = PendingQueues::new();
        push_all(&mut queues, StreamRole::ClassifierA, &[One, Zero]);
        push_all(&mut queues, StreamRole::ClassifierB, &[One, Zero]);

        assert!(queues.drain_triplets().is_empty());
        assert_eq!(queues.depths().classifier_a, 2);
    }

    #[test]
    fn test_non_label_roles_rejected() {
        let mut queues = PendingQueues::new();
        assert!(!queues.push(StreamRole::Clock, One));
        assert!(!queues.push(StreamRole::Reserved, Zero));
        assert!(queues.is_empty());
    }

    #[test]
    fn test_interleaved_arrivals_conserve_triplets() {
        let mut queues = PendingQueues::new();
        let mut drained = 0;
        let n = 25;

        // Each role delivers n labels, in different bursts.
        for i in 0..n {
            queues.push(StreamRole::ClassifierA, if i % 2 == 0 { Zero } else { One });
            if i % 3 == 2 {
                for _ in 0..3 {
                    queues.push(StreamRole::ClassifierB, One);
                }
            }
            if i % 5 == 4 {
                for _ in 0..5 {
                    queues.push(StreamRole::GroundTruth, Zero);
                }
            }
            drained += queues.drain_triplets().len();
        }
        // 25 = 8 * 3 + 1 for classifier B
        queues.push(StreamRole::ClassifierB, Zero);
        drained += queues.drain_triplets().len();

        assert_eq!(drained, n);
        assert!(queues.is_empty());
    }

    #[test]
    fn test_deepest_role() {
        let depths = QueueDepths {
            classifier_a: 1,
            classifier_b: 0,
            ground_truth: 9,
        };
        assert_eq!(depths.deepest(), StreamRole::GroundTruth);
        assert_eq!(depths.max(), 9);
        assert_eq!(depths.min(), 0);
    }
}
