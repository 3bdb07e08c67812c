//! Stimulation Code Decoding
//!
//! Maps raw stimulation codes arriving on an input stream to class labels or
//! to the termination signal. Codes that match neither table are dropped.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::ComparatorConfig;
use super::error::ComparatorError;

/// OVTK_StimulationId_Label_01
pub const STIM_LABEL_01: u64 = 0x0000_8101;
/// OVTK_StimulationId_Label_02
pub const STIM_LABEL_02: u64 = 0x0000_8102;
/// OVTK_StimulationId_ExperimentStop
pub const STIM_EXPERIMENT_STOP: u64 = 0x0000_8005;
/// OVTK_StimulationId_SegmentStop
pub const STIM_SEGMENT_STOP: u64 = 0x0000_8001;
/// OVTK_StimulationId_TrainCompleted
pub const STIM_TRAIN_COMPLETED: u64 = 0x0000_8002;
/// OVTK_StimulationId_BaselineStop
pub const STIM_BASELINE_STOP: u64 = 0x0000_8016;

/// Number of input channels the comparator listens on.
pub const INPUT_COUNT: usize = 5;

/// Input channel role, in required input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamRole {
    ClassifierA = 0,
    ClassifierB = 1,
    GroundTruth = 2,
    /// Periodic clock/timeout channel; only termination codes matter here.
    Clock = 3,
    Reserved = 4,
}

impl StreamRole {
    pub const ALL: [StreamRole; INPUT_COUNT] = [
        Self::ClassifierA,
        Self::ClassifierB,
        Self::GroundTruth,
        Self::Clock,
        Self::Reserved,
    ];

    /// Role for an input index. Indices past the last input have no role.
    pub fn from_input(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn input_index(self) -> usize {
        self as usize
    }

    /// Whether class codes on this input carry a decision.
    #[inline]
    pub fn carries_labels(self) -> bool {
        matches!(self, Self::ClassifierA | Self::ClassifierB | Self::GroundTruth)
    }
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClassifierA => "classifier_a",
            Self::ClassifierB => "classifier_b",
            Self::GroundTruth => "ground_truth",
            Self::Clock => "clock",
            Self::Reserved => "reserved",
        };
        f.write_str(name)
    }
}

/// Binary class label. Exactly two classes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClassLabel {
    Zero = 0,
    One = 1,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 2] = [Self::Zero, Self::One];

    /// Label for a class index; anything outside {0, 1} is rejected.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One raw stimulation as delivered by the host on a given input.
///
/// Arrival order is the event's position in the batch handed to a tick; the
/// comparator numbers events across the run as it consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulationEvent {
    pub role: StreamRole,
    pub code: u64,
}

impl StimulationEvent {
    pub fn new(role: StreamRole, code: u64) -> Self {
        Self { role, code }
    }
}

/// Result of decoding one stimulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Class { role: StreamRole, class: ClassLabel },
    Terminate { code: u64 },
    Ignored,
}

/// Code tables for class labels and termination signals.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    class_codes: HashMap<u64, ClassLabel>,
    termination_codes: HashSet<u64>,
}

impl EventDecoder {
    pub fn new(
        class_codes: impl IntoIterator<Item = (u64, ClassLabel)>,
        termination_codes: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            class_codes: class_codes.into_iter().collect(),
            termination_codes: termination_codes.into_iter().collect(),
        }
    }

    /// Build the tables from a validated config.
    pub fn from_config(config: &ComparatorConfig) -> Result<Self, ComparatorError> {
        config.validate()?;
        let class_codes = config
            .class_codes
            .iter()
            .filter_map(|c| ClassLabel::from_index(c.class).map(|label| (c.code, label)));
        Ok(Self::new(
            class_codes,
            config.termination_codes.iter().copied(),
        ))
    }

    /// Decode a stimulation. Termination codes are honored on every input;
    /// class codes only on the three label-carrying inputs.
    pub fn decode(&self, event: StimulationEvent) -> Decoded {
        if self.termination_codes.contains(&event.code) {
            return Decoded::Terminate { code: event.code };
        }

        match self.class_codes.get(&event.code) {
            Some(&class) if event.role.carries_labels() => Decoded::Class {
                role: event.role,
                class,
            },
            _ => Decoded::Ignored,
        }
    }

    pub fn is_recognized(&self, code: u64) -> bool {
        self.termination_codes.contains(&code) || self.class_codes.contains_key(&code)
    }
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new(
            [
                (STIM_LABEL_01, ClassLabel::Zero),
                (STIM_LABEL_02, ClassLabel::One),
            ],
            [
                STIM_EXPERIMENT_STOP,
                STIM_SEGMENT_STOP,
                STIM_TRAIN_COMPLETED,
                STIM_BASELINE_STOP,
            ],
        )
    }
}
