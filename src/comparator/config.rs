//! Comparator configuration
//!
//! Code tables, artifact paths and diagnostic thresholds. Loadable from TOML.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::codes::{
    ClassLabel, STIM_BASELINE_STOP, STIM_EXPERIMENT_STOP, STIM_LABEL_01, STIM_LABEL_02,
    STIM_SEGMENT_STOP, STIM_TRAIN_COMPLETED,
};
use super::error::ComparatorError;

/// One entry of the class-code map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCode {
    pub code: u64,
    pub class: u8,
}

/// Comparator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Stimulation codes that carry a class decision
    #[serde(default = "default_class_codes")]
    pub class_codes: Vec<ClassCode>,

    /// Stimulation codes that end the run, on any input
    #[serde(default = "default_termination_codes")]
    pub termination_codes: Vec<u64>,

    /// JSON report artifact, overwritten after every drained batch
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    /// Optional text summary written once at finalization
    #[serde(default)]
    pub summary_path: Option<PathBuf>,

    /// Display name for input 0
    #[serde(default = "default_classifier_a_name")]
    pub classifier_a_name: String,

    /// Display name for input 1
    #[serde(default = "default_classifier_b_name")]
    pub classifier_b_name: String,

    /// Pending queue depth that triggers a stalled-peer warning
    #[serde(default = "default_backlog_warn_threshold")]
    pub backlog_warn_threshold: usize,

    /// Number of initial ticks that trace every recognized code
    #[serde(default = "default_debug_tick_limit")]
    pub debug_tick_limit: u64,
}

fn default_class_codes() -> Vec<ClassCode> {
    vec![
        ClassCode {
            code: STIM_LABEL_01,
            class: 0,
        },
        ClassCode {
            code: STIM_LABEL_02,
            class: 1,
        },
    ]
}

fn default_termination_codes() -> Vec<u64> {
    vec![
        STIM_EXPERIMENT_STOP,
        STIM_SEGMENT_STOP,
        STIM_TRAIN_COMPLETED,
        STIM_BASELINE_STOP,
    ]
}

fn default_report_path() -> PathBuf {
    PathBuf::from("results/comparison.json")
}

fn default_classifier_a_name() -> String {
    "ONNX".to_string()
}

fn default_classifier_b_name() -> String {
    "Native".to_string()
}

fn default_backlog_warn_threshold() -> usize {
    64
}

fn default_debug_tick_limit() -> u64 {
    50
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            class_codes: default_class_codes(),
            termination_codes: default_termination_codes(),
            report_path: default_report_path(),
            summary_path: None,
            classifier_a_name: default_classifier_a_name(),
            classifier_b_name: default_classifier_b_name(),
            backlog_warn_threshold: default_backlog_warn_threshold(),
            debug_tick_limit: default_debug_tick_limit(),
        }
    }
}

impl ComparatorConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `COMPARATOR_CONFIG_PATH` or `comparator.toml`, else defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let path = std::env::var("COMPARATOR_CONFIG_PATH")
            .unwrap_or_else(|_| "comparator.toml".to_string());

        Self::load_or_default(&path)
    }

    /// Defaults only when the file is absent. A file that exists but does not
    /// parse or validate is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) if is_not_found(&e) => {
                tracing::debug!("No comparator config at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                tracing::warn!("Invalid comparator config {}: {:#}", path.display(), e);
                Err(e.context(format!("loading config {}", path.display())))
            }
        }
    }

    /// Reject code tables that would break the two-class decode contract.
    pub fn validate(&self) -> Result<(), ComparatorError> {
        let mut seen = HashSet::new();
        let mut mapped = [false; 2];

        for entry in &self.class_codes {
            let label = ClassLabel::from_index(entry.class).ok_or_else(|| {
                ComparatorError::InvalidConfig(format!(
                    "code 0x{:08x} maps to class {} (only 0 and 1 exist)",
                    entry.code, entry.class
                ))
            })?;
            if !seen.insert(entry.code) {
                return Err(ComparatorError::InvalidConfig(format!(
                    "code 0x{:08x} mapped more than once",
                    entry.code
                )));
            }
            mapped[label.index()] = true;
        }

        if let Some(missing) = mapped.iter().position(|m| !m) {
            return Err(ComparatorError::InvalidConfig(format!(
                "no code mapped to class {}",
                missing
            )));
        }

        if self.termination_codes.is_empty() {
            return Err(ComparatorError::InvalidConfig(
                "at least one termination code is required".to_string(),
            ));
        }

        if let Some(code) = self.termination_codes.iter().find(|c| seen.contains(*c)) {
            return Err(ComparatorError::InvalidConfig(format!(
                "code 0x{:08x} is both a class code and a termination code",
                code
            )));
        }

        Ok(())
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map_or(false, |e| e.kind() == std::io::ErrorKind::NotFound)
}
