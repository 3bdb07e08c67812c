//! Comparison Report Generation
//!
//! Builds the structured comparison record from the running counters,
//! persists it as JSON, and renders the human-readable final summary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::{nanos_to_secs, Nanos};
use super::error::ReportError;
use super::metrics::{ClassMetrics, ClassifierMetrics, ClassifierSide, MetricsAccumulator};

/// Full comparison record, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub overview: Overview,
    #[serde(rename = "classifierA")]
    pub classifier_a: ClassifierReport,
    #[serde(rename = "classifierB")]
    pub classifier_b: ClassifierReport,
    pub comparison: ComparisonBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub samples_processed: u64,
    pub total_runtime_sec: f64,
    pub processing_time_sec: f64,
    pub throughput_samples_per_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierReport {
    pub accuracy_percent: f64,
    pub correct_predictions: u64,
    pub avg_latency_ms: f64,
    pub class_0: ClassMetrics,
    pub class_1: ClassMetrics,
    pub macro_avg_f1: f64,
}

impl From<ClassifierMetrics> for ClassifierReport {
    fn from(m: ClassifierMetrics) -> Self {
        Self {
            accuracy_percent: m.accuracy_percent,
            correct_predictions: m.correct,
            avg_latency_ms: m.avg_latency_ms,
            class_0: m.class_0,
            class_1: m.class_1,
            macro_avg_f1: m.macro_f1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonBlock {
    pub agreement_rate_percent: f64,
    pub agreements: u64,
    pub accuracy_difference_percent: f64,
    pub f1_difference: f64,
}

impl ComparisonReport {
    /// Snapshot the accumulator as of `now`.
    pub fn from_metrics(metrics: &MetricsAccumulator, now: Nanos) -> Self {
        let a = metrics.classifier_metrics(ClassifierSide::A);
        let b = metrics.classifier_metrics(ClassifierSide::B);

        Self {
            overview: Overview {
                samples_processed: metrics.samples_processed(),
                total_runtime_sec: nanos_to_secs(metrics.runtime_nanos(now)),
                processing_time_sec: nanos_to_secs(metrics.processing_time_nanos()),
                throughput_samples_per_sec: metrics.throughput(),
            },
            comparison: ComparisonBlock {
                agreement_rate_percent: metrics.agreement_rate_percent(),
                agreements: metrics.totals().agreement_count,
                accuracy_difference_percent: (a.accuracy_percent - b.accuracy_percent).abs(),
                f1_difference: (a.macro_f1 - b.macro_f1).abs(),
            },
            classifier_a: a.into(),
            classifier_b: b.into(),
        }
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Final human-readable summary.
    pub fn text_summary(&self, name_a: &str, name_b: &str) -> String {
        let rule = "=".repeat(70);
        let width = name_a.len().max(name_b.len()) + 1;
        let mut summary = String::new();

        summary.push_str(&format!(
            "{rule}\nCLASSIFIER COMPARISON RESULTS\n{rule}\n"
        ));
        summary.push_str(&format!(
            "Samples: {}  |  Runtime: {:.1}s  |  Throughput: {:.1} samples/sec\n\n",
            self.overview.samples_processed,
            self.overview.total_runtime_sec,
            self.overview.throughput_samples_per_sec,
        ));

        for (name, block) in [(name_a, &self.classifier_a), (name_b, &self.classifier_b)] {
            summary.push_str(&format!(
                "{:<width$} Accuracy {:.1}%  |  F1 {:.3}  |  Latency {:.1}ms\n",
                format!("{}:", name),
                block.accuracy_percent,
                block.macro_avg_f1,
                block.avg_latency_ms,
                width = width,
            ));
        }

        summary.push_str(&format!(
            "\nAgreement: {}/{} ({:.1}%)\n{rule}\n",
            self.comparison.agreements,
            self.overview.samples_processed,
            self.comparison.agreement_rate_percent,
        ));

        summary
    }
}

/// Destination for report snapshots.
pub trait SnapshotSink {
    /// Replace the previously persisted report.
    fn persist(&mut self, report: &ComparisonReport) -> Result<(), ReportError>;

    /// Persist the final text summary. Sinks without a text target skip it.
    fn persist_summary(&mut self, _summary: &str) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Writes the report as pretty JSON to a fixed path.
///
/// Each write goes to a sibling temp file first and is renamed over the
/// target, so a reader or a killed process never sees a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    report_path: PathBuf,
    summary_path: Option<PathBuf>,
}

impl JsonFileSink {
    pub fn new(report_path: impl Into<PathBuf>) -> Self {
        Self {
            report_path: report_path.into(),
            summary_path: None,
        }
    }

    pub fn with_summary_path(mut self, summary_path: Option<PathBuf>) -> Self {
        self.summary_path = summary_path;
        self
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }
}

impl SnapshotSink for JsonFileSink {
    fn persist(&mut self, report: &ComparisonReport) -> Result<(), ReportError> {
        let json = report.to_json()?;
        write_atomic(&self.report_path, json.as_bytes())?;
        debug!(
            path = %self.report_path.display(),
            samples = report.overview.samples_processed,
            "Report snapshot written"
        );
        Ok(())
    }

    fn persist_summary(&mut self, summary: &str) -> Result<(), ReportError> {
        match &self.summary_path {
            Some(path) => Ok(write_atomic(path, summary.as_bytes())?),
            None => Ok(()),
        }
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::clock::NANOS_PER_SEC;
    use crate::comparator::codes::ClassLabel::{One, Zero};
    use crate::comparator::queue::Triplet;

    fn sample_metrics() -> MetricsAccumulator {
        let mut acc = MetricsAccumulator::new(0);
        acc.record(Triplet::new(Zero, Zero, Zero), NANOS_PER_SEC);
        acc.record(Triplet::new(One, Zero, One), 2 * NANOS_PER_SEC);
        acc.record(Triplet::new(Zero, Zero, One), 3 * NANOS_PER_SEC);
        acc
    }

    #[test]
    fn test_report_schema_keys() {
        let report = ComparisonReport::from_metrics(&sample_metrics(), 4 * NANOS_PER_SEC);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["overview"]["samples_processed"], 3);
        assert_eq!(value["overview"]["total_runtime_sec"], 4.0);
        assert_eq!(value["overview"]["processing_time_sec"], 2.0);
        assert_eq!(value["overview"]["throughput_samples_per_sec"], 1.5);
        assert_eq!(value["classifierA"]["correct_predictions"], 2);
        assert_eq!(value["classifierB"]["correct_predictions"], 1);
        assert_eq!(value["classifierA"]["avg_latency_ms"], 1000.0);
        assert!(value["classifierA"]["class_0"]["precision"].is_number());
        assert!(value["classifierB"]["class_1"]["f1"].is_number());
        assert!(value["classifierB"]["macro_avg_f1"].is_number());
        assert_eq!(value["comparison"]["agreements"], 2);
    }

    #[test]
    fn test_differences_are_absolute() {
        let report = ComparisonReport::from_metrics(&sample_metrics(), 4 * NANOS_PER_SEC);
        let expected = report.classifier_a.accuracy_percent - report.classifier_b.accuracy_percent;
        assert!(expected > 0.0);
        assert_eq!(report.comparison.accuracy_difference_percent, expected);
        assert!(report.comparison.f1_difference >= 0.0);
    }

    #[test]
    fn test_text_summary_contents() {
        let report = ComparisonReport::from_metrics(&sample_metrics(), 4 * NANOS_PER_SEC);
        let text = report.text_summary("ONNX", "Native");

        assert!(text.contains("CLASSIFIER COMPARISON RESULTS"));
        assert!(text.contains("Samples: 3  |  Runtime: 4.0s  |  Throughput: 1.5 samples/sec"));
        assert!(text.contains("ONNX:   Accuracy 66.7%"));
        assert!(text.contains("Native: Accuracy 33.3%"));
        assert!(text.contains("Agreement: 2/3 (66.7%)"));
    }

    #[test]
    fn test_json_sink_overwrites_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("comparison.json");
        let mut sink = JsonFileSink::new(&path);

        let mut acc = MetricsAccumulator::new(0);
        acc.record(Triplet::new(One, One, One), 1);
        sink.persist(&ComparisonReport::from_metrics(&acc, 1)).unwrap();

        let report = ComparisonReport::from_metrics(&sample_metrics(), 4 * NANOS_PER_SEC);
        sink.persist(&report).unwrap();

        let stored: ComparisonReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.overview.samples_processed, 3);
        assert_eq!(stored.comparison.agreements, 2);
        assert!(
            (stored.classifier_a.accuracy_percent - report.classifier_a.accuracy_percent).abs()
                < 1e-9
        );
        assert!(!path.with_file_name("comparison.json.tmp").exists());
    }

    #[test]
    fn test_json_sink_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let mut sink = JsonFileSink::new(blocker.join("comparison.json"));

        let report = ComparisonReport::from_metrics(&sample_metrics(), 0);
        assert!(matches!(sink.persist(&report), Err(ReportError::Io(_))));
    }

    #[test]
    fn test_summary_written_only_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let summary = dir.path().join("summary.txt");

        let mut without = JsonFileSink::new(dir.path().join("a.json"));
        without.persist_summary("text").unwrap();
        assert!(!summary.exists());

        let mut with =
            JsonFileSink::new(dir.path().join("b.json")).with_summary_path(Some(summary.clone()));
        with.persist_summary("text").unwrap();
        assert_eq!(fs::read_to_string(&summary).unwrap(), "text");
    }
}
