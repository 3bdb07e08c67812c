//! Streaming Classifier Comparator
//!
//! Scores two classifiers against ground truth in real time, from three
//! independently-timed streams of stimulation codes, without keeping any
//! prediction history.
//!
//! # Architecture
//!
//! ```text
//!  input 0 (A) ─┐
//!  input 1 (B) ─┤   ┌─────────────┐   ┌───────────────┐   ┌──────────────────┐
//!  input 2 (GT)─┼──▶│ EventDecoder│──▶│ PendingQueues │──▶│ MetricsAccumulator│
//!  input 3 clk ─┤   └──────┬──────┘   │ (positional   │   └─────────┬────────┘
//!  input 4     ─┘          │          │  triplets)    │             │
//!                          │ terminate└───────────────┘             ▼
//!                          ▼                                ┌──────────────┐
//!                   ┌────────────┐   finalize once          │ SnapshotSink │
//!                   │ Comparator │─────────────────────────▶│ (JSON file)  │
//!                   │ (lifecycle)│                          └──────────────┘
//!                   └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use classifier_comparator::comparator::{Comparator, ComparatorConfig, StimulationEvent};
//!
//! let mut cmp = Comparator::from_config(ComparatorConfig::from_env()?)?;
//! cmp.initialize()?;
//! loop {
//!     let events: Vec<StimulationEvent> = host.poll();
//!     if cmp.tick(&events).finalization.is_some() {
//!         break;
//!     }
//! }
//! cmp.shutdown();
//! ```

pub mod clock;
pub mod codes;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod queue;
pub mod report;

pub use clock::*;
pub use codes::*;
pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use metrics::*;
pub use queue::*;
pub use report::*;
