//! Classifier Comparator Library
//!
//! Exposes the streaming comparator for use by the replay binary and tests.

pub mod comparator;
