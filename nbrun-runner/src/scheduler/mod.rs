//! Scheduler layer for the runner
//!
//! Drives a batch of notebooks from upload to completion and cleans up
//! behind it.

pub mod batch;

pub use batch::{BatchSummary, NotebookBatch, NotebookStatus};
