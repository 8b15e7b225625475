//! Translation progress tracking with checkpoint/resume support.

mod tracker;
mod types;

pub use tracker::ProgressTracker;
