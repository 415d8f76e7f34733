//! Out-of-band tracking of long-running tool tasks.

mod probe;
mod tracker;

pub use probe::{ProgressProbe, ProbeConfig};
pub use tracker::{ProgressHandle, ProgressReporter, ProgressSnapshot, ProgressTracker};
