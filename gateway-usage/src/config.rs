use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the usage pipeline. Defaults match the documented
/// behavior: a 50-row batch, a queue holding two batches, and a 5s flush
/// tick.
#[derive(Debug, Clone)]
pub struct UsagePipelineConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub fallback_path: PathBuf,
}

impl Default for UsagePipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_secs(5),
            fallback_path: PathBuf::from("usage-fallback.ndjson"),
        }
    }
}

impl UsagePipelineConfig {
    /// Bounded channel capacity: two batches' worth of rows.
    pub fn queue_capacity(&self) -> usize {
        self.batch_size * 2
    }
}
