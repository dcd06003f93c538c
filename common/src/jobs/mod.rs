use serde::{Deserialize, Serialize};

/// Summary of one retention pass over the output directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// RFC 3339 timestamp of the pass.
    pub finished_at: String,
    pub removed: Vec<String>,
    pub retained: usize,
    pub failures: Vec<String>,
}

/// Retention settings together with the last sweep, as shown to admins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionStatus {
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
    pub last_sweep: Option<SweepReport>,
}
