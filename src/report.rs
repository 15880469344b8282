//! Run results and their stdout formatting.

use std::fmt;

/// Bytes per gigabyte (decimal) for the summary line.
pub const BYTES_PER_GB: f64 = 1e9;

/// Formats one participant's result line, without trailing newline.
pub fn participant_line(bandwidth: f64) -> String {
    format!("{bandwidth} B/s")
}

/// Aggregated result of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Working-set size each participant's kernel was given.
    pub working_set_bytes: u64,
    /// Bandwidth per participant in bytes/s, indexed by participant id.
    /// The last entry is the harness thread.
    pub per_participant: Vec<f64>,
}

impl RunReport {
    pub fn new(working_set_bytes: u64, per_participant: Vec<f64>) -> Self {
        Self {
            working_set_bytes,
            per_participant,
        }
    }

    #[inline]
    pub fn participants(&self) -> usize {
        self.per_participant.len()
    }

    /// Summed bandwidth in bytes/s.
    pub fn total_bandwidth(&self) -> f64 {
        self.per_participant.iter().sum()
    }

    /// Summed bandwidth in GB/s.
    pub fn total_gbps(&self) -> f64 {
        self.total_bandwidth() / BYTES_PER_GB
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total bandwidth: {} B/s, {} GB/s",
            self.total_bandwidth(),
            self.total_gbps()
        )
    }
}
