//! Parameters structure for the CST driver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the CST configuration handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Number of synchronisation frames sent before configuration.
    pub sync_frame_count: usize,

    /// Pause after each synchronisation frame.
    ///
    /// Units: microseconds
    pub sync_interval_us: u64,

    /// Pause after each probe, giving the unit time to answer.
    ///
    /// Units: microseconds
    pub probe_interval_us: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            sync_frame_count: super::SYNC_FRAME_COUNT,
            sync_interval_us: 200,
            probe_interval_us: 5000,
        }
    }
}
