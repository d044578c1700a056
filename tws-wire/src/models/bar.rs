//! Historical bar data.

use serde::{Deserialize, Serialize};

// ============================================================================
// Bar
// ============================================================================

/// One OHLCV row of a historical-data reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    /// Bar start, formatted as requested by `format_date`.
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i32,
    pub wap: f64,
    pub has_gaps: bool,
}
