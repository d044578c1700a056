//! Execution reports and the execution filter.

use serde::{Deserialize, Serialize};

// ============================================================================
// Execution
// ============================================================================

/// Details of a trade execution (fill).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub order_id: i32,
    pub client_id: i32,
    pub exec_id: String,
    pub time: String,
    pub acct_number: String,
    pub exchange: String,
    /// "BOT" or "SLD".
    pub side: String,
    pub shares: i32,
    pub price: f64,
    pub perm_id: i32,
    /// 0 = normal, 1 = liquidation.
    pub liquidation: i32,
}

// ============================================================================
// ExecutionFilter
// ============================================================================

/// Filter criteria for `req_executions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFilter {
    pub client_id: i32,
    pub acct_code: String,
    /// "yyyymmdd-hh:mm:ss"; only executions after this time are returned.
    pub time: String,
    pub symbol: String,
    pub sec_type: String,
    pub exchange: String,
    pub side: String,
}
