//! Scanner subscription parameters.

use serde::{Deserialize, Serialize};

// ============================================================================
// ScannerSubscription
// ============================================================================

/// Market scanner subscription parameters.
///
/// Numeric filters that may be left unset are `Option<T>` and travel as an
/// empty frame when `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSubscription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_rows: Option<i32>,
    pub instrument: String,
    pub location_code: String,
    pub scan_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above_volume: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_above: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_below: Option<f64>,
    pub moody_rating_above: String,
    pub moody_rating_below: String,
    pub sp_rating_above: String,
    pub sp_rating_below: String,
    pub maturity_date_above: String,
    pub maturity_date_below: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_rate_above: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_rate_below: Option<f64>,
    pub exclude_convertible: String,
    pub average_option_volume_above: i32,
    pub scanner_setting_pairs: String,
    pub stock_type_filter: String,
}
