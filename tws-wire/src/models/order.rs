//! Order terms.

use serde::{Deserialize, Serialize};

use super::enums::*;

// ============================================================================
// Order
// ============================================================================

/// Order terms sent with `place_order` and echoed back in open-order reports.
///
/// Fields that accept the "unset" sentinel on the wire are `Option<T>`;
/// `None` is written as an empty frame and decoded back to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // ----- Identification -----
    pub order_id: i32,
    pub client_id: i32,
    pub perm_id: i32,

    // ----- Main Order Fields -----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub total_quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    pub lmt_price: f64,
    pub aux_price: f64,

    // ----- Extended Order Fields -----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tif: Option<TimeInForce>,
    pub oca_group: String,
    pub account: String,
    /// "O" (open) or "C" (close).
    pub open_close: String,
    pub origin: Origin,
    pub order_ref: String,
    pub transmit: bool,
    pub parent_id: i32,
    pub block_order: bool,
    pub sweep_to_fill: bool,
    pub display_size: i32,
    pub trigger_method: i32,
    pub ignore_rth: bool,
    pub hidden: bool,
    pub shares_allocation: String,
    pub discretionary_amt: f64,
    pub good_after_time: String,
    pub good_till_date: String,

    // ----- Financial Advisor -----
    pub fa_group: String,
    pub fa_method: String,
    pub fa_percentage: String,
    pub fa_profile: String,

    // ----- Institutional -----
    /// 0 for retail, 1 or 2 for institutions.
    pub short_sale_slot: i32,
    /// Only meaningful when `short_sale_slot` is 2.
    pub designated_location: String,
    pub oca_type: i32,
    pub rth_only: bool,
    pub rule_80a: String,
    pub settling_firm: String,
    pub all_or_none: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_qty: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_offset: Option<f64>,
    pub e_trade_only: bool,
    pub firm_quote_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbbo_price_cap: Option<f64>,

    // ----- BOX / Pegged -----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction_strategy: Option<AuctionStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_ref_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_range_lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_range_upper: Option<f64>,
    pub override_percentage_constraints: bool,

    // ----- Volatility -----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    /// 1 = daily, 2 = annual.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility_type: Option<i32>,
    pub delta_neutral_order_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_neutral_aux_price: Option<f64>,
    pub continuous_update: bool,
    /// 1 = average of NBBO, 2 = NBB or NBO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price_type: Option<i32>,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            order_id: 0,
            client_id: 0,
            perm_id: 0,
            action: None,
            total_quantity: 0,
            order_type: None,
            lmt_price: 0.0,
            aux_price: 0.0,
            tif: None,
            oca_group: String::new(),
            account: String::new(),
            open_close: "O".to_string(),
            origin: Origin::Customer,
            order_ref: String::new(),
            transmit: true,
            parent_id: 0,
            block_order: false,
            sweep_to_fill: false,
            display_size: 0,
            trigger_method: 0,
            ignore_rth: false,
            hidden: false,
            shares_allocation: String::new(),
            discretionary_amt: 0.0,
            good_after_time: String::new(),
            good_till_date: String::new(),
            fa_group: String::new(),
            fa_method: String::new(),
            fa_percentage: String::new(),
            fa_profile: String::new(),
            short_sale_slot: 0,
            designated_location: String::new(),
            oca_type: 0,
            rth_only: false,
            rule_80a: String::new(),
            settling_firm: String::new(),
            all_or_none: false,
            min_qty: None,
            percent_offset: None,
            e_trade_only: false,
            firm_quote_only: false,
            nbbo_price_cap: None,
            auction_strategy: None,
            starting_price: None,
            stock_ref_price: None,
            delta: None,
            stock_range_lower: None,
            stock_range_upper: None,
            override_percentage_constraints: false,
            volatility: None,
            volatility_type: None,
            delta_neutral_order_type: String::new(),
            delta_neutral_aux_price: None,
            continuous_update: false,
            reference_price_type: None,
        }
    }
}

impl Order {
    /// Whether this is a volatility (`VOL`) order.
    pub fn is_volatility(&self) -> bool {
        self.order_type.as_ref().is_some_and(OrderType::is_volatility)
    }

    /// Simple limit order.
    pub fn limit(action: Action, quantity: i32, price: f64) -> Self {
        Self {
            action: Some(action),
            total_quantity: quantity,
            order_type: Some(OrderType::Limit),
            lmt_price: price,
            ..Default::default()
        }
    }
}
