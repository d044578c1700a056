//! Instrument descriptors and contract details.

use serde::{Deserialize, Serialize};

use super::enums::*;

// ============================================================================
// ComboLeg
// ============================================================================

/// A single leg of a combination instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboLeg {
    pub con_id: i32,
    pub ratio: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub exchange: String,
    /// Only encoded for order requests.
    pub open_close: LegOpenClose,
}

// ============================================================================
// Contract
// ============================================================================

/// Defines a financial instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sec_type: Option<SecType>,
    pub expiry: String,
    pub strike: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Right>,
    pub multiplier: String,
    pub exchange: String,
    pub primary_exch: String,
    pub currency: String,
    pub local_symbol: String,
    /// Legs of a combination instrument. Ignored unless `sec_type` is `BAG`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo_legs: Option<Vec<ComboLeg>>,
}

impl Contract {
    /// Convenience constructor for a SMART-routed stock.
    pub fn stock(symbol: &str, exchange: &str, currency: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            sec_type: Some(SecType::Stock),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
            ..Default::default()
        }
    }

    /// Whether the security type is the combination tag.
    pub fn is_combo(&self) -> bool {
        self.sec_type.as_ref().is_some_and(SecType::is_combo)
    }
}

// ============================================================================
// ContractDetails
// ============================================================================

/// Bond-specific terms, present only on bond contract details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondTerms {
    pub cusip: String,
    pub coupon: f64,
    pub maturity: String,
    pub issue_date: String,
    pub ratings: String,
    pub bond_type: String,
    pub coupon_type: String,
    pub convertible: bool,
    pub callable: bool,
    pub putable: bool,
    pub desc_append: String,
}

/// Full contract details returned by a contract-details or scanner request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetails {
    pub summary: Contract,
    pub market_name: String,
    pub trading_class: String,
    pub con_id: i32,
    pub min_tick: f64,
    pub order_types: String,
    pub valid_exchanges: String,
    pub price_magnifier: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond: Option<BondTerms>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_detection() {
        let mut c = Contract::stock("AAPL", "SMART", "USD");
        assert!(!c.is_combo());
        c.sec_type = Some(SecType::Other("bag".into()));
        assert!(c.is_combo());
        c.sec_type = None;
        assert!(!c.is_combo());
    }

    #[test]
    fn serializes_camel_case() {
        let c = Contract::stock("IBM", "SMART", "USD");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["symbol"], "IBM");
        assert_eq!(json["secType"], "STK");
        assert_eq!(json["primaryExch"], "");
        assert!(json.get("comboLegs").is_none());
    }
}
