//! Strongly-typed enums for the string and integer codes used on the wire.
//!
//! String codes keep an `Other(String)` variant where servers are known to
//! send values outside the fixed set. Serde `rename` attributes match the
//! wire strings exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Security / Contract Enums
// ============================================================================

/// Security type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecType {
    #[serde(rename = "STK")]
    Stock,
    #[serde(rename = "OPT")]
    Option,
    #[serde(rename = "FUT")]
    Future,
    #[serde(rename = "CASH")]
    Forex,
    #[serde(rename = "IND")]
    Index,
    #[serde(rename = "FOP")]
    FutureOption,
    #[serde(rename = "BOND")]
    Bond,
    #[serde(rename = "WAR")]
    Warrant,
    #[serde(rename = "BAG")]
    Combo,
    /// Unrecognized security type from the server.
    #[serde(untagged)]
    Other(String),
}

impl SecType {
    const KNOWN: [SecType; 9] = [
        Self::Stock,
        Self::Option,
        Self::Future,
        Self::Forex,
        Self::Index,
        Self::FutureOption,
        Self::Bond,
        Self::Warrant,
        Self::Combo,
    ];

    /// Wire code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stock => "STK",
            Self::Option => "OPT",
            Self::Future => "FUT",
            Self::Forex => "CASH",
            Self::Index => "IND",
            Self::FutureOption => "FOP",
            Self::Bond => "BOND",
            Self::Warrant => "WAR",
            Self::Combo => crate::protocol::BAG_SEC_TYPE,
            Self::Other(s) => s.as_str(),
        }
    }

    /// Whether this is the combination tag, compared case-insensitively.
    pub fn is_combo(&self) -> bool {
        self.as_str().eq_ignore_ascii_case(crate::protocol::BAG_SEC_TYPE)
    }
}

impl fmt::Display for SecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecType {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::KNOWN
            .into_iter()
            .find(|t| t.as_str() == s)
            .unwrap_or_else(|| Self::Other(s.to_string())))
    }
}

/// Option right. Anything the server sends besides a call or put reads as
/// `Undefined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Right {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
    #[serde(rename = "")]
    Undefined,
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Call => "C",
            Self::Put => "P",
            Self::Undefined => "",
        })
    }
}

impl FromStr for Right {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "C" | "CALL" => Self::Call,
            "P" | "PUT" => Self::Put,
            _ => Self::Undefined,
        })
    }
}

// ============================================================================
// Order Enums
// ============================================================================

/// Order or leg side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "SSHORT")]
    SellShort,
    /// Side code outside the fixed set, kept verbatim.
    #[serde(untagged)]
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::SellShort => "SSHORT",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok([Self::Buy, Self::Sell, Self::SellShort]
            .into_iter()
            .find(|a| a.as_str() == s)
            .unwrap_or_else(|| Self::Other(s.to_string())))
    }
}

/// Order type. Unrecognized codes are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MKT")]
    Market,
    #[serde(rename = "LMT")]
    Limit,
    #[serde(rename = "STP")]
    Stop,
    #[serde(rename = "STPLMT")]
    StopLimit,
    #[serde(rename = "TRAIL")]
    TrailingStop,
    #[serde(rename = "REL")]
    Relative,
    #[serde(rename = "MOC")]
    MarketOnClose,
    #[serde(rename = "LOC")]
    LimitOnClose,
    #[serde(rename = "VWAP")]
    Vwap,
    #[serde(rename = "VOL")]
    Volatility,
    #[serde(rename = "NONE")]
    None,
    #[serde(untagged)]
    Other(String),
}

impl OrderType {
    const KNOWN: [OrderType; 11] = [
        Self::Market,
        Self::Limit,
        Self::Stop,
        Self::StopLimit,
        Self::TrailingStop,
        Self::Relative,
        Self::MarketOnClose,
        Self::LimitOnClose,
        Self::Vwap,
        Self::Volatility,
        Self::None,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Market => "MKT",
            Self::Limit => "LMT",
            Self::Stop => "STP",
            Self::StopLimit => "STPLMT",
            Self::TrailingStop => "TRAIL",
            Self::Relative => "REL",
            Self::MarketOnClose => "MOC",
            Self::LimitOnClose => "LOC",
            Self::Vwap => "VWAP",
            Self::Volatility => "VOL",
            Self::None => "NONE",
            Self::Other(s) => s.as_str(),
        }
    }

    /// `VOL`, exact match. Volatility orders move their stock range fields
    /// at server version 26.
    pub fn is_volatility(&self) -> bool {
        matches!(self, Self::Volatility)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::KNOWN
            .into_iter()
            .find(|t| t.as_str() == s)
            .unwrap_or_else(|| Self::Other(s.to_string())))
    }
}

/// Time in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "DAY")]
    Day,
    #[serde(rename = "GTC")]
    GoodTilCancelled,
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    #[serde(rename = "GTD")]
    GoodTilDate,
    #[serde(untagged)]
    Other(String),
}

impl TimeInForce {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Day => "DAY",
            Self::GoodTilCancelled => "GTC",
            Self::ImmediateOrCancel => "IOC",
            Self::GoodTilDate => "GTD",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeInForce {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let known = [
            Self::Day,
            Self::GoodTilCancelled,
            Self::ImmediateOrCancel,
            Self::GoodTilDate,
        ];
        Ok(known
            .into_iter()
            .find(|t| t.as_str() == s)
            .unwrap_or_else(|| Self::Other(s.to_string())))
    }
}

// ============================================================================
// Integer-Based Enums
// ============================================================================
//
// Each keeps an `Other(i32)` variant for codes outside its fixed set.

/// Order origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Origin {
    #[default]
    Customer,
    Firm,
    #[serde(untagged)]
    Other(i32),
}

/// BOX auction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuctionStrategy {
    #[default]
    Unset,
    Match,
    Improvement,
    Transparent,
    #[serde(untagged)]
    Other(i32),
}

/// Combo leg open/close flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LegOpenClose {
    #[default]
    Same,
    Open,
    Close,
    Unknown,
    #[serde(untagged)]
    Other(i32),
}

/// Financial-advisor configuration document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaDataType {
    Groups,
    Profiles,
    Aliases,
    #[serde(untagged)]
    Other(i32),
}

impl FaDataType {
    /// Upper-case name, or an empty string for a code outside the fixed set.
    pub fn name(self) -> &'static str {
        match self {
            Self::Groups => "GROUPS",
            Self::Profiles => "PROFILES",
            Self::Aliases => "ALIASES",
            Self::Other(_) => "",
        }
    }
}

// ============================================================================
// i32 conversions for integer-based enums
// ============================================================================

impl From<i32> for Origin {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::Customer,
            1 => Self::Firm,
            other => Self::Other(other),
        }
    }
}

impl From<Origin> for i32 {
    fn from(o: Origin) -> i32 {
        match o {
            Origin::Customer => 0,
            Origin::Firm => 1,
            Origin::Other(v) => v,
        }
    }
}

impl From<i32> for AuctionStrategy {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::Unset,
            1 => Self::Match,
            2 => Self::Improvement,
            3 => Self::Transparent,
            other => Self::Other(other),
        }
    }
}

impl From<AuctionStrategy> for i32 {
    fn from(a: AuctionStrategy) -> i32 {
        match a {
            AuctionStrategy::Unset => 0,
            AuctionStrategy::Match => 1,
            AuctionStrategy::Improvement => 2,
            AuctionStrategy::Transparent => 3,
            AuctionStrategy::Other(v) => v,
        }
    }
}

impl From<i32> for LegOpenClose {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::Same,
            1 => Self::Open,
            2 => Self::Close,
            3 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

impl From<LegOpenClose> for i32 {
    fn from(l: LegOpenClose) -> i32 {
        match l {
            LegOpenClose::Same => 0,
            LegOpenClose::Open => 1,
            LegOpenClose::Close => 2,
            LegOpenClose::Unknown => 3,
            LegOpenClose::Other(v) => v,
        }
    }
}

impl From<i32> for FaDataType {
    fn from(v: i32) -> Self {
        match v {
            1 => Self::Groups,
            2 => Self::Profiles,
            3 => Self::Aliases,
            other => Self::Other(other),
        }
    }
}

impl From<FaDataType> for i32 {
    fn from(t: FaDataType) -> i32 {
        match t {
            FaDataType::Groups => 1,
            FaDataType::Profiles => 2,
            FaDataType::Aliases => 3,
            FaDataType::Other(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sec_type_display_round_trip() {
        let types = vec![
            (SecType::Stock, "STK"),
            (SecType::Option, "OPT"),
            (SecType::Future, "FUT"),
            (SecType::Forex, "CASH"),
            (SecType::Combo, "BAG"),
        ];
        for (variant, expected) in types {
            assert_eq!(variant.to_string(), expected);
            assert_eq!(SecType::from_str(expected).unwrap(), variant);
        }
    }

    #[test]
    fn combo_tag_is_case_insensitive() {
        assert!(SecType::Combo.is_combo());
        assert!(SecType::from_str("bag").unwrap().is_combo());
        assert!(SecType::from_str("Bag").unwrap().is_combo());
        assert!(!SecType::Stock.is_combo());
        assert!(!SecType::Other("BAGEL".into()).is_combo());
    }

    #[test]
    fn order_type_other_variant() {
        let parsed = OrderType::from_str("PEG").unwrap();
        assert_eq!(parsed, OrderType::Other("PEG".to_string()));
        assert_eq!(parsed.to_string(), "PEG");
        assert!(OrderType::from_str("VOL").unwrap().is_volatility());
    }

    #[test]
    fn action_from_str() {
        assert_eq!(Action::from_str("BUY").unwrap(), Action::Buy);
        assert_eq!(Action::from_str("SSHORT").unwrap(), Action::SellShort);
        let odd = Action::from_str("SLONG").unwrap();
        assert_eq!(odd, Action::Other("SLONG".into()));
        assert_eq!(odd.to_string(), "SLONG");
    }

    #[test]
    fn fa_data_type_names() {
        assert_eq!(FaDataType::from(2).name(), "PROFILES");
        assert_eq!(i32::from(FaDataType::Aliases), 3);
        assert_eq!(FaDataType::from(4), FaDataType::Other(4));
        assert_eq!(i32::from(FaDataType::Other(4)), 4);
    }

    #[test]
    fn origin_default() {
        assert_eq!(Origin::default(), Origin::Customer);
    }

    #[test]
    fn unknown_integer_codes_are_carried() {
        assert_eq!(Origin::from(2), Origin::Other(2));
        assert_eq!(i32::from(Origin::Other(2)), 2);
        assert_eq!(AuctionStrategy::from(7), AuctionStrategy::Other(7));
        assert_eq!(i32::from(AuctionStrategy::Improvement), 2);
        assert_eq!(LegOpenClose::from(9), LegOpenClose::Other(9));
        assert_eq!(i32::from(LegOpenClose::Close), 2);
    }
}
