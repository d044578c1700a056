//! TWS socket protocol constants.
//!
//! Message tags, per-request payload versions, the server-version gates that
//! decide which optional fields exist on a connection, tick types and the
//! client-side error code table.

use serde::{Deserialize, Serialize};

// ============================================================================
// Client / Protocol Constants
// ============================================================================

/// Client protocol version announced as the first frame of the handshake.
pub const CLIENT_VERSION: i32 = 27;

/// Lowest server version this client will talk to.
pub const MIN_SERVER_VERSION: i32 = 1;

/// Host used when `connect` is given an empty host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Security type tag of a combination (multi-leg) instrument.
pub const BAG_SEC_TYPE: &str = "BAG";

/// Field terminator.
pub const NUL: u8 = 0;

/// "Unset" sentinel for integer fields, written as an empty frame.
pub const UNSET_INTEGER: i32 = i32::MAX;

/// "Unset" sentinel for double fields, written as an empty frame.
pub const UNSET_DOUBLE: f64 = f64::MAX;

// ============================================================================
// Incoming Message Tags (server -> client)
// ============================================================================

/// Incoming message tags, the first frame of every server message.
pub mod incoming {
    pub const TICK_PRICE: i32 = 1;
    pub const TICK_SIZE: i32 = 2;
    pub const ORDER_STATUS: i32 = 3;
    pub const ERR_MSG: i32 = 4;
    pub const OPEN_ORDER: i32 = 5;
    pub const ACCT_VALUE: i32 = 6;
    pub const PORTFOLIO_VALUE: i32 = 7;
    pub const ACCT_UPDATE_TIME: i32 = 8;
    pub const NEXT_VALID_ID: i32 = 9;
    pub const CONTRACT_DATA: i32 = 10;
    pub const EXECUTION_DATA: i32 = 11;
    pub const MARKET_DEPTH: i32 = 12;
    pub const MARKET_DEPTH_L2: i32 = 13;
    pub const NEWS_BULLETINS: i32 = 14;
    pub const MANAGED_ACCTS: i32 = 15;
    pub const RECEIVE_FA: i32 = 16;
    pub const HISTORICAL_DATA: i32 = 17;
    pub const BOND_CONTRACT_DATA: i32 = 18;
    pub const SCANNER_PARAMETERS: i32 = 19;
    pub const SCANNER_DATA: i32 = 20;
    pub const TICK_OPTION_COMPUTATION: i32 = 21;
}

// ============================================================================
// Outgoing Request Tags (client -> server)
// ============================================================================

/// Outgoing request tags, the first frame of every client request.
pub mod outgoing {
    pub const REQ_MKT_DATA: i32 = 1;
    pub const CANCEL_MKT_DATA: i32 = 2;
    pub const PLACE_ORDER: i32 = 3;
    pub const CANCEL_ORDER: i32 = 4;
    pub const REQ_OPEN_ORDERS: i32 = 5;
    pub const REQ_ACCOUNT_DATA: i32 = 6;
    pub const REQ_EXECUTIONS: i32 = 7;
    pub const REQ_IDS: i32 = 8;
    pub const REQ_CONTRACT_DATA: i32 = 9;
    pub const REQ_MKT_DEPTH: i32 = 10;
    pub const CANCEL_MKT_DEPTH: i32 = 11;
    pub const REQ_NEWS_BULLETINS: i32 = 12;
    pub const CANCEL_NEWS_BULLETINS: i32 = 13;
    pub const SET_SERVER_LOGLEVEL: i32 = 14;
    pub const REQ_AUTO_OPEN_ORDERS: i32 = 15;
    pub const REQ_ALL_OPEN_ORDERS: i32 = 16;
    pub const REQ_MANAGED_ACCTS: i32 = 17;
    pub const REQ_FA: i32 = 18;
    pub const REPLACE_FA: i32 = 19;
    pub const REQ_HISTORICAL_DATA: i32 = 20;
    pub const EXERCISE_OPTIONS: i32 = 21;
    pub const REQ_SCANNER_SUBSCRIPTION: i32 = 22;
    pub const CANCEL_SCANNER_SUBSCRIPTION: i32 = 23;
    pub const REQ_SCANNER_PARAMETERS: i32 = 24;
    pub const CANCEL_HISTORICAL_DATA: i32 = 25;
}

/// Payload-shape version written right after each request tag.
///
/// Fixed per request kind and independent of the negotiated server version.
pub mod wire_version {
    pub const REQ_MKT_DATA: i32 = 5;
    pub const CANCEL_MKT_DATA: i32 = 1;
    pub const PLACE_ORDER: i32 = 20;
    pub const CANCEL_ORDER: i32 = 1;
    pub const REQ_OPEN_ORDERS: i32 = 1;
    pub const REQ_ACCOUNT_DATA: i32 = 2;
    pub const REQ_EXECUTIONS: i32 = 2;
    pub const REQ_IDS: i32 = 1;
    pub const REQ_CONTRACT_DATA: i32 = 2;
    pub const REQ_MKT_DEPTH: i32 = 3;
    pub const CANCEL_MKT_DEPTH: i32 = 1;
    pub const REQ_NEWS_BULLETINS: i32 = 1;
    pub const CANCEL_NEWS_BULLETINS: i32 = 1;
    pub const SET_SERVER_LOGLEVEL: i32 = 1;
    pub const REQ_AUTO_OPEN_ORDERS: i32 = 1;
    pub const REQ_ALL_OPEN_ORDERS: i32 = 1;
    pub const REQ_MANAGED_ACCTS: i32 = 1;
    pub const REQ_FA: i32 = 1;
    pub const REPLACE_FA: i32 = 1;
    pub const REQ_HISTORICAL_DATA: i32 = 3;
    pub const EXERCISE_OPTIONS: i32 = 1;
    pub const REQ_SCANNER_SUBSCRIPTION: i32 = 3;
    pub const CANCEL_SCANNER_SUBSCRIPTION: i32 = 1;
    pub const REQ_SCANNER_PARAMETERS: i32 = 1;
    pub const CANCEL_HISTORICAL_DATA: i32 = 1;
}

// ============================================================================
// Server Version Gates
// ============================================================================

/// Negotiated server versions at which optional fields or whole requests
/// become available.
pub mod server_version {
    pub const LOCAL_SYMBOL: i32 = 2;
    pub const CLIENT_ID: i32 = 3;
    pub const PARENT_ID: i32 = 4;
    pub const CONTRACT_DETAILS: i32 = 4;
    pub const ORDER_EXTENDED: i32 = 5;
    pub const MKT_DEPTH: i32 = 6;
    pub const HIDDEN: i32 = 7;
    pub const COMBO_LEGS: i32 = 8;
    pub const SHARES_ALLOCATION: i32 = 9;
    pub const ACCT_CODE: i32 = 9;
    pub const EXECUTION_FILTER: i32 = 9;
    pub const DISCRETIONARY_AMT: i32 = 10;
    pub const GOOD_AFTER_TIME: i32 = 11;
    pub const GOOD_TILL_DATE: i32 = 12;
    pub const FA: i32 = 13;
    pub const PRIMARY_EXCHANGE: i32 = 14;
    pub const MULTIPLIER: i32 = 15;
    pub const HISTORICAL_DATA: i32 = 16;
    pub const FORMAT_DATE: i32 = 17;
    pub const SHORT_SALE_SLOT: i32 = 18;
    pub const EXTENDED_ORDER_ATTRIBS: i32 = 19;
    pub const MKT_DEPTH_ROWS: i32 = 19;
    pub const SERVER_TIME: i32 = 20;
    pub const HIST_END_DATE_BAR_SIZE: i32 = 20;
    pub const EXERCISE_OPTIONS: i32 = 21;
    pub const OVERRIDE_PCT_CONSTRAINTS: i32 = 22;
    pub const SCANNER: i32 = 24;
    pub const SCANNER_OPTION_VOLUME: i32 = 25;
    pub const VOLATILITY_ORDERS: i32 = 26;
    /// Only this exact release carries the volatility-order stock range
    /// inside the volatility block. Compared with `==`, never `>=`.
    pub const VOL_STOCK_RANGE_ONLY: i32 = 26;
    pub const STOCK_TYPE_FILTER: i32 = 27;
    pub const DELTA_NEUTRAL_AUX: i32 = 28;
}

// ============================================================================
// TickType Enum
// ============================================================================

/// Tick type identifiers carried by price, size and option-computation ticks.
///
/// Codes this client does not know arrive as `Other` so newer servers can
/// add tick types without ending the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickType {
    BidSize,
    Bid,
    Ask,
    AskSize,
    Last,
    LastSize,
    High,
    Low,
    Volume,
    Close,
    BidOption,
    AskOption,
    LastOption,
    #[serde(untagged)]
    Other(i32),
}

impl TickType {
    /// Display name of the field this tick updates.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::BidSize => "bidSize",
            Self::Bid => "bidPrice",
            Self::Ask => "askPrice",
            Self::AskSize => "askSize",
            Self::Last => "lastPrice",
            Self::LastSize => "lastSize",
            Self::High => "high",
            Self::Low => "low",
            Self::Volume => "volume",
            Self::Close => "close",
            Self::BidOption => "bidOptComp",
            Self::AskOption => "askOptComp",
            Self::LastOption => "lastOptComp",
            Self::Other(_) => "unknown",
        }
    }

    /// The size tick paired with a bid, ask or last price tick.
    pub fn size_tick_for(self) -> Option<TickType> {
        match self {
            Self::Bid => Some(Self::BidSize),
            Self::Ask => Some(Self::AskSize),
            Self::Last => Some(Self::LastSize),
            _ => None,
        }
    }
}

impl From<i32> for TickType {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::BidSize,
            1 => Self::Bid,
            2 => Self::Ask,
            3 => Self::AskSize,
            4 => Self::Last,
            5 => Self::LastSize,
            6 => Self::High,
            7 => Self::Low,
            8 => Self::Volume,
            9 => Self::Close,
            10 => Self::BidOption,
            11 => Self::AskOption,
            12 => Self::LastOption,
            other => Self::Other(other),
        }
    }
}

impl From<TickType> for i32 {
    fn from(tt: TickType) -> i32 {
        match tt {
            TickType::BidSize => 0,
            TickType::Bid => 1,
            TickType::Ask => 2,
            TickType::AskSize => 3,
            TickType::Last => 4,
            TickType::LastSize => 5,
            TickType::High => 6,
            TickType::Low => 7,
            TickType::Volume => 8,
            TickType::Close => 9,
            TickType::BidOption => 10,
            TickType::AskOption => 11,
            TickType::LastOption => 12,
            TickType::Other(v) => v,
        }
    }
}

// ============================================================================
// Client Error Codes
// ============================================================================

/// A client-side error code and its base message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMsg {
    pub code: i32,
    pub msg: &'static str,
}

impl CodeMsg {
    const fn new(code: i32, msg: &'static str) -> Self {
        Self { code, msg }
    }
}

/// Errors raised by the client itself rather than by the server.
///
/// Delivered through `IBEvent::Error` with the code below and the message
/// followed by any request-specific detail.
pub mod client_errors {
    use super::CodeMsg;

    /// Id used for errors that are not tied to a caller-supplied id.
    pub const NO_VALID_ID: i32 = -1;

    pub const ALREADY_CONNECTED: CodeMsg = CodeMsg::new(501, "Already connected.");
    pub const CONNECT_FAIL: CodeMsg = CodeMsg::new(
        502,
        "Couldn't connect to TWS. Confirm that \"Enable ActiveX and Socket Clients\" is enabled on the TWS \"Configure->API\" menu.",
    );
    pub const UPDATE_TWS: CodeMsg =
        CodeMsg::new(503, "The TWS is out of date and must be upgraded.");
    pub const NOT_CONNECTED: CodeMsg = CodeMsg::new(504, "Not connected");
    pub const UNKNOWN_ID: CodeMsg = CodeMsg::new(505, "Fatal Error: Unknown message id.");
    pub const BAD_MESSAGE: CodeMsg = CodeMsg::new(508, "Bad message - ");
    pub const FAIL_SEND_REQMKT: CodeMsg =
        CodeMsg::new(510, "Request Market Data Sending Error - ");
    pub const FAIL_SEND_CANMKT: CodeMsg =
        CodeMsg::new(511, "Cancel Market Data Sending Error - ");
    pub const FAIL_SEND_ORDER: CodeMsg = CodeMsg::new(512, "Order Sending Error - ");
    pub const FAIL_SEND_ACCT: CodeMsg =
        CodeMsg::new(513, "Account Update Request Sending Error - ");
    pub const FAIL_SEND_EXEC: CodeMsg =
        CodeMsg::new(514, "Request For Executions Sending Error - ");
    pub const FAIL_SEND_CORDER: CodeMsg = CodeMsg::new(515, "Cancel Order Sending Error - ");
    pub const FAIL_SEND_OORDER: CodeMsg =
        CodeMsg::new(516, "Request Open Order Sending Error - ");
    pub const UNKNOWN_CONTRACT: CodeMsg = CodeMsg::new(
        517,
        "Unknown contract. Verify the contract details supplied.",
    );
    pub const FAIL_SEND_REQCONTRACT: CodeMsg =
        CodeMsg::new(518, "Request Contract Data Sending Error - ");
    pub const FAIL_SEND_REQMKTDEPTH: CodeMsg =
        CodeMsg::new(519, "Request Market Depth Sending Error - ");
    pub const FAIL_SEND_CANMKTDEPTH: CodeMsg =
        CodeMsg::new(520, "Cancel Market Depth Sending Error - ");
    pub const FAIL_SEND_SERVER_LOG_LEVEL: CodeMsg =
        CodeMsg::new(521, "Set Server Log Level Sending Error - ");
    pub const FAIL_SEND_FA_REQUEST: CodeMsg =
        CodeMsg::new(522, "FA Information Request Sending Error - ");
    pub const FAIL_SEND_FA_REPLACE: CodeMsg =
        CodeMsg::new(523, "FA Information Replace Sending Error - ");
    pub const FAIL_SEND_REQSCANNER: CodeMsg =
        CodeMsg::new(524, "Request Scanner Subscription Sending Error - ");
    pub const FAIL_SEND_CANSCANNER: CodeMsg =
        CodeMsg::new(525, "Cancel Scanner Subscription Sending Error - ");
    pub const FAIL_SEND_REQSCANNERPARAMETERS: CodeMsg =
        CodeMsg::new(526, "Request Scanner Parameter Sending Error - ");
    pub const FAIL_SEND_REQHISTDATA: CodeMsg =
        CodeMsg::new(527, "Request Historical Data Sending Error - ");
    pub const FAIL_SEND_CANHISTDATA: CodeMsg =
        CodeMsg::new(528, "Cancel Historical Data Sending Error - ");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_type_from_code() {
        assert_eq!(TickType::from(0), TickType::BidSize);
        assert_eq!(TickType::from(4), TickType::Last);
        assert_eq!(TickType::from(12), TickType::LastOption);
        assert_eq!(TickType::from(13), TickType::Other(13));
        assert_eq!(TickType::from(-1), TickType::Other(-1));
        assert_eq!(TickType::Other(13).field_name(), "unknown");
        assert_eq!(TickType::Other(13).size_tick_for(), None);
    }

    #[test]
    fn tick_type_into_i32() {
        assert_eq!(i32::from(TickType::BidSize), 0);
        assert_eq!(i32::from(TickType::Last), 4);
        assert_eq!(i32::from(TickType::LastOption), 12);
        assert_eq!(i32::from(TickType::Other(45)), 45);
    }

    #[test]
    fn size_tick_pairs() {
        assert_eq!(TickType::Bid.size_tick_for(), Some(TickType::BidSize));
        assert_eq!(TickType::Ask.size_tick_for(), Some(TickType::AskSize));
        assert_eq!(TickType::Last.size_tick_for(), Some(TickType::LastSize));
        assert_eq!(TickType::High.size_tick_for(), None);
        assert_eq!(TickType::BidSize.size_tick_for(), None);
    }

    #[test]
    fn field_names() {
        assert_eq!(TickType::Bid.field_name(), "bidPrice");
        assert_eq!(TickType::LastOption.field_name(), "lastOptComp");
    }

    #[test]
    fn protocol_constants_sanity() {
        assert_eq!(CLIENT_VERSION, 27);
        assert_eq!(server_version::SERVER_TIME, 20);
        assert_eq!(server_version::CLIENT_ID, 3);
        assert_eq!(server_version::COMBO_LEGS, 8);
        assert_eq!(UNSET_INTEGER, i32::MAX);
        assert_eq!(UNSET_DOUBLE, f64::MAX);
    }

    #[test]
    fn message_id_constants() {
        assert_eq!(incoming::TICK_PRICE, 1);
        assert_eq!(incoming::TICK_OPTION_COMPUTATION, 21);
        assert_eq!(outgoing::REQ_MKT_DATA, 1);
        assert_eq!(outgoing::CANCEL_HISTORICAL_DATA, 25);
        assert_eq!(wire_version::PLACE_ORDER, 20);
    }

    #[test]
    fn client_error_codes() {
        assert_eq!(client_errors::NO_VALID_ID, -1);
        assert_eq!(client_errors::UPDATE_TWS.code, 503);
        assert_eq!(client_errors::NOT_CONNECTED.code, 504);
        assert_eq!(client_errors::FAIL_SEND_CANHISTDATA.code, 528);
    }
}
