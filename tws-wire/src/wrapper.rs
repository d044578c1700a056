//! Events delivered by the client.
//!
//! Every server message and every client-side failure arrives as one
//! `IBEvent` on the `UnboundedReceiver<IBEvent>` handed out by
//! `IBClient::new()`. Events arrive in wire order.

use serde::Serialize;

use crate::models::bar::Bar;
use crate::models::contract::{Contract, ContractDetails};
use crate::models::enums::FaDataType;
use crate::models::execution::Execution;
use crate::models::order::Order;
use crate::protocol::TickType;

// ============================================================================
// IBEvent
// ============================================================================

/// A single scanner result row within a `ScannerData` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerDataItem {
    pub rank: i32,
    pub contract_details: ContractDetails,
    pub distance: String,
    pub benchmark: String,
    pub projection: String,
}

/// Everything the client reports to its consumer.
///
/// ```rust,ignore
/// let (client, mut rx) = IBClient::new();
/// client.connect("127.0.0.1", 7496, 0).await?;
///
/// while let Some(event) = rx.recv().await {
///     match event {
///         IBEvent::NextValidId { order_id } => { /* ... */ }
///         IBEvent::TickPrice { req_id, tick_type, price, .. } => { /* ... */ }
///         IBEvent::Error { code, message, .. } => { /* ... */ }
///         IBEvent::ConnectionClosed => break,
///         _ => {}
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
#[allow(clippy::large_enum_variant)]
pub enum IBEvent {
    // ========================================================================
    // Connection & Error
    // ========================================================================

    /// Server error, warning, or client-side failure.
    ///
    /// Text-only reports (old-format server errors and read faults) carry
    /// `req_id == -1` and `code == 0`.
    Error {
        req_id: i32,
        code: i32,
        message: String,
    },

    /// The session ended because of a fault or because the server closed the
    /// stream. Never sent for a caller-initiated disconnect.
    ConnectionClosed,

    /// Next valid order id.
    NextValidId {
        order_id: i32,
    },

    /// Comma-separated list of accounts managed by this login.
    ManagedAccounts {
        accounts: String,
    },

    // ========================================================================
    // Market Data
    // ========================================================================

    TickPrice {
        req_id: i32,
        tick_type: TickType,
        price: f64,
        can_auto_execute: bool,
    },

    TickSize {
        req_id: i32,
        tick_type: TickType,
        size: i32,
    },

    /// Option model values. `None` means not yet computed.
    TickOptionComputation {
        req_id: i32,
        tick_type: TickType,
        implied_vol: Option<f64>,
        delta: Option<f64>,
    },

    UpdateMktDepth {
        req_id: i32,
        position: i32,
        operation: i32,
        side: i32,
        price: f64,
        size: i32,
    },

    UpdateMktDepthL2 {
        req_id: i32,
        position: i32,
        market_maker: String,
        operation: i32,
        side: i32,
        price: f64,
        size: i32,
    },

    // ========================================================================
    // Orders & Executions
    // ========================================================================

    OrderStatus {
        order_id: i32,
        status: String,
        filled: i32,
        remaining: i32,
        avg_fill_price: f64,
        perm_id: i32,
        parent_id: i32,
        last_fill_price: f64,
        client_id: i32,
    },

    OpenOrder {
        order_id: i32,
        contract: Contract,
        order: Box<Order>,
    },

    ExecDetails {
        order_id: i32,
        contract: Contract,
        execution: Execution,
    },

    // ========================================================================
    // Account & Portfolio
    // ========================================================================

    UpdateAccountValue {
        key: String,
        value: String,
        currency: String,
        account_name: Option<String>,
    },

    UpdatePortfolio {
        contract: Contract,
        position: i32,
        market_price: f64,
        market_value: f64,
        average_cost: f64,
        unrealized_pnl: f64,
        realized_pnl: f64,
        account_name: Option<String>,
    },

    UpdateAccountTime {
        time_stamp: String,
    },

    // ========================================================================
    // Contract Details
    // ========================================================================

    ContractDetails {
        details: ContractDetails,
    },

    /// Bond details; `details.bond` is always populated.
    BondContractDetails {
        details: ContractDetails,
    },

    // ========================================================================
    // News & Financial Advisor
    // ========================================================================

    UpdateNewsBulletin {
        msg_id: i32,
        msg_type: i32,
        message: String,
        orig_exchange: String,
    },

    ReceiveFa {
        fa_data_type: FaDataType,
        xml: String,
    },

    // ========================================================================
    // Historical Data
    // ========================================================================

    HistoricalData {
        req_id: i32,
        bar: Bar,
    },

    /// Completion marker sent after the last `HistoricalData` row of a reply.
    ///
    /// `marker` is `"finished"`, extended with `-start-end` when the server
    /// reports the covered range.
    ///
    /// Callback-style clients receive this as one more bar row whose date is
    /// the marker and whose open, high, low, close and volume are -1. Here
    /// the variant carries no OHLC fields at all; the variant itself marks
    /// the end of the rows.
    HistoricalDataEnd {
        req_id: i32,
        start: String,
        end: String,
        marker: String,
    },

    // ========================================================================
    // Scanner
    // ========================================================================

    ScannerParameters {
        xml: String,
    },

    ScannerData {
        req_id: i32,
        items: Vec<ScannerDataItem>,
    },
}

impl IBEvent {
    /// Build a client-side error event.
    pub(crate) fn error(req_id: i32, code: i32, message: impl Into<String>) -> Self {
        IBEvent::Error {
            req_id,
            code,
            message: message.into(),
        }
    }
}
