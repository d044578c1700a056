//! tws-wire -- async client for the legacy TWS socket protocol.
//!
//! Speaks the NUL-delimited text protocol of server versions 1 through 28:
//! handshake, 25 outgoing requests gated by server version, and decoding
//! of the 21 server message kinds into [`IBEvent`]s.
//!
//! ## Modules
//!
//! - [`models`] -- Contract, Order, Execution, scanner and bar records
//! - [`protocol`] -- Message ids, wire versions, server version gates, error codes
//! - [`errors`] -- Error types for the library
//! - [`encoder`] -- Field encoding for outgoing requests
//! - [`decoder`] -- Field decoding and server message dispatch
//! - [`transport`] -- TCP connection and handshake
//! - [`wrapper`] -- IBEvent enum (everything the client reports)
//! - [`reader`] -- Dispatcher task that feeds the event channel
//! - [`client`] -- IBClient (main API entry point)

pub mod client;
pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod reader;
pub mod transport;
pub mod wrapper;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use errors::{IBApiError, Result};

// Contract types
pub use models::contract::{BondTerms, ComboLeg, Contract, ContractDetails};

// Order types
pub use models::order::Order;

// Execution types
pub use models::execution::{Execution, ExecutionFilter};

// Bar / historical data types
pub use models::bar::Bar;

// Scanner
pub use models::scanner::ScannerSubscription;

// Enums
pub use models::enums::*;

// Protocol
pub use protocol::TickType;

// Encoder / Decoder / Transport
pub use decoder::MessageDecoder;
pub use encoder::MessageEncoder;
pub use transport::Transport;

// Client / Reader / Events
pub use client::IBClient;
pub use reader::MessageReader;
pub use wrapper::{IBEvent, ScannerDataItem};
