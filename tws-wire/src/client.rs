//! TWS socket client.
//!
//! `IBClient` owns the connection lifecycle and encodes every outgoing
//! request. Server replies and client-side failures are delivered as
//! `IBEvent`s on the receiver returned by `IBClient::new()`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};

use chrono::NaiveDateTime;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::encoder::MessageEncoder;
use crate::errors::{IBApiError, Result};
use crate::models::contract::Contract;
use crate::models::enums::FaDataType;
use crate::models::execution::ExecutionFilter;
use crate::models::order::Order;
use crate::models::scanner::ScannerSubscription;
use crate::protocol::client_errors::{self, NO_VALID_ID};
use crate::protocol::{outgoing, server_version, wire_version, CodeMsg};
use crate::reader::MessageReader;
use crate::transport::{Transport, TransportWriter};
use crate::wrapper::IBEvent;

// ============================================================================
// Session state
// ============================================================================

/// A live connection: the write half plus the dispatcher task reading the
/// other half.
struct Session {
    writer: TransportWriter,
    reader: JoinHandle<()>,
    generation: u64,
    server_version: i32,
}

#[derive(Debug, Default)]
struct ConnInfo {
    server_version: i32,
    tws_time: Option<String>,
    client_id: Option<i32>,
}

struct Inner {
    /// Held from the connected check through the last byte of a request.
    session: Mutex<Option<Session>>,
    connected: AtomicBool,
    info: StdMutex<ConnInfo>,
    events: mpsc::UnboundedSender<IBEvent>,
    /// Bumped on every successful connect so a stale dispatcher cannot tear
    /// down a newer session.
    generation: AtomicU64,
}

impl Inner {
    fn report(&self, req_id: i32, err: CodeMsg, detail: &str) {
        tracing::warn!(req_id, code = err.code, detail, "{}", err.msg);
        let _ = self
            .events
            .send(IBEvent::error(req_id, err.code, format!("{}{detail}", err.msg)));
    }

    fn set_info(&self, info: ConnInfo) {
        if let Ok(mut guard) = self.info.lock() {
            *guard = info;
        }
    }

    fn info<T>(&self, f: impl FnOnce(&ConnInfo) -> T) -> Option<T> {
        self.info.lock().ok().map(|guard| f(&guard))
    }

    /// Close the session's socket and forget its negotiated state.
    async fn close_session(&self, mut session: Session, abort_reader: bool) {
        self.connected.store(false, Ordering::SeqCst);
        self.set_info(ConnInfo::default());
        if abort_reader {
            session.reader.abort();
        }
        session.writer.shutdown().await;
    }

    /// Fault-driven teardown requested by the dispatcher of `generation`.
    ///
    /// Does nothing if that session was already closed by the caller or by
    /// a failed write.
    async fn connection_lost(&self, generation: u64) {
        let mut guard = self.session.lock().await;
        let session = match guard.take() {
            Some(s) if s.generation == generation => s,
            other => {
                *guard = other;
                return;
            }
        };
        self.close_session(session, false).await;
        drop(guard);
        tracing::info!(generation, "connection closed");
        let _ = self.events.send(IBEvent::ConnectionClosed);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.reader.abort();
        }
    }
}

// ============================================================================
// Request descriptors
// ============================================================================

/// Error routing and version gate for one request kind.
struct RequestSpec {
    name: &'static str,
    /// Minimum server version, with the detail appended to the
    /// upgrade-required message.
    min_version: Option<(i32, &'static str)>,
    /// Id reported when the client is not connected.
    not_connected_id: i32,
    /// Code and id reported when writing the request fails.
    fail: CodeMsg,
    fail_id: i32,
}

impl RequestSpec {
    fn new(name: &'static str, fail: CodeMsg, fail_id: i32) -> Self {
        Self {
            name,
            min_version: None,
            not_connected_id: NO_VALID_ID,
            fail,
            fail_id,
        }
    }

    fn min_version(mut self, version: i32, detail: &'static str) -> Self {
        self.min_version = Some((version, detail));
        self
    }

    fn not_connected_id(mut self, id: i32) -> Self {
        self.not_connected_id = id;
        self
    }
}

const NO_SCANNER: &str = "  It does not support API scanner subscription.";

// ============================================================================
// IBClient
// ============================================================================

/// Async TWS socket client.
///
/// Cheap to clone; all clones share one connection and one event channel.
/// Request methods never block on replies: each writes one request and
/// returns, and the server's answers arrive later as events.
///
/// ```rust,ignore
/// let (client, mut rx) = IBClient::new();
/// client.connect("127.0.0.1", 7496, 0).await?;
/// client.req_mkt_data(1, &Contract::stock("AAPL", "SMART", "USD")).await?;
///
/// while let Some(event) = rx.recv().await {
///     match event {
///         IBEvent::TickPrice { price, .. } => println!("{price}"),
///         IBEvent::ConnectionClosed => break,
///         _ => {}
///     }
/// }
/// ```
#[derive(Clone)]
pub struct IBClient {
    inner: Arc<Inner>,
}

impl IBClient {
    /// Create a disconnected client and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IBEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let client = Self {
            inner: Arc::new(Inner {
                session: Mutex::new(None),
                connected: AtomicBool::new(false),
                info: StdMutex::new(ConnInfo::default()),
                events,
                generation: AtomicU64::new(0),
            }),
        };
        (client, rx)
    }

    // ========================================================================
    // Connection Management
    // ========================================================================

    /// Connect, run the handshake and start the dispatcher.
    ///
    /// Failures are reported as events as well as returned: already
    /// connected (501), server too old (503), anything else (502).
    pub async fn connect(&self, host: &str, port: u16, client_id: i32) -> Result<()> {
        let mut guard = self.inner.session.lock().await;
        if guard.is_some() {
            self.inner.report(NO_VALID_ID, client_errors::ALREADY_CONNECTED, "");
            return Err(IBApiError::AlreadyConnected);
        }

        let transport = match Transport::connect(host, port, client_id).await {
            Ok(t) => t,
            Err(e @ IBApiError::UpgradeRequired { .. }) => {
                self.inner.report(NO_VALID_ID, client_errors::UPDATE_TWS, "");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(host, port, "connect failed: {e}");
                self.inner.report(NO_VALID_ID, client_errors::CONNECT_FAIL, "");
                return Err(e);
            }
        };

        let server_version = transport.server_version();
        let info = ConnInfo {
            server_version,
            tws_time: transport.tws_time().map(str::to_string),
            client_id: transport.client_id(),
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (transport_reader, writer) = transport.into_split();

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let reader = MessageReader::new(transport_reader, server_version, self.inner.events.clone())
            .spawn(move || async move {
                if let Some(inner) = weak.upgrade() {
                    inner.connection_lost(generation).await;
                }
            });

        *guard = Some(Session {
            writer,
            reader,
            generation,
            server_version,
        });
        self.inner.set_info(info);
        self.inner.connected.store(true, Ordering::SeqCst);

        tracing::info!(server_version, client_id, generation, "connected");
        Ok(())
    }

    /// Stop the dispatcher and close the socket.
    ///
    /// No-op when not connected. Emits no event.
    pub async fn disconnect(&self) {
        let mut guard = self.inner.session.lock().await;
        if let Some(session) = guard.take() {
            self.inner.close_session(session, true).await;
            tracing::info!("disconnected");
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Negotiated server version, 0 when not connected.
    pub fn server_version(&self) -> i32 {
        self.inner.info(|i| i.server_version).unwrap_or(0)
    }

    /// Server time string received at connect, if the server sent one.
    pub fn connection_time(&self) -> Option<String> {
        self.inner.info(|i| i.tws_time.clone()).flatten()
    }

    /// `connection_time` parsed as a local timestamp. A trailing time zone
    /// token is ignored.
    pub fn connection_time_parsed(&self) -> Option<NaiveDateTime> {
        parse_tws_time(&self.connection_time()?)
    }

    /// Client id sent during the handshake.
    pub fn client_id(&self) -> Option<i32> {
        self.inner.info(|i| i.client_id).flatten()
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    /// Encode and write one request while holding the session lock.
    ///
    /// Nothing is written unless the request passes the connected check, the
    /// version gate and encode-time validation. A failed write tears the
    /// session down and announces `ConnectionClosed`.
    async fn send_request<F>(&self, spec: RequestSpec, build: F) -> Result<()>
    where
        F: FnOnce(&mut MessageEncoder),
    {
        let mut guard = self.inner.session.lock().await;
        let Some(session) = guard.as_mut() else {
            self.inner.report(spec.not_connected_id, client_errors::NOT_CONNECTED, "");
            return Err(IBApiError::NotConnected);
        };

        let sv = session.server_version;
        if let Some((required, detail)) = spec.min_version {
            if sv < required {
                self.inner.report(NO_VALID_ID, client_errors::UPDATE_TWS, detail);
                return Err(IBApiError::UpgradeRequired {
                    feature: spec.name,
                    required,
                    server_version: sv,
                });
            }
        }

        let mut enc = MessageEncoder::new(sv);
        build(&mut enc);
        let bytes = match enc.finalize() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.inner
                    .report(spec.fail_id, client_errors::BAD_MESSAGE, &e.to_string());
                return Err(e);
            }
        };

        let sent = session.writer.send_message(&bytes).await;
        if let Err(e) = sent {
            tracing::error!(request = spec.name, "write failed: {e}");
            self.inner.report(spec.fail_id, spec.fail, &e.to_string());
            if let Some(session) = guard.take() {
                self.inner.close_session(session, true).await;
            }
            drop(guard);
            let _ = self.inner.events.send(IBEvent::ConnectionClosed);
            return Err(e);
        }

        tracing::debug!(request = spec.name, bytes = bytes.len(), "request sent");
        Ok(())
    }

    // ========================================================================
    // Market Data
    // ========================================================================

    /// Subscribe to market data.
    /// Response: `TickPrice`, `TickSize`, `TickOptionComputation`.
    pub async fn req_mkt_data(&self, ticker_id: i32, contract: &Contract) -> Result<()> {
        let spec = RequestSpec::new("req_mkt_data", client_errors::FAIL_SEND_REQMKT, ticker_id);
        self.send_request(spec, |enc| {
            let sv = enc.server_version();
            enc.encode_field_i32(outgoing::REQ_MKT_DATA)
                .encode_field_i32(wire_version::REQ_MKT_DATA)
                .encode_field_i32(ticker_id)
                .encode_field_str(&contract.symbol)
                .encode_field_opt_display(contract.sec_type.as_ref())
                .encode_field_str(&contract.expiry)
                .encode_field_f64(contract.strike)
                .encode_field_opt_display(contract.right.as_ref());
            if sv >= server_version::MULTIPLIER {
                enc.encode_field_str(&contract.multiplier);
            }
            enc.encode_field_str(&contract.exchange);
            if sv >= server_version::PRIMARY_EXCHANGE {
                enc.encode_field_str(&contract.primary_exch);
            }
            enc.encode_field_str(&contract.currency);
            if sv >= server_version::LOCAL_SYMBOL {
                enc.encode_field_str(&contract.local_symbol);
            }
            if sv >= server_version::COMBO_LEGS && contract.is_combo() {
                enc.encode_combo_legs(contract, false);
            }
        })
        .await
    }

    pub async fn cancel_mkt_data(&self, ticker_id: i32) -> Result<()> {
        let spec = RequestSpec::new("cancel_mkt_data", client_errors::FAIL_SEND_CANMKT, ticker_id);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::CANCEL_MKT_DATA)
                .encode_field_i32(wire_version::CANCEL_MKT_DATA)
                .encode_field_i32(ticker_id);
        })
        .await
    }

    /// Subscribe to market depth.
    /// Response: `UpdateMktDepth`, `UpdateMktDepthL2`.
    pub async fn req_mkt_depth(&self, ticker_id: i32, contract: &Contract, num_rows: i32) -> Result<()> {
        let spec = RequestSpec::new("req_mkt_depth", client_errors::FAIL_SEND_REQMKTDEPTH, ticker_id)
            .min_version(server_version::MKT_DEPTH, "");
        self.send_request(spec, |enc| {
            let sv = enc.server_version();
            enc.encode_field_i32(outgoing::REQ_MKT_DEPTH)
                .encode_field_i32(wire_version::REQ_MKT_DEPTH)
                .encode_field_i32(ticker_id)
                .encode_field_str(&contract.symbol)
                .encode_field_opt_display(contract.sec_type.as_ref())
                .encode_field_str(&contract.expiry)
                .encode_field_f64(contract.strike)
                .encode_field_opt_display(contract.right.as_ref());
            if sv >= server_version::MULTIPLIER {
                enc.encode_field_str(&contract.multiplier);
            }
            enc.encode_field_str(&contract.exchange)
                .encode_field_str(&contract.currency)
                .encode_field_str(&contract.local_symbol);
            if sv >= server_version::MKT_DEPTH_ROWS {
                enc.encode_field_i32(num_rows);
            }
        })
        .await
    }

    pub async fn cancel_mkt_depth(&self, ticker_id: i32) -> Result<()> {
        let spec = RequestSpec::new("cancel_mkt_depth", client_errors::FAIL_SEND_CANMKTDEPTH, ticker_id)
            .min_version(server_version::MKT_DEPTH, "");
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::CANCEL_MKT_DEPTH)
                .encode_field_i32(wire_version::CANCEL_MKT_DEPTH)
                .encode_field_i32(ticker_id);
        })
        .await
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Place or modify an order.
    /// Response: `OpenOrder`, `OrderStatus`.
    #[allow(clippy::too_many_lines)]
    pub async fn place_order(&self, id: i32, contract: &Contract, order: &Order) -> Result<()> {
        let spec = RequestSpec::new("place_order", client_errors::FAIL_SEND_ORDER, id);
        self.send_request(spec, |enc| {
            let sv = enc.server_version();
            enc.encode_field_i32(outgoing::PLACE_ORDER)
                .encode_field_i32(wire_version::PLACE_ORDER)
                .encode_field_i32(id);

            // contract
            enc.encode_field_str(&contract.symbol)
                .encode_field_opt_display(contract.sec_type.as_ref())
                .encode_field_str(&contract.expiry)
                .encode_field_f64(contract.strike)
                .encode_field_opt_display(contract.right.as_ref());
            if sv >= server_version::MULTIPLIER {
                enc.encode_field_str(&contract.multiplier);
            }
            enc.encode_field_str(&contract.exchange);
            if sv >= server_version::PRIMARY_EXCHANGE {
                enc.encode_field_str(&contract.primary_exch);
            }
            enc.encode_field_str(&contract.currency);
            if sv >= server_version::LOCAL_SYMBOL {
                enc.encode_field_str(&contract.local_symbol);
            }

            // main order fields
            enc.encode_field_opt_display(order.action.as_ref())
                .encode_field_i32(order.total_quantity)
                .encode_field_opt_display(order.order_type.as_ref())
                .encode_field_f64(order.lmt_price)
                .encode_field_f64(order.aux_price);

            // extended order fields
            enc.encode_field_opt_display(order.tif.as_ref())
                .encode_field_str(&order.oca_group)
                .encode_field_str(&order.account)
                .encode_field_str(&order.open_close)
                .encode_field_i32(i32::from(order.origin))
                .encode_field_str(&order.order_ref)
                .encode_field_bool(order.transmit);
            if sv >= server_version::PARENT_ID {
                enc.encode_field_i32(order.parent_id);
            }
            if sv >= server_version::ORDER_EXTENDED {
                enc.encode_field_bool(order.block_order)
                    .encode_field_bool(order.sweep_to_fill)
                    .encode_field_i32(order.display_size)
                    .encode_field_i32(order.trigger_method)
                    .encode_field_bool(order.ignore_rth);
            }
            if sv >= server_version::HIDDEN {
                enc.encode_field_bool(order.hidden);
            }
            if sv >= server_version::COMBO_LEGS && contract.is_combo() {
                enc.encode_combo_legs(contract, true);
            }
            if sv >= server_version::SHARES_ALLOCATION {
                enc.encode_field_str(&order.shares_allocation);
            }
            if sv >= server_version::DISCRETIONARY_AMT {
                enc.encode_field_f64(order.discretionary_amt);
            }
            if sv >= server_version::GOOD_AFTER_TIME {
                enc.encode_field_str(&order.good_after_time);
            }
            if sv >= server_version::GOOD_TILL_DATE {
                enc.encode_field_str(&order.good_till_date);
            }
            if sv >= server_version::FA {
                enc.encode_field_str(&order.fa_group)
                    .encode_field_str(&order.fa_method)
                    .encode_field_str(&order.fa_percentage)
                    .encode_field_str(&order.fa_profile);
            }
            if sv >= server_version::SHORT_SALE_SLOT {
                enc.encode_field_i32(order.short_sale_slot)
                    .encode_field_str(&order.designated_location);
            }

            // At exactly server version 26 a volatility order carries its
            // stock range in the volatility block instead of here.
            let vol_range_moved = sv == server_version::VOL_STOCK_RANGE_ONLY && order.is_volatility();
            if sv >= server_version::EXTENDED_ORDER_ATTRIBS {
                let (lower, upper) = if vol_range_moved {
                    (None, None)
                } else {
                    (order.stock_range_lower, order.stock_range_upper)
                };
                enc.encode_field_i32(order.oca_type)
                    .encode_field_bool(order.rth_only)
                    .encode_field_str(&order.rule_80a)
                    .encode_field_str(&order.settling_firm)
                    .encode_field_bool(order.all_or_none)
                    .encode_field_max_i32(order.min_qty)
                    .encode_field_max_f64(order.percent_offset)
                    .encode_field_bool(order.e_trade_only)
                    .encode_field_bool(order.firm_quote_only)
                    .encode_field_max_f64(order.nbbo_price_cap)
                    .encode_field_max_i32(order.auction_strategy.map(i32::from))
                    .encode_field_max_f64(order.starting_price)
                    .encode_field_max_f64(order.stock_ref_price)
                    .encode_field_max_f64(order.delta)
                    .encode_field_max_f64(lower)
                    .encode_field_max_f64(upper);
            }
            if sv >= server_version::OVERRIDE_PCT_CONSTRAINTS {
                enc.encode_field_bool(order.override_percentage_constraints);
            }
            if sv >= server_version::VOLATILITY_ORDERS {
                enc.encode_field_max_f64(order.volatility)
                    .encode_field_max_i32(order.volatility_type);
                if sv < server_version::DELTA_NEUTRAL_AUX {
                    enc.encode_field_bool(order.delta_neutral_order_type.eq_ignore_ascii_case("MKT"));
                } else {
                    enc.encode_field_str(&order.delta_neutral_order_type)
                        .encode_field_max_f64(order.delta_neutral_aux_price);
                }
                enc.encode_field_bool(order.continuous_update);
                if sv == server_version::VOL_STOCK_RANGE_ONLY {
                    let (lower, upper) = if order.is_volatility() {
                        (order.stock_range_lower, order.stock_range_upper)
                    } else {
                        (None, None)
                    };
                    enc.encode_field_max_f64(lower).encode_field_max_f64(upper);
                }
                enc.encode_field_max_i32(order.reference_price_type);
            }
        })
        .await
    }

    pub async fn cancel_order(&self, id: i32) -> Result<()> {
        let spec = RequestSpec::new("cancel_order", client_errors::FAIL_SEND_CORDER, id);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::CANCEL_ORDER)
                .encode_field_i32(wire_version::CANCEL_ORDER)
                .encode_field_i32(id);
        })
        .await
    }

    /// Open orders placed by this client.
    pub async fn req_open_orders(&self) -> Result<()> {
        let spec = RequestSpec::new("req_open_orders", client_errors::FAIL_SEND_OORDER, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_OPEN_ORDERS)
                .encode_field_i32(wire_version::REQ_OPEN_ORDERS);
        })
        .await
    }

    /// Bind orders placed in TWS to this client (client id 0 only).
    pub async fn req_auto_open_orders(&self, auto_bind: bool) -> Result<()> {
        let spec = RequestSpec::new("req_auto_open_orders", client_errors::FAIL_SEND_OORDER, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_AUTO_OPEN_ORDERS)
                .encode_field_i32(wire_version::REQ_AUTO_OPEN_ORDERS)
                .encode_field_bool(auto_bind);
        })
        .await
    }

    pub async fn req_all_open_orders(&self) -> Result<()> {
        let spec = RequestSpec::new("req_all_open_orders", client_errors::FAIL_SEND_OORDER, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_ALL_OPEN_ORDERS)
                .encode_field_i32(wire_version::REQ_ALL_OPEN_ORDERS);
        })
        .await
    }

    /// Request the next valid order id.
    /// Response: `NextValidId`.
    pub async fn req_ids(&self, num_ids: i32) -> Result<()> {
        let spec = RequestSpec::new("req_ids", client_errors::FAIL_SEND_CORDER, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_IDS)
                .encode_field_i32(wire_version::REQ_IDS)
                .encode_field_i32(num_ids);
        })
        .await
    }

    /// Response: `ExecDetails`.
    pub async fn req_executions(&self, filter: &ExecutionFilter) -> Result<()> {
        let spec = RequestSpec::new("req_executions", client_errors::FAIL_SEND_EXEC, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_EXECUTIONS)
                .encode_field_i32(wire_version::REQ_EXECUTIONS);
            if enc.server_version() >= server_version::EXECUTION_FILTER {
                enc.encode_field_i32(filter.client_id)
                    .encode_field_str(&filter.acct_code)
                    .encode_field_str(&filter.time)
                    .encode_field_str(&filter.symbol)
                    .encode_field_str(&filter.sec_type)
                    .encode_field_str(&filter.exchange)
                    .encode_field_str(&filter.side);
            }
        })
        .await
    }

    /// Exercise or lapse an option position.
    #[allow(clippy::too_many_arguments)]
    pub async fn exercise_options(
        &self,
        ticker_id: i32,
        contract: &Contract,
        exercise_action: i32,
        exercise_quantity: i32,
        account: &str,
        override_: i32,
    ) -> Result<()> {
        let spec = RequestSpec::new("exercise_options", client_errors::FAIL_SEND_REQMKT, ticker_id)
            .min_version(
                server_version::EXERCISE_OPTIONS,
                "  It does not support options exercise from the API.",
            )
            .not_connected_id(ticker_id);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::EXERCISE_OPTIONS)
                .encode_field_i32(wire_version::EXERCISE_OPTIONS)
                .encode_field_i32(ticker_id)
                .encode_field_str(&contract.symbol)
                .encode_field_opt_display(contract.sec_type.as_ref())
                .encode_field_str(&contract.expiry)
                .encode_field_f64(contract.strike)
                .encode_field_opt_display(contract.right.as_ref())
                .encode_field_str(&contract.multiplier)
                .encode_field_str(&contract.exchange)
                .encode_field_str(&contract.currency)
                .encode_field_str(&contract.local_symbol)
                .encode_field_i32(exercise_action)
                .encode_field_i32(exercise_quantity)
                .encode_field_str(account)
                .encode_field_i32(override_);
        })
        .await
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// Start or stop account and portfolio updates.
    /// Response: `UpdateAccountValue`, `UpdatePortfolio`, `UpdateAccountTime`.
    pub async fn req_account_updates(&self, subscribe: bool, acct_code: &str) -> Result<()> {
        let spec = RequestSpec::new("req_account_updates", client_errors::FAIL_SEND_ACCT, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_ACCOUNT_DATA)
                .encode_field_i32(wire_version::REQ_ACCOUNT_DATA)
                .encode_field_bool(subscribe);
            if enc.server_version() >= server_version::ACCT_CODE {
                enc.encode_field_str(acct_code);
            }
        })
        .await
    }

    /// Response: `ManagedAccounts`.
    pub async fn req_managed_accts(&self) -> Result<()> {
        let spec = RequestSpec::new("req_managed_accts", client_errors::FAIL_SEND_OORDER, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_MANAGED_ACCTS)
                .encode_field_i32(wire_version::REQ_MANAGED_ACCTS);
        })
        .await
    }

    // ========================================================================
    // Contract Details
    // ========================================================================

    /// Response: `ContractDetails` or `BondContractDetails`.
    pub async fn req_contract_details(&self, contract: &Contract) -> Result<()> {
        let spec = RequestSpec::new("req_contract_details", client_errors::FAIL_SEND_REQCONTRACT, NO_VALID_ID)
            .min_version(server_version::CONTRACT_DETAILS, "");
        self.send_request(spec, |enc| {
            let sv = enc.server_version();
            enc.encode_field_i32(outgoing::REQ_CONTRACT_DATA)
                .encode_field_i32(wire_version::REQ_CONTRACT_DATA)
                .encode_field_str(&contract.symbol)
                .encode_field_opt_display(contract.sec_type.as_ref())
                .encode_field_str(&contract.expiry)
                .encode_field_f64(contract.strike)
                .encode_field_opt_display(contract.right.as_ref());
            if sv >= server_version::MULTIPLIER {
                enc.encode_field_str(&contract.multiplier);
            }
            enc.encode_field_str(&contract.exchange)
                .encode_field_str(&contract.currency)
                .encode_field_str(&contract.local_symbol);
        })
        .await
    }

    // ========================================================================
    // News
    // ========================================================================

    /// Response: `UpdateNewsBulletin`.
    pub async fn req_news_bulletins(&self, all_msgs: bool) -> Result<()> {
        let spec = RequestSpec::new("req_news_bulletins", client_errors::FAIL_SEND_CORDER, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_NEWS_BULLETINS)
                .encode_field_i32(wire_version::REQ_NEWS_BULLETINS)
                .encode_field_bool(all_msgs);
        })
        .await
    }

    pub async fn cancel_news_bulletins(&self) -> Result<()> {
        let spec = RequestSpec::new("cancel_news_bulletins", client_errors::FAIL_SEND_CORDER, NO_VALID_ID);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::CANCEL_NEWS_BULLETINS)
                .encode_field_i32(wire_version::CANCEL_NEWS_BULLETINS);
        })
        .await
    }

    // ========================================================================
    // Server Log Level
    // ========================================================================

    /// 1 = system, 2 = error, 3 = warning, 4 = information, 5 = detail.
    pub async fn set_server_log_level(&self, log_level: i32) -> Result<()> {
        let spec = RequestSpec::new(
            "set_server_log_level",
            client_errors::FAIL_SEND_SERVER_LOG_LEVEL,
            NO_VALID_ID,
        );
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::SET_SERVER_LOGLEVEL)
                .encode_field_i32(wire_version::SET_SERVER_LOGLEVEL)
                .encode_field_i32(log_level);
        })
        .await
    }

    // ========================================================================
    // Financial Advisor
    // ========================================================================

    /// Response: `ReceiveFa`.
    pub async fn request_fa(&self, fa_data_type: FaDataType) -> Result<()> {
        let code = i32::from(fa_data_type);
        let spec = RequestSpec::new("request_fa", client_errors::FAIL_SEND_FA_REQUEST, code)
            .min_version(server_version::FA, "");
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_FA)
                .encode_field_i32(wire_version::REQ_FA)
                .encode_field_i32(code);
        })
        .await
    }

    pub async fn replace_fa(&self, fa_data_type: FaDataType, xml: &str) -> Result<()> {
        let code = i32::from(fa_data_type);
        let spec = RequestSpec::new("replace_fa", client_errors::FAIL_SEND_FA_REPLACE, code)
            .min_version(server_version::FA, "");
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REPLACE_FA)
                .encode_field_i32(wire_version::REPLACE_FA)
                .encode_field_i32(code)
                .encode_field_str(xml);
        })
        .await
    }

    // ========================================================================
    // Historical Data
    // ========================================================================

    /// Request historical bars.
    /// Response: `HistoricalData` rows followed by `HistoricalDataEnd`.
    #[allow(clippy::too_many_arguments)]
    pub async fn req_historical_data(
        &self,
        ticker_id: i32,
        contract: &Contract,
        end_date_time: &str,
        duration_str: &str,
        bar_size_setting: i32,
        what_to_show: &str,
        use_rth: i32,
        format_date: i32,
    ) -> Result<()> {
        let spec = RequestSpec::new(
            "req_historical_data",
            client_errors::FAIL_SEND_REQHISTDATA,
            ticker_id,
        )
        .min_version(
            server_version::HISTORICAL_DATA,
            "  It does not support historical data backfill.",
        )
        .not_connected_id(ticker_id);
        self.send_request(spec, |enc| {
            let sv = enc.server_version();
            enc.encode_field_i32(outgoing::REQ_HISTORICAL_DATA)
                .encode_field_i32(wire_version::REQ_HISTORICAL_DATA)
                .encode_field_i32(ticker_id)
                .encode_field_str(&contract.symbol)
                .encode_field_opt_display(contract.sec_type.as_ref())
                .encode_field_str(&contract.expiry)
                .encode_field_f64(contract.strike)
                .encode_field_opt_display(contract.right.as_ref())
                .encode_field_str(&contract.multiplier)
                .encode_field_str(&contract.exchange)
                .encode_field_str(&contract.primary_exch)
                .encode_field_str(&contract.currency)
                .encode_field_str(&contract.local_symbol);
            if sv >= server_version::HIST_END_DATE_BAR_SIZE {
                enc.encode_field_str(end_date_time)
                    .encode_field_i32(bar_size_setting);
            }
            enc.encode_field_str(duration_str)
                .encode_field_i32(use_rth)
                .encode_field_str(what_to_show);
            if sv >= server_version::FORMAT_DATE {
                enc.encode_field_i32(format_date);
            }
            if contract.is_combo() {
                enc.encode_combo_legs(contract, false);
            }
        })
        .await
    }

    pub async fn cancel_historical_data(&self, ticker_id: i32) -> Result<()> {
        let spec = RequestSpec::new(
            "cancel_historical_data",
            client_errors::FAIL_SEND_CANHISTDATA,
            ticker_id,
        )
        .min_version(
            server_version::SCANNER,
            "  It does not support historical data query cancellation.",
        );
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::CANCEL_HISTORICAL_DATA)
                .encode_field_i32(wire_version::CANCEL_HISTORICAL_DATA)
                .encode_field_i32(ticker_id);
        })
        .await
    }

    // ========================================================================
    // Scanner
    // ========================================================================

    /// Response: `ScannerParameters`.
    pub async fn req_scanner_parameters(&self) -> Result<()> {
        let spec = RequestSpec::new(
            "req_scanner_parameters",
            client_errors::FAIL_SEND_REQSCANNERPARAMETERS,
            NO_VALID_ID,
        )
        .min_version(server_version::SCANNER, NO_SCANNER);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::REQ_SCANNER_PARAMETERS)
                .encode_field_i32(wire_version::REQ_SCANNER_PARAMETERS);
        })
        .await
    }

    /// Response: `ScannerData`.
    pub async fn req_scanner_subscription(
        &self,
        ticker_id: i32,
        subscription: &ScannerSubscription,
    ) -> Result<()> {
        let spec = RequestSpec::new(
            "req_scanner_subscription",
            client_errors::FAIL_SEND_REQSCANNER,
            ticker_id,
        )
        .min_version(server_version::SCANNER, NO_SCANNER);
        self.send_request(spec, |enc| {
            let sv = enc.server_version();
            let s = subscription;
            enc.encode_field_i32(outgoing::REQ_SCANNER_SUBSCRIPTION)
                .encode_field_i32(wire_version::REQ_SCANNER_SUBSCRIPTION)
                .encode_field_i32(ticker_id)
                .encode_field_max_i32(s.number_of_rows)
                .encode_field_str(&s.instrument)
                .encode_field_str(&s.location_code)
                .encode_field_str(&s.scan_code)
                .encode_field_max_f64(s.above_price)
                .encode_field_max_f64(s.below_price)
                .encode_field_max_i32(s.above_volume)
                .encode_field_max_f64(s.market_cap_above)
                .encode_field_max_f64(s.market_cap_below)
                .encode_field_str(&s.moody_rating_above)
                .encode_field_str(&s.moody_rating_below)
                .encode_field_str(&s.sp_rating_above)
                .encode_field_str(&s.sp_rating_below)
                .encode_field_str(&s.maturity_date_above)
                .encode_field_str(&s.maturity_date_below)
                .encode_field_max_f64(s.coupon_rate_above)
                .encode_field_max_f64(s.coupon_rate_below)
                .encode_field_str(&s.exclude_convertible);
            if sv >= server_version::SCANNER_OPTION_VOLUME {
                enc.encode_field_i32(s.average_option_volume_above)
                    .encode_field_str(&s.scanner_setting_pairs);
            }
            if sv >= server_version::STOCK_TYPE_FILTER {
                enc.encode_field_str(&s.stock_type_filter);
            }
        })
        .await
    }

    pub async fn cancel_scanner_subscription(&self, ticker_id: i32) -> Result<()> {
        let spec = RequestSpec::new(
            "cancel_scanner_subscription",
            client_errors::FAIL_SEND_CANSCANNER,
            ticker_id,
        )
        .min_version(server_version::SCANNER, NO_SCANNER);
        self.send_request(spec, |enc| {
            enc.encode_field_i32(outgoing::CANCEL_SCANNER_SUBSCRIPTION)
                .encode_field_i32(wire_version::CANCEL_SCANNER_SUBSCRIPTION)
                .encode_field_i32(ticker_id);
        })
        .await
    }
}

/// Parse a handshake time such as `20240105 14:30:00 EST`.
fn parse_tws_time(s: &str) -> Option<NaiveDateTime> {
    let mut parts = s.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y%m%d %H:%M:%S").ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::models::contract::ComboLeg;
    use crate::models::enums::{Action, OrderType, SecType};
    use crate::protocol::TickType;

    fn fields(fields: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for f in fields {
            buf.extend_from_slice(f.as_bytes());
            buf.push(0);
        }
        buf
    }

    /// In-process gateway speaking the handshake at a fixed server version.
    ///
    /// Records every byte the client sends after the handshake and writes
    /// whatever the test pushes through `push`. Dropping `push` closes the
    /// connection.
    struct MockGateway {
        port: u16,
        received: Arc<StdMutex<Vec<u8>>>,
        push: Option<mpsc::UnboundedSender<Vec<u8>>>,
    }

    impl MockGateway {
        async fn start(sv: i32) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let received = Arc::new(StdMutex::new(Vec::new()));
            let (push, mut outgoing) = mpsc::unbounded_channel::<Vec<u8>>();

            let sink = received.clone();
            tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut pending = Vec::new();
                let expected = if sv >= 3 { 2 } else { 1 };
                let mut chunk = [0u8; 1024];

                // client version
                while pending.iter().filter(|&&b| b == 0).count() < 1 {
                    let n = stream.read(&mut chunk).await.unwrap();
                    pending.extend_from_slice(&chunk[..n]);
                }
                let mut reply = fields(&[&sv.to_string()]);
                if sv >= 20 {
                    reply.extend(fields(&["20240105 14:30:00 EST"]));
                }
                stream.write_all(&reply).await.unwrap();

                // client id
                while pending.iter().filter(|&&b| b == 0).count() < expected {
                    let n = stream.read(&mut chunk).await.unwrap();
                    pending.extend_from_slice(&chunk[..n]);
                }
                let handshake_len = pending
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| **b == 0)
                    .nth(expected - 1)
                    .map(|(i, _)| i + 1)
                    .unwrap();
                sink.lock().unwrap().extend_from_slice(&pending[handshake_len..]);

                loop {
                    tokio::select! {
                        read = stream.read(&mut chunk) => match read {
                            Ok(0) | Err(_) => break,
                            Ok(n) => sink.lock().unwrap().extend_from_slice(&chunk[..n]),
                        },
                        msg = outgoing.recv() => match msg {
                            Some(bytes) => {
                                if stream.write_all(&bytes).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
            });

            Self {
                port,
                received,
                push: Some(push),
            }
        }

        fn send(&self, bytes: Vec<u8>) {
            if let Some(push) = &self.push {
                push.send(bytes).unwrap();
            }
        }

        fn close(&mut self) {
            self.push = None;
        }

        /// Wait until the client has sent at least `n` fields; return them.
        async fn fields(&self, n: usize) -> Vec<String> {
            for _ in 0..200 {
                {
                    let buf = self.received.lock().unwrap();
                    if buf.iter().filter(|&&b| b == 0).count() >= n {
                        return buf
                            .split(|&b| b == 0)
                            .take(n)
                            .map(|f| String::from_utf8(f.to_vec()).unwrap())
                            .collect();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("client did not send {n} fields");
        }

        async fn all_fields(&self) -> Vec<String> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let buf = self.received.lock().unwrap();
            let mut out: Vec<String> = buf
                .split(|&b| b == 0)
                .map(|f| String::from_utf8(f.to_vec()).unwrap())
                .collect();
            out.pop();
            out
        }
    }

    async fn connected(sv: i32) -> (IBClient, mpsc::UnboundedReceiver<IBEvent>, MockGateway) {
        let gw = MockGateway::start(sv).await;
        let (client, rx) = IBClient::new();
        client.connect("127.0.0.1", gw.port, 7).await.unwrap();
        (client, rx, gw)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<IBEvent>) -> IBEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    fn combo() -> Contract {
        Contract {
            symbol: "SPREAD".into(),
            sec_type: Some(SecType::Combo),
            exchange: "SMART".into(),
            currency: "USD".into(),
            combo_legs: Some(vec![ComboLeg {
                con_id: 101,
                ratio: 1,
                action: Some(Action::Buy),
                exchange: "SMART".into(),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    // ----- connection -----

    #[tokio::test]
    async fn connect_records_handshake() {
        let (client, _rx, _gw) = connected(27).await;
        assert!(client.is_connected());
        assert_eq!(client.server_version(), 27);
        assert_eq!(client.connection_time().as_deref(), Some("20240105 14:30:00 EST"));
        assert_eq!(
            client.connection_time_parsed(),
            NaiveDateTime::parse_from_str("20240105 14:30:00", "%Y%m%d %H:%M:%S").ok()
        );
        assert_eq!(client.client_id(), Some(7));
    }

    #[tokio::test]
    async fn connect_twice_reports_already_connected() {
        let (client, mut rx, gw) = connected(27).await;
        let err = client.connect("127.0.0.1", gw.port, 7).await.unwrap_err();
        assert!(matches!(err, IBApiError::AlreadyConnected));
        assert_eq!(
            next_event(&mut rx).await,
            IBEvent::error(-1, 501, "Already connected.")
        );
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn connect_failure_reports_502() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (client, mut rx) = IBClient::new();
        assert!(client.connect("127.0.0.1", port, 0).await.is_err());
        assert!(matches!(next_event(&mut rx).await, IBEvent::Error { req_id: -1, code: 502, .. }));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn old_server_rejected_with_503() {
        let gw = MockGateway::start(0).await;
        let (client, mut rx) = IBClient::new();
        let err = client.connect("127.0.0.1", gw.port, 0).await.unwrap_err();
        assert!(matches!(err, IBApiError::UpgradeRequired { .. }));
        assert_eq!(
            next_event(&mut rx).await,
            IBEvent::error(-1, 503, "The TWS is out of date and must be upgraded.")
        );
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn disconnect_is_silent_and_idempotent() {
        let (client, mut rx, _gw) = connected(27).await;
        client.disconnect().await;
        client.disconnect().await;
        assert!(!client.is_connected());
        assert_eq!(client.client_id(), None);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "disconnect must not emit events");
    }

    #[tokio::test]
    async fn reconnect_after_disconnect() {
        let (client, _rx, _gw) = connected(27).await;
        client.disconnect().await;
        let gw2 = MockGateway::start(25).await;
        client.connect("127.0.0.1", gw2.port, 1).await.unwrap();
        assert_eq!(client.server_version(), 25);
        assert_eq!(client.connection_time(), Some("20240105 14:30:00 EST".into()));
    }

    // ----- request guards -----

    #[tokio::test]
    async fn not_connected_reports_504() {
        let (client, mut rx) = IBClient::new();
        let err = client.req_mkt_data(1, &Contract::stock("AAPL", "SMART", "USD")).await;
        assert!(matches!(err, Err(IBApiError::NotConnected)));
        assert_eq!(next_event(&mut rx).await, IBEvent::error(-1, 504, "Not connected"));

        // Historical data and option exercise report the caller's ticker id.
        let _ = client
            .req_historical_data(42, &Contract::default(), "", "1 D", 1, "TRADES", 1, 1)
            .await;
        assert!(matches!(next_event(&mut rx).await, IBEvent::Error { req_id: 42, code: 504, .. }));
        let _ = client.exercise_options(43, &Contract::default(), 1, 1, "", 0).await;
        assert!(matches!(next_event(&mut rx).await, IBEvent::Error { req_id: 43, code: 504, .. }));
    }

    #[tokio::test]
    async fn version_gate_writes_nothing() {
        let (client, mut rx, gw) = connected(23).await;

        let err = client.req_scanner_parameters().await.unwrap_err();
        assert!(matches!(
            err,
            IBApiError::UpgradeRequired { required: 24, server_version: 23, .. }
        ));
        assert_eq!(
            next_event(&mut rx).await,
            IBEvent::error(
                -1,
                503,
                "The TWS is out of date and must be upgraded.  It does not support API scanner subscription."
            )
        );

        client.req_ids(1).await.unwrap();
        assert_eq!(gw.all_fields().await, vec!["8", "1", "1"]);
    }

    /// Every request with a minimum server version.
    #[derive(Debug, Clone, Copy)]
    enum Gated {
        ContractDetails,
        MktDepth,
        CancelMktDepth,
        RequestFa,
        ReplaceFa,
        HistoricalData,
        ExerciseOptions,
        ScannerParameters,
        ScannerSubscription,
        CancelScannerSubscription,
        CancelHistoricalData,
    }

    impl Gated {
        async fn issue(self, client: &IBClient) -> Result<()> {
            let c = Contract::stock("IBM", "SMART", "USD");
            match self {
                Self::ContractDetails => client.req_contract_details(&c).await,
                Self::MktDepth => client.req_mkt_depth(5, &c, 10).await,
                Self::CancelMktDepth => client.cancel_mkt_depth(5).await,
                Self::RequestFa => client.request_fa(FaDataType::Groups).await,
                Self::ReplaceFa => client.replace_fa(FaDataType::Profiles, "<x/>").await,
                Self::HistoricalData => {
                    client
                        .req_historical_data(6, &c, "", "1 D", 1, "TRADES", 1, 1)
                        .await
                }
                Self::ExerciseOptions => client.exercise_options(7, &c, 1, 1, "DU1", 0).await,
                Self::ScannerParameters => client.req_scanner_parameters().await,
                Self::ScannerSubscription => {
                    client
                        .req_scanner_subscription(8, &ScannerSubscription::default())
                        .await
                }
                Self::CancelScannerSubscription => client.cancel_scanner_subscription(8).await,
                Self::CancelHistoricalData => client.cancel_historical_data(6).await,
            }
        }
    }

    #[tokio::test]
    async fn every_gated_request_below_its_version_writes_nothing() {
        let table = [
            (Gated::ContractDetails, 4, ""),
            (Gated::MktDepth, 6, ""),
            (Gated::CancelMktDepth, 6, ""),
            (Gated::RequestFa, 13, ""),
            (Gated::ReplaceFa, 13, ""),
            (
                Gated::HistoricalData,
                16,
                "  It does not support historical data backfill.",
            ),
            (
                Gated::ExerciseOptions,
                21,
                "  It does not support options exercise from the API.",
            ),
            (Gated::ScannerParameters, 24, NO_SCANNER),
            (Gated::ScannerSubscription, 24, NO_SCANNER),
            (Gated::CancelScannerSubscription, 24, NO_SCANNER),
            (
                Gated::CancelHistoricalData,
                24,
                "  It does not support historical data query cancellation.",
            ),
        ];

        for (request, gate, detail) in table {
            let sv = gate - 1;
            let (client, mut rx, gw) = connected(sv).await;

            let err = request.issue(&client).await.unwrap_err();
            match err {
                IBApiError::UpgradeRequired {
                    required,
                    server_version,
                    ..
                } => assert_eq!((required, server_version), (gate, sv), "{request:?}"),
                other => panic!("{request:?}: expected UpgradeRequired, got {other:?}"),
            }
            assert_eq!(
                next_event(&mut rx).await,
                IBEvent::error(-1, 503, format!("{}{detail}", client_errors::UPDATE_TWS.msg)),
                "{request:?}"
            );
            assert!(client.is_connected(), "{request:?}");

            // The first bytes after the handshake belong to the next request.
            client.req_ids(1).await.unwrap();
            assert_eq!(gw.all_fields().await, vec!["8", "1", "1"], "{request:?}");
            client.disconnect().await;
        }
    }

    #[tokio::test]
    async fn interior_nul_is_bad_message_and_session_survives() {
        let (client, mut rx, gw) = connected(27).await;

        let err = client.replace_fa(FaDataType::Groups, "bad\0xml").await.unwrap_err();
        assert!(matches!(err, IBApiError::Encoding(_)));
        assert!(matches!(next_event(&mut rx).await, IBEvent::Error { req_id: 1, code: 508, .. }));
        assert!(client.is_connected());

        client.req_managed_accts().await.unwrap();
        assert_eq!(gw.all_fields().await, vec!["17", "1"]);
    }

    // ----- encodings -----

    #[tokio::test]
    async fn req_mkt_data_stock() {
        let (client, _rx, gw) = connected(27).await;
        let mut c = Contract::stock("AAPL", "SMART", "USD");
        c.primary_exch = "ISLAND".into();
        client.req_mkt_data(1, &c).await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec!["1", "5", "1", "AAPL", "STK", "", "0", "", "", "SMART", "ISLAND", "USD", ""]
        );
    }

    #[tokio::test]
    async fn req_mkt_data_combo_legs_gated_by_version() {
        let (client, _rx, gw) = connected(8).await;
        client.req_mkt_data(2, &combo()).await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec!["1", "5", "2", "SPREAD", "BAG", "", "0", "", "SMART", "USD", "", "1", "101", "1", "BUY", "SMART"]
        );

        let (client, _rx, gw) = connected(7).await;
        client.req_mkt_data(2, &combo()).await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec!["1", "5", "2", "SPREAD", "BAG", "", "0", "", "SMART", "USD", ""]
        );
    }

    #[tokio::test]
    async fn req_mkt_data_combo_without_legs_sends_zero() {
        let (client, _rx, gw) = connected(27).await;
        let mut c = combo();
        c.combo_legs = None;
        client.req_mkt_data(3, &c).await.unwrap();
        let fields = gw.all_fields().await;
        assert_eq!(fields.last().map(String::as_str), Some("0"));
        assert_eq!(fields.len(), 14);
    }

    #[tokio::test]
    async fn simple_requests() {
        let (client, _rx, gw) = connected(27).await;
        client.cancel_mkt_data(5).await.unwrap();
        client.cancel_order(6).await.unwrap();
        client.req_open_orders().await.unwrap();
        client.req_account_updates(true, "DU1").await.unwrap();
        client.set_server_log_level(3).await.unwrap();
        client.req_auto_open_orders(false).await.unwrap();
        client.req_all_open_orders().await.unwrap();
        client.req_news_bulletins(true).await.unwrap();
        client.cancel_news_bulletins().await.unwrap();
        client.request_fa(FaDataType::Aliases).await.unwrap();
        client.cancel_mkt_depth(9).await.unwrap();
        client.cancel_scanner_subscription(10).await.unwrap();
        client.cancel_historical_data(11).await.unwrap();
        client.req_scanner_parameters().await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec![
                "2", "1", "5", //
                "4", "1", "6", //
                "5", "1", //
                "6", "2", "1", "DU1", //
                "14", "1", "3", //
                "15", "1", "0", //
                "16", "1", //
                "12", "1", "1", //
                "13", "1", //
                "18", "1", "3", //
                "11", "1", "9", //
                "23", "1", "10", //
                "25", "1", "11", //
                "24", "1",
            ]
        );
    }

    #[tokio::test]
    async fn req_account_updates_without_acct_code_before_v9() {
        let (client, _rx, gw) = connected(8).await;
        client.req_account_updates(false, "DU1").await.unwrap();
        assert_eq!(gw.all_fields().await, vec!["6", "2", "0"]);
    }

    #[tokio::test]
    async fn req_executions_filter_gated() {
        let filter = ExecutionFilter {
            client_id: 3,
            acct_code: "DU1".into(),
            time: "20240101-09:30:00".into(),
            symbol: "AAPL".into(),
            sec_type: "STK".into(),
            exchange: "SMART".into(),
            side: "BUY".into(),
        };
        let (client, _rx, gw) = connected(9).await;
        client.req_executions(&filter).await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec!["7", "2", "3", "DU1", "20240101-09:30:00", "AAPL", "STK", "SMART", "BUY"]
        );

        let (client, _rx, gw) = connected(8).await;
        client.req_executions(&filter).await.unwrap();
        assert_eq!(gw.all_fields().await, vec!["7", "2"]);
    }

    #[tokio::test]
    async fn req_contract_details_and_depth() {
        let (client, _rx, gw) = connected(19).await;
        let mut c = Contract::stock("IBM", "SMART", "USD");
        c.multiplier = "1".into();
        client.req_contract_details(&c).await.unwrap();
        client.req_mkt_depth(4, &c, 10).await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec![
                "9", "2", "IBM", "STK", "", "0", "", "1", "SMART", "USD", "", //
                "10", "3", "4", "IBM", "STK", "", "0", "", "1", "SMART", "USD", "", "10",
            ]
        );
    }

    #[tokio::test]
    async fn req_mkt_depth_rows_gated() {
        let (client, _rx, gw) = connected(18).await;
        client
            .req_mkt_depth(4, &Contract::stock("IBM", "SMART", "USD"), 10)
            .await
            .unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec!["10", "3", "4", "IBM", "STK", "", "0", "", "", "SMART", "USD", ""]
        );
    }

    #[tokio::test]
    async fn req_historical_data_layout() {
        let (client, _rx, gw) = connected(27).await;
        client
            .req_historical_data(
                9,
                &Contract::stock("AAPL", "SMART", "USD"),
                "20240105 16:00:00",
                "1 D",
                5,
                "TRADES",
                1,
                1,
            )
            .await
            .unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec![
                "20", "3", "9", "AAPL", "STK", "", "0", "", "", "SMART", "", "USD", "",
                "20240105 16:00:00", "5", "1 D", "1", "TRADES", "1",
            ]
        );
    }

    #[tokio::test]
    async fn req_historical_data_at_16_omits_late_fields() {
        let (client, _rx, gw) = connected(16).await;
        client
            .req_historical_data(9, &combo(), "x", "1 D", 5, "TRADES", 1, 1)
            .await
            .unwrap();
        // No end date, bar size or format date before their gates.
        assert_eq!(
            gw.all_fields().await,
            vec![
                "20", "3", "9", "SPREAD", "BAG", "", "0", "", "", "SMART", "", "USD", "", "1 D",
                "1", "TRADES", "1", "101", "1", "BUY", "SMART",
            ]
        );
    }

    #[tokio::test]
    async fn exercise_options_layout() {
        let (client, _rx, gw) = connected(21).await;
        let c = Contract {
            symbol: "AAPL".into(),
            sec_type: Some(SecType::Option),
            expiry: "20240119".into(),
            strike: 150.0,
            right: Some(crate::models::enums::Right::Call),
            multiplier: "100".into(),
            exchange: "SMART".into(),
            currency: "USD".into(),
            ..Default::default()
        };
        client.exercise_options(3, &c, 1, 2, "DU1", 0).await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec![
                "21", "1", "3", "AAPL", "OPT", "20240119", "150", "C", "100", "SMART", "USD",
                "", "1", "2", "DU1", "0",
            ]
        );
    }

    #[tokio::test]
    async fn scanner_subscription_layout() {
        let sub = ScannerSubscription {
            number_of_rows: Some(10),
            instrument: "STK".into(),
            location_code: "STK.US".into(),
            scan_code: "TOP_PERC_GAIN".into(),
            above_price: Some(5.0),
            average_option_volume_above: 100,
            scanner_setting_pairs: "Annual,true".into(),
            stock_type_filter: "ALL".into(),
            ..Default::default()
        };

        let (client, _rx, gw) = connected(27).await;
        client.req_scanner_subscription(4, &sub).await.unwrap();
        assert_eq!(
            gw.all_fields().await,
            vec![
                "22", "3", "4", "10", "STK", "STK.US", "TOP_PERC_GAIN", "5", "", "", "", "", "",
                "", "", "", "", "", "", "", "", "100", "Annual,true", "ALL",
            ]
        );

        let (client, _rx, gw) = connected(24).await;
        client.req_scanner_subscription(4, &sub).await.unwrap();
        assert_eq!(gw.all_fields().await.len(), 21);
    }

    fn vol_order() -> Order {
        Order {
            action: Some(Action::Buy),
            total_quantity: 1,
            order_type: Some(OrderType::Volatility),
            volatility: Some(0.3),
            volatility_type: Some(2),
            delta_neutral_order_type: "MKT".into(),
            stock_range_lower: Some(95.0),
            stock_range_upper: Some(105.0),
            reference_price_type: Some(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn place_order_limit_at_27() {
        let (client, _rx, gw) = connected(27).await;
        let order = Order::limit(Action::Buy, 100, 10.5);
        client
            .place_order(11, &Contract::stock("AAPL", "SMART", "USD"), &order)
            .await
            .unwrap();
        let expected: Vec<&str> = [
            // tag, version, id
            &["3", "20", "11"][..],
            // contract
            &["AAPL", "STK", "", "0", "", "", "SMART", "", "USD", ""],
            // action, qty, type, lmt, aux
            &["BUY", "100", "LMT", "10.5", "0"],
            // tif, oca, account, open/close, origin, ref, transmit, parent
            &["", "", "", "O", "0", "", "1", "0"],
            // block, sweep, display, trigger, ignore rth, hidden
            &["0", "0", "0", "0", "0", "0"],
            // shares alloc, discretionary, good after, good till, FA x4
            &["", "0", "", "", "", "", "", ""],
            // short sale slot, designated location
            &["0", ""],
            // extended attributes
            &["0", "0", "", "", "0", "", "", "0", "0", "", "", "", "", "", "", ""],
            // override pct constraints
            &["0"],
            // volatility, type, is-MKT flag, continuous update, ref price type
            &["", "", "0", "0", ""],
        ]
        .concat();
        assert_eq!(gw.all_fields().await, expected);
    }

    #[tokio::test]
    async fn place_order_delta_neutral_string_at_28() {
        let (client, _rx, gw) = connected(28).await;
        client
            .place_order(1, &Contract::stock("AAPL", "SMART", "USD"), &vol_order())
            .await
            .unwrap();
        let fields = gw.all_fields().await;
        // volatility, type, dn type, dn aux, continuous update, ref price type
        assert_eq!(&fields[fields.len() - 6..], ["0.3", "2", "MKT", "", "0", "1"]);
        // range stays in the extended block
        let ext_end = fields.len() - 7;
        assert_eq!(&fields[ext_end - 2..ext_end], ["95", "105"]);
    }

    #[tokio::test]
    async fn place_order_stock_range_moves_at_exactly_26() {
        let (client, _rx, gw) = connected(26).await;
        client
            .place_order(1, &Contract::stock("AAPL", "SMART", "USD"), &vol_order())
            .await
            .unwrap();
        let fields = gw.all_fields().await;
        // volatility, type, is-MKT, continuous update, lower, upper, ref price type
        assert_eq!(
            &fields[fields.len() - 7..],
            ["0.3", "2", "1", "0", "95", "105", "1"]
        );
        // sentinel in the extended block
        let ext_end = fields.len() - 8;
        assert_eq!(&fields[ext_end - 2..ext_end], ["", ""]);
    }

    #[tokio::test]
    async fn place_order_non_vol_at_26_sends_sentinel_range_in_vol_block() {
        let (client, _rx, gw) = connected(26).await;
        let mut order = vol_order();
        order.order_type = Some(OrderType::Limit);
        client
            .place_order(1, &Contract::stock("AAPL", "SMART", "USD"), &order)
            .await
            .unwrap();
        let fields = gw.all_fields().await;
        assert_eq!(&fields[fields.len() - 3..fields.len() - 1], ["", ""]);
        let ext_end = fields.len() - 8;
        assert_eq!(&fields[ext_end - 2..ext_end], ["95", "105"]);
    }

    #[tokio::test]
    async fn place_order_combo_legs_carry_open_close() {
        let (client, _rx, gw) = connected(8).await;
        client
            .place_order(1, &combo(), &Order::limit(Action::Sell, 1, 1.0))
            .await
            .unwrap();
        let fields = gw.all_fields().await;
        assert_eq!(&fields[fields.len() - 6..], ["1", "101", "1", "BUY", "SMART", "0"]);
    }

    // ----- dispatch and teardown -----

    #[tokio::test]
    async fn events_flow_from_gateway() {
        let (_client, mut rx, gw) = connected(27).await;
        gw.send(fields(&["1", "2", "1", "2", "10.5", "300"]));
        assert_eq!(
            next_event(&mut rx).await,
            IBEvent::TickPrice {
                req_id: 1,
                tick_type: TickType::Ask,
                price: 10.5,
                can_auto_execute: false,
            }
        );
        assert_eq!(
            next_event(&mut rx).await,
            IBEvent::TickSize {
                req_id: 1,
                tick_type: TickType::AskSize,
                size: 300,
            }
        );
    }

    #[tokio::test]
    async fn gateway_close_emits_one_connection_closed() {
        let (client, mut rx, mut gw) = connected(27).await;
        gw.close();
        assert_eq!(next_event(&mut rx).await, IBEvent::ConnectionClosed);
        assert!(!client.is_connected());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        assert!(matches!(client.req_ids(1).await, Err(IBApiError::NotConnected)));
        assert_eq!(next_event(&mut rx).await, IBEvent::error(-1, 504, "Not connected"));
    }

    #[tokio::test]
    async fn writes_after_peer_close_end_in_exactly_one_connection_closed() {
        let (client, mut rx, mut gw) = connected(27).await;
        gw.close();

        // Keep writing until the session is gone, whichever side notices first.
        for _ in 0..100 {
            if client.req_ids(1).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut closed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                IBEvent::ConnectionClosed => closed += 1,
                IBEvent::Error { code, .. } => assert!(code == 515 || code == 504 || code == 0, "code {code}"),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(closed, 1);
        assert!(!client.is_connected());
    }

    #[test]
    fn parse_tws_time_variants() {
        let expected = NaiveDateTime::parse_from_str("20240105 14:30:00", "%Y%m%d %H:%M:%S").ok();
        assert_eq!(parse_tws_time("20240105 14:30:00 EST"), expected);
        assert_eq!(parse_tws_time("20240105 14:30:00"), expected);
        assert_eq!(parse_tws_time("garbage"), None);
    }
}
