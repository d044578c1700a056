//! Inbound half of the frame codec and the per-message decoders.
//!
//! Fields are NUL-terminated ASCII with no length prefix, so a message can
//! only be recognised as complete by decoding it. Every decoder returns
//! `IBApiError::Incomplete` when the buffer ends before the message does;
//! the caller keeps the bytes, reads more from the socket and tries again
//! from the start of the message.

// Decoders assign fields in wire order, which does not fit struct-literal
// initialization.
#![allow(clippy::field_reassign_with_default)]

use std::fmt;
use std::str::FromStr;

use crate::errors::{IBApiError, Result};
use crate::models::bar::Bar;
use crate::models::contract::{BondTerms, Contract, ContractDetails};
use crate::models::enums::*;
use crate::models::execution::Execution;
use crate::models::order::Order;
use crate::protocol::{incoming, server_version, TickType, NUL, UNSET_DOUBLE, UNSET_INTEGER};
use crate::wrapper::{IBEvent, ScannerDataItem};

// ============================================================================
// MessageDecoder
// ============================================================================

/// Reads NUL-terminated fields from a byte buffer.
///
/// Wraps a byte slice and tracks the current read position. Each `decode_*`
/// method reads the next field, parses it into the requested type, and
/// advances past the terminator.
pub struct MessageDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    server_version: i32,
}

impl<'a> MessageDecoder<'a> {
    pub fn new(data: &'a [u8], server_version: i32) -> Self {
        Self {
            data,
            pos: 0,
            server_version,
        }
    }

    /// Negotiated server version of the connection the bytes came from.
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Read the next field up to its terminator and advance past it.
    ///
    /// A field without a terminator is not an error yet: more bytes may be
    /// on the way.
    fn read_field_str(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == NUL)
            .ok_or(IBApiError::Incomplete)?;
        let field = std::str::from_utf8(&rest[..len])
            .map_err(|e| IBApiError::Decoding(format!("invalid UTF-8: {e}")))?;
        self.pos += len + 1;
        Ok(field)
    }

    // ========================================================================
    // Type-specific decoders
    // ========================================================================

    pub fn decode_string(&mut self) -> Result<String> {
        self.read_field_str().map(str::to_string)
    }

    /// Decode a text field where empty means "absent".
    pub fn decode_string_opt(&mut self) -> Result<Option<String>> {
        let s = self.read_field_str()?;
        Ok((!s.is_empty()).then(|| s.to_string()))
    }

    /// Decode an i32 field. Empty → 0.
    pub fn decode_i32(&mut self) -> Result<i32> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0);
        }
        s.parse::<i32>()
            .map_err(|e| IBApiError::Decoding(format!("invalid i32 '{s}': {e}")))
    }

    /// Decode a f64 field. Empty → 0.0.
    pub fn decode_f64(&mut self) -> Result<f64> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0.0);
        }
        parse_f64(s)
    }

    /// Decode an integer flag; any non-zero value is true.
    pub fn decode_bool(&mut self) -> Result<bool> {
        self.decode_i32().map(|v| v != 0)
    }

    // ========================================================================
    // "Max" decoders: empty frame or the unset sentinel → None
    // ========================================================================

    pub fn decode_i32_max(&mut self) -> Result<Option<i32>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        let v = s
            .parse::<i32>()
            .map_err(|e| IBApiError::Decoding(format!("invalid i32 '{s}': {e}")))?;
        Ok((v != UNSET_INTEGER).then_some(v))
    }

    pub fn decode_f64_max(&mut self) -> Result<Option<f64>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        let v = parse_f64(s)?;
        Ok((v != UNSET_DOUBLE).then_some(v))
    }

    // ========================================================================
    // Enum decoders
    // ========================================================================

    /// Decode an optional enum: empty string → None.
    pub fn decode_enum_opt<T: FromStr>(&mut self) -> Result<Option<T>>
    where
        T::Err: fmt::Display,
    {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<T>()
            .map(Some)
            .map_err(|e| IBApiError::Decoding(format!("invalid enum value '{s}': {e}")))
    }

    /// Decode an integer code into an enum. Codes outside the enum's fixed
    /// set land in its `Other` variant.
    pub fn decode_int_enum<T: From<i32>>(&mut self) -> Result<T> {
        self.decode_i32().map(T::from)
    }

    pub fn skip_field(&mut self) -> Result<()> {
        self.read_field_str().map(|_| ())
    }
}

fn parse_f64(s: &str) -> Result<f64> {
    if s == "Infinity" {
        return Ok(f64::INFINITY);
    }
    s.parse::<f64>()
        .map_err(|e| IBApiError::Decoding(format!("invalid f64 '{s}': {e}")))
}

// ============================================================================
// Server Message Dispatch
// ============================================================================

/// Decode the first complete server message in `data`.
///
/// Returns the events it produces, in order, together with the number of
/// bytes the message occupied. Most messages produce one event; a price tick
/// may add a size tick and a historical-data reply produces one event per
/// row plus a completion marker.
///
/// Errors:
/// - `Incomplete` when `data` ends inside the message (nothing consumed).
/// - `UnknownMessage(tag)` for a tag outside the catalog.
/// - `Decoding` for a malformed field.
pub fn decode_server_msg(data: &[u8], server_version: i32) -> Result<(Vec<IBEvent>, usize)> {
    let mut dec = MessageDecoder::new(data, server_version);
    let msg_id = dec.decode_i32()?;

    let events = match msg_id {
        incoming::TICK_PRICE => decode_tick_price(&mut dec)?,
        incoming::TICK_SIZE => vec![decode_tick_size(&mut dec)?],
        incoming::TICK_OPTION_COMPUTATION => vec![decode_tick_option_computation(&mut dec)?],
        incoming::ORDER_STATUS => vec![decode_order_status(&mut dec)?],
        incoming::ERR_MSG => vec![decode_err_msg(&mut dec)?],
        incoming::OPEN_ORDER => vec![decode_open_order(&mut dec)?],
        incoming::ACCT_VALUE => vec![decode_acct_value(&mut dec)?],
        incoming::PORTFOLIO_VALUE => vec![decode_portfolio_value(&mut dec)?],
        incoming::ACCT_UPDATE_TIME => vec![decode_acct_update_time(&mut dec)?],
        incoming::NEXT_VALID_ID => vec![decode_next_valid_id(&mut dec)?],
        incoming::CONTRACT_DATA => vec![decode_contract_data(&mut dec)?],
        incoming::BOND_CONTRACT_DATA => vec![decode_bond_contract_data(&mut dec)?],
        incoming::EXECUTION_DATA => vec![decode_execution_data(&mut dec)?],
        incoming::MARKET_DEPTH => vec![decode_market_depth(&mut dec)?],
        incoming::MARKET_DEPTH_L2 => vec![decode_market_depth_l2(&mut dec)?],
        incoming::NEWS_BULLETINS => vec![decode_news_bulletins(&mut dec)?],
        incoming::MANAGED_ACCTS => vec![decode_managed_accts(&mut dec)?],
        incoming::RECEIVE_FA => vec![decode_receive_fa(&mut dec)?],
        incoming::HISTORICAL_DATA => decode_historical_data(&mut dec)?,
        incoming::SCANNER_PARAMETERS => vec![decode_scanner_parameters(&mut dec)?],
        incoming::SCANNER_DATA => vec![decode_scanner_data(&mut dec)?],
        other => return Err(IBApiError::UnknownMessage(other)),
    };

    Ok((events, dec.position()))
}

// ============================================================================
// Shared helpers
// ============================================================================

fn decode_tick_type(dec: &mut MessageDecoder) -> Result<TickType> {
    dec.decode_int_enum()
}

/// symbol, secType, expiry, strike, right: the head shared by every
/// contract the server describes.
fn decode_contract_head(dec: &mut MessageDecoder, c: &mut Contract) -> Result<()> {
    c.symbol = dec.decode_string()?;
    c.sec_type = dec.decode_enum_opt()?;
    c.expiry = dec.decode_string()?;
    c.strike = dec.decode_f64()?;
    c.right = dec.decode_enum_opt()?;
    Ok(())
}

// ============================================================================
// Market Data
// ============================================================================

/// TICK_PRICE (1). From version 2 a bid, ask or last price also reports the
/// matching size as a separate size tick.
fn decode_tick_price(dec: &mut MessageDecoder) -> Result<Vec<IBEvent>> {
    let version = dec.decode_i32()?;
    let req_id = dec.decode_i32()?;
    let tick_type = decode_tick_type(dec)?;
    let price = dec.decode_f64()?;
    let size = if version >= 2 { dec.decode_i32()? } else { 0 };
    let can_auto_execute = if version >= 3 { dec.decode_bool()? } else { false };

    let mut events = vec![IBEvent::TickPrice {
        req_id,
        tick_type,
        price,
        can_auto_execute,
    }];
    if version >= 2 {
        if let Some(size_tick) = tick_type.size_tick_for() {
            events.push(IBEvent::TickSize {
                req_id,
                tick_type: size_tick,
                size,
            });
        }
    }
    Ok(events)
}

/// TICK_SIZE (2).
fn decode_tick_size(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let req_id = dec.decode_i32()?;
    let tick_type = decode_tick_type(dec)?;
    let size = dec.decode_i32()?;
    Ok(IBEvent::TickSize { req_id, tick_type, size })
}

/// TICK_OPTION_COMPUTATION (21). A negative implied volatility or a delta
/// outside [-1, 1] means "not computed".
fn decode_tick_option_computation(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let req_id = dec.decode_i32()?;
    let tick_type = decode_tick_type(dec)?;
    let implied_vol = dec.decode_f64()?;
    let delta = dec.decode_f64()?;
    Ok(IBEvent::TickOptionComputation {
        req_id,
        tick_type,
        implied_vol: (implied_vol >= 0.0).then_some(implied_vol),
        delta: (delta.abs() <= 1.0).then_some(delta),
    })
}

/// MARKET_DEPTH (12).
fn decode_market_depth(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    Ok(IBEvent::UpdateMktDepth {
        req_id: dec.decode_i32()?,
        position: dec.decode_i32()?,
        operation: dec.decode_i32()?,
        side: dec.decode_i32()?,
        price: dec.decode_f64()?,
        size: dec.decode_i32()?,
    })
}

/// MARKET_DEPTH_L2 (13).
fn decode_market_depth_l2(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    Ok(IBEvent::UpdateMktDepthL2 {
        req_id: dec.decode_i32()?,
        position: dec.decode_i32()?,
        market_maker: dec.decode_string()?,
        operation: dec.decode_i32()?,
        side: dec.decode_i32()?,
        price: dec.decode_f64()?,
        size: dec.decode_i32()?,
    })
}

// ============================================================================
// Connection & Error
// ============================================================================

/// ERR_MSG (4). Version 1 carries only text.
fn decode_err_msg(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;
    if version < 2 {
        let message = dec.decode_string()?;
        return Ok(IBEvent::error(crate::protocol::client_errors::NO_VALID_ID, 0, message));
    }
    let req_id = dec.decode_i32()?;
    let code = dec.decode_i32()?;
    let message = dec.decode_string()?;
    Ok(IBEvent::Error { req_id, code, message })
}

/// NEXT_VALID_ID (9).
fn decode_next_valid_id(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let order_id = dec.decode_i32()?;
    Ok(IBEvent::NextValidId { order_id })
}

/// MANAGED_ACCTS (15).
fn decode_managed_accts(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let accounts = dec.decode_string()?;
    Ok(IBEvent::ManagedAccounts { accounts })
}

// ============================================================================
// Orders & Executions
// ============================================================================

/// ORDER_STATUS (3).
fn decode_order_status(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;
    let order_id = dec.decode_i32()?;
    let status = dec.decode_string()?;
    let filled = dec.decode_i32()?;
    let remaining = dec.decode_i32()?;
    let avg_fill_price = dec.decode_f64()?;
    let perm_id = if version >= 2 { dec.decode_i32()? } else { 0 };
    let parent_id = if version >= 3 { dec.decode_i32()? } else { 0 };
    let last_fill_price = if version >= 4 { dec.decode_f64()? } else { 0.0 };
    let client_id = if version >= 5 { dec.decode_i32()? } else { 0 };
    Ok(IBEvent::OrderStatus {
        order_id,
        status,
        filled,
        remaining,
        avg_fill_price,
        perm_id,
        parent_id,
        last_fill_price,
        client_id,
    })
}

/// OPEN_ORDER (5).
///
/// The stock range pair inside the volatility block is present only when
/// the negotiated server version is exactly 26.
fn decode_open_order(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;

    let mut order = Order::default();
    order.order_id = dec.decode_i32()?;

    let mut contract = Contract::default();
    decode_contract_head(dec, &mut contract)?;
    contract.exchange = dec.decode_string()?;
    contract.currency = dec.decode_string()?;
    if version >= 2 {
        contract.local_symbol = dec.decode_string()?;
    }

    order.action = dec.decode_enum_opt()?;
    order.total_quantity = dec.decode_i32()?;
    order.order_type = dec.decode_enum_opt()?;
    order.lmt_price = dec.decode_f64()?;
    order.aux_price = dec.decode_f64()?;
    order.tif = dec.decode_enum_opt()?;
    order.oca_group = dec.decode_string()?;
    order.account = dec.decode_string()?;
    order.open_close = dec.decode_string()?;
    order.origin = dec.decode_int_enum()?;
    order.order_ref = dec.decode_string()?;

    if version >= 3 {
        order.client_id = dec.decode_i32()?;
    }
    if version >= 4 {
        order.perm_id = dec.decode_i32()?;
        order.ignore_rth = dec.decode_bool()?;
        order.hidden = dec.decode_bool()?;
        order.discretionary_amt = dec.decode_f64()?;
    }
    if version >= 5 {
        order.good_after_time = dec.decode_string()?;
    }
    if version >= 6 {
        order.shares_allocation = dec.decode_string()?;
    }
    if version >= 7 {
        order.fa_group = dec.decode_string()?;
        order.fa_method = dec.decode_string()?;
        order.fa_percentage = dec.decode_string()?;
        order.fa_profile = dec.decode_string()?;
    }
    if version >= 8 {
        order.good_till_date = dec.decode_string()?;
    }
    if version >= 9 {
        order.rule_80a = dec.decode_string()?;
        order.percent_offset = dec.decode_f64_max()?;
        order.settling_firm = dec.decode_string()?;
        order.short_sale_slot = dec.decode_i32()?;
        order.designated_location = dec.decode_string()?;
        order.auction_strategy = dec.decode_i32_max()?.map(AuctionStrategy::from);
        order.starting_price = dec.decode_f64_max()?;
        order.stock_ref_price = dec.decode_f64_max()?;
        order.delta = dec.decode_f64_max()?;
        order.stock_range_lower = dec.decode_f64_max()?;
        order.stock_range_upper = dec.decode_f64_max()?;
        order.display_size = dec.decode_i32()?;
        order.rth_only = dec.decode_bool()?;
        order.block_order = dec.decode_bool()?;
        order.sweep_to_fill = dec.decode_bool()?;
        order.all_or_none = dec.decode_bool()?;
        order.min_qty = dec.decode_i32_max()?;
        order.oca_type = dec.decode_i32()?;
        order.e_trade_only = dec.decode_bool()?;
        order.firm_quote_only = dec.decode_bool()?;
        order.nbbo_price_cap = dec.decode_f64_max()?;
    }
    if version >= 10 {
        order.parent_id = dec.decode_i32()?;
        order.trigger_method = dec.decode_i32()?;
    }
    if version >= 11 {
        order.volatility = dec.decode_f64_max()?;
        order.volatility_type = dec.decode_i32_max()?;
        if version == 11 {
            let is_mkt = dec.decode_i32()? != 0;
            order.delta_neutral_order_type = if is_mkt { "MKT" } else { "NONE" }.to_string();
        } else {
            order.delta_neutral_order_type = dec.decode_string()?;
            order.delta_neutral_aux_price = dec.decode_f64_max()?;
        }
        order.continuous_update = dec.decode_bool()?;
        if dec.server_version() == server_version::VOL_STOCK_RANGE_ONLY {
            order.stock_range_lower = dec.decode_f64_max()?;
            order.stock_range_upper = dec.decode_f64_max()?;
        }
        order.reference_price_type = dec.decode_i32_max()?;
    }

    Ok(IBEvent::OpenOrder {
        order_id: order.order_id,
        contract,
        order: Box::new(order),
    })
}

/// EXECUTION_DATA (11).
fn decode_execution_data(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;
    let order_id = dec.decode_i32()?;

    let mut contract = Contract::default();
    decode_contract_head(dec, &mut contract)?;
    contract.exchange = dec.decode_string()?;
    contract.currency = dec.decode_string()?;
    contract.local_symbol = dec.decode_string()?;

    let mut execution = Execution::default();
    execution.order_id = order_id;
    execution.exec_id = dec.decode_string()?;
    execution.time = dec.decode_string()?;
    execution.acct_number = dec.decode_string()?;
    execution.exchange = dec.decode_string()?;
    execution.side = dec.decode_string()?;
    execution.shares = dec.decode_i32()?;
    execution.price = dec.decode_f64()?;
    if version >= 2 {
        execution.perm_id = dec.decode_i32()?;
    }
    if version >= 3 {
        execution.client_id = dec.decode_i32()?;
    }
    if version >= 4 {
        execution.liquidation = dec.decode_i32()?;
    }

    Ok(IBEvent::ExecDetails {
        order_id,
        contract,
        execution,
    })
}

// ============================================================================
// Account & Portfolio
// ============================================================================

/// ACCT_VALUE (6).
fn decode_acct_value(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;
    let key = dec.decode_string()?;
    let value = dec.decode_string()?;
    let currency = dec.decode_string()?;
    let account_name = if version >= 2 {
        dec.decode_string_opt()?
    } else {
        None
    };
    Ok(IBEvent::UpdateAccountValue {
        key,
        value,
        currency,
        account_name,
    })
}

/// PORTFOLIO_VALUE (7).
fn decode_portfolio_value(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;

    let mut contract = Contract::default();
    decode_contract_head(dec, &mut contract)?;
    contract.currency = dec.decode_string()?;
    if version >= 2 {
        contract.local_symbol = dec.decode_string()?;
    }

    let position = dec.decode_i32()?;
    let market_price = dec.decode_f64()?;
    let market_value = dec.decode_f64()?;
    let (average_cost, unrealized_pnl, realized_pnl) = if version >= 3 {
        (dec.decode_f64()?, dec.decode_f64()?, dec.decode_f64()?)
    } else {
        (0.0, 0.0, 0.0)
    };
    let account_name = if version >= 4 {
        dec.decode_string_opt()?
    } else {
        None
    };

    Ok(IBEvent::UpdatePortfolio {
        contract,
        position,
        market_price,
        market_value,
        average_cost,
        unrealized_pnl,
        realized_pnl,
        account_name,
    })
}

/// ACCT_UPDATE_TIME (8).
fn decode_acct_update_time(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let time_stamp = dec.decode_string()?;
    Ok(IBEvent::UpdateAccountTime { time_stamp })
}

// ============================================================================
// Contract Details
// ============================================================================

/// CONTRACT_DATA (10).
fn decode_contract_data(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;

    let mut details = ContractDetails::default();
    decode_contract_head(dec, &mut details.summary)?;
    details.summary.exchange = dec.decode_string()?;
    details.summary.currency = dec.decode_string()?;
    details.summary.local_symbol = dec.decode_string()?;
    details.market_name = dec.decode_string()?;
    details.trading_class = dec.decode_string()?;
    details.con_id = dec.decode_i32()?;
    details.min_tick = dec.decode_f64()?;
    details.summary.multiplier = dec.decode_string()?;
    details.order_types = dec.decode_string()?;
    details.valid_exchanges = dec.decode_string()?;
    if version >= 2 {
        details.price_magnifier = dec.decode_i32()?;
    }

    Ok(IBEvent::ContractDetails { details })
}

/// BOND_CONTRACT_DATA (18).
fn decode_bond_contract_data(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;

    let mut details = ContractDetails::default();
    details.summary.symbol = dec.decode_string()?;
    details.summary.sec_type = dec.decode_enum_opt()?;

    let mut bond = BondTerms::default();
    bond.cusip = dec.decode_string()?;
    bond.coupon = dec.decode_f64()?;
    bond.maturity = dec.decode_string()?;
    bond.issue_date = dec.decode_string()?;
    bond.ratings = dec.decode_string()?;
    bond.bond_type = dec.decode_string()?;
    bond.coupon_type = dec.decode_string()?;
    bond.convertible = dec.decode_bool()?;
    bond.callable = dec.decode_bool()?;
    bond.putable = dec.decode_bool()?;
    bond.desc_append = dec.decode_string()?;

    details.summary.exchange = dec.decode_string()?;
    details.summary.currency = dec.decode_string()?;
    details.market_name = dec.decode_string()?;
    details.trading_class = dec.decode_string()?;
    details.con_id = dec.decode_i32()?;
    details.min_tick = dec.decode_f64()?;
    details.order_types = dec.decode_string()?;
    details.valid_exchanges = dec.decode_string()?;
    details.bond = Some(bond);

    Ok(IBEvent::BondContractDetails { details })
}

// ============================================================================
// News & Financial Advisor
// ============================================================================

/// NEWS_BULLETINS (14).
fn decode_news_bulletins(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    Ok(IBEvent::UpdateNewsBulletin {
        msg_id: dec.decode_i32()?,
        msg_type: dec.decode_i32()?,
        message: dec.decode_string()?,
        orig_exchange: dec.decode_string()?,
    })
}

/// RECEIVE_FA (16).
fn decode_receive_fa(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let fa_data_type = dec.decode_int_enum()?;
    let xml = dec.decode_string()?;
    Ok(IBEvent::ReceiveFa { fa_data_type, xml })
}

// ============================================================================
// Historical Data
// ============================================================================

/// HISTORICAL_DATA (17): a row count, the rows, then a completion marker.
fn decode_historical_data(dec: &mut MessageDecoder) -> Result<Vec<IBEvent>> {
    let version = dec.decode_i32()?;
    let req_id = dec.decode_i32()?;
    let (start, end) = if version >= 2 {
        (dec.decode_string()?, dec.decode_string()?)
    } else {
        (String::new(), String::new())
    };
    let marker = if version >= 2 {
        format!("finished-{start}-{end}")
    } else {
        "finished".to_string()
    };

    // The count comes off the wire, so rows are pushed as they decode
    // rather than reserved up front.
    let count = dec.decode_i32()?.max(0);
    let mut events = Vec::new();
    for _ in 0..count {
        let bar = Bar {
            time: dec.decode_string()?,
            open: dec.decode_f64()?,
            high: dec.decode_f64()?,
            low: dec.decode_f64()?,
            close: dec.decode_f64()?,
            volume: dec.decode_i32()?,
            wap: dec.decode_f64()?,
            has_gaps: dec.decode_string()?.eq_ignore_ascii_case("true"),
        };
        events.push(IBEvent::HistoricalData { req_id, bar });
    }
    events.push(IBEvent::HistoricalDataEnd {
        req_id,
        start,
        end,
        marker,
    });
    Ok(events)
}

// ============================================================================
// Scanner
// ============================================================================

/// SCANNER_PARAMETERS (19).
fn decode_scanner_parameters(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let xml = dec.decode_string()?;
    Ok(IBEvent::ScannerParameters { xml })
}

/// SCANNER_DATA (20).
fn decode_scanner_data(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let req_id = dec.decode_i32()?;
    let count = dec.decode_i32()?.max(0);

    let mut items = Vec::new();
    for _ in 0..count {
        let rank = dec.decode_i32()?;
        let mut cd = ContractDetails::default();
        decode_contract_head(dec, &mut cd.summary)?;
        cd.summary.exchange = dec.decode_string()?;
        cd.summary.currency = dec.decode_string()?;
        cd.summary.local_symbol = dec.decode_string()?;
        cd.market_name = dec.decode_string()?;
        cd.trading_class = dec.decode_string()?;
        items.push(ScannerDataItem {
            rank,
            contract_details: cd,
            distance: dec.decode_string()?,
            benchmark: dec.decode_string()?,
            projection: dec.decode_string()?,
        });
    }

    Ok(IBEvent::ScannerData { req_id, items })
}

// ============================================================================
// Tests
// ============================================================================
