//! Outbound half of the frame codec.
//!
//! Every scalar is written as its text followed by a single NUL. There is no
//! length prefix, so a text field must never carry an interior NUL; the
//! encoder records such a field as an error and refuses to finalize.

use bytes::{BufMut, BytesMut};
use std::fmt;

use crate::errors::{IBApiError, Result};
use crate::models::contract::Contract;
use crate::protocol::{NUL, UNSET_DOUBLE, UNSET_INTEGER};

// ============================================================================
// MessageEncoder
// ============================================================================

/// Builds one outgoing request as a sequence of NUL-terminated frames.
///
/// Methods chain (`enc.encode_field_i32(1).encode_field_str("AAPL")`). The
/// negotiated server version travels with the encoder so version-gated
/// fields can be decided where the fields are written.
pub struct MessageEncoder {
    buf: BytesMut,
    server_version: i32,
    error: Option<String>,
}

impl MessageEncoder {
    pub fn new(server_version: i32) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            server_version,
            error: None,
        }
    }

    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// Return the encoded frames, or the first validation error recorded
    /// while building them.
    pub fn finalize(self) -> Result<BytesMut> {
        match self.error {
            Some(e) => Err(IBApiError::Encoding(e)),
            None => Ok(self.buf),
        }
    }

    // ========================================================================
    // Core field encoders
    // ========================================================================

    /// Encode a string field: bytes + NUL.
    pub fn encode_field_str(&mut self, value: &str) -> &mut Self {
        if value.as_bytes().contains(&NUL) {
            tracing::warn!(value, "interior NUL in text field");
            if self.error.is_none() {
                self.error = Some(format!("text field contains NUL: {value:?}"));
            }
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.put_u8(NUL);
        self
    }

    /// Encode an i32 field: ASCII decimal + NUL.
    pub fn encode_field_i32(&mut self, value: i32) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(NUL);
        self
    }

    /// Encode a f64 field.
    ///
    /// Uses Rust's shortest round-trip representation, which the server
    /// parses as a plain decimal.
    pub fn encode_field_f64(&mut self, value: f64) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(NUL);
        self
    }

    /// Encode a bool field: "1" or "0".
    pub fn encode_field_bool(&mut self, value: bool) -> &mut Self {
        self.buf.extend_from_slice(if value { b"1" } else { b"0" });
        self.buf.put_u8(NUL);
        self
    }

    // ========================================================================
    // "Max" encoders: unset maps to an empty frame
    // ========================================================================

    /// Encode Option<i32>: `None` or the `i32::MAX` sentinel → empty frame.
    pub fn encode_field_max_i32(&mut self, value: Option<i32>) -> &mut Self {
        match value {
            Some(v) if v != UNSET_INTEGER => self.encode_field_i32(v),
            _ => self.encode_empty(),
        }
    }

    /// Encode Option<f64>: `None` or the `f64::MAX` sentinel → empty frame.
    pub fn encode_field_max_f64(&mut self, value: Option<f64>) -> &mut Self {
        match value {
            Some(v) if v != UNSET_DOUBLE => self.encode_field_f64(v),
            _ => self.encode_empty(),
        }
    }

    /// Encode an empty frame.
    pub fn encode_empty(&mut self) -> &mut Self {
        self.buf.put_u8(NUL);
        self
    }

    // ========================================================================
    // Display-based encoders (for enums)
    // ========================================================================

    /// Encode a type implementing Display using its wire string.
    pub fn encode_field_display<T: fmt::Display>(&mut self, value: &T) -> &mut Self {
        let s = value.to_string();
        self.encode_field_str(&s)
    }

    /// Encode an optional Display type: `None` → empty frame.
    pub fn encode_field_opt_display<T: fmt::Display>(&mut self, value: Option<&T>) -> &mut Self {
        match value {
            Some(v) => self.encode_field_display(v),
            None => self.encode_empty(),
        }
    }

    // ========================================================================
    // Composite encoders
    // ========================================================================

    /// Encode the leg list of a combination instrument: count, then per leg
    /// con id, ratio, action, exchange and, for orders, open/close.
    ///
    /// A missing leg list is written as a count of zero. Callers decide
    /// whether legs belong in the request at all.
    pub fn encode_combo_legs(&mut self, contract: &Contract, with_open_close: bool) -> &mut Self {
        let Some(legs) = contract.combo_legs.as_deref() else {
            return self.encode_field_i32(0);
        };
        self.encode_field_i32(legs.len() as i32);
        for leg in legs {
            self.encode_field_i32(leg.con_id)
                .encode_field_i32(leg.ratio)
                .encode_field_opt_display(leg.action.as_ref())
                .encode_field_str(&leg.exchange);
            if with_open_close {
                self.encode_field_i32(i32::from(leg.open_close));
            }
        }
        self
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn write_display<T: fmt::Display>(&mut self, value: T) {
        let s = value.to_string();
        self.buf.extend_from_slice(s.as_bytes());
    }
}

// ============================================================================
// Tests
// ============================================================================
