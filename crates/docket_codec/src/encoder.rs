//! Order-preserving term encoding.
//!
//! The payload grammar is designed so that byte-lexicographic comparison of
//! two payloads agrees with [`crate::ordering::compare_values`]:
//!
//! - every value starts with a type tag chosen to match the cross-type order;
//! - all numeric widths share one tag and encode as a sortable-double prefix
//!   plus an integer residual, so equal numbers are byte-identical and 64-bit
//!   integers beyond double precision still order exactly;
//! - strings and regex components use `0x00`-escaped bytes with a two-byte
//!   terminator; documents and arrays frame each entry with an item marker so
//!   shorter prefixes sort first;
//! - binary carries a big-endian length prefix (binary orders length-first).
//!
//! Decimals that are neither 64-bit integers nor exact binary fractions have
//! no exact double form; their terms carry the inexact flag so equality
//! decisions fall back to the document.
//!
//! Truncation cuts the payload to the configured limit, pulling the cut back
//! off any UTF-8 continuation byte. A truncated payload is a strict prefix of
//! the full payload, hence never on the wrong side of a range comparison.
//! Descending terms complement the payload after truncation.

use std::cmp::Ordering;

use crate::term::{IndexTerm, TermFlags};
use crate::value::Value;

// Type tags, spaced to match the canonical cross-type order.
pub(crate) const TAG_MIN_KEY: u8 = 0x05;
pub(crate) const TAG_UNDEFINED: u8 = 0x0a;
pub(crate) const TAG_NULL: u8 = 0x0f;
pub(crate) const TAG_NUMERIC: u8 = 0x14;
pub(crate) const TAG_STRING: u8 = 0x19;
pub(crate) const TAG_DOCUMENT: u8 = 0x1e;
pub(crate) const TAG_ARRAY: u8 = 0x23;
pub(crate) const TAG_BINARY: u8 = 0x28;
pub(crate) const TAG_OBJECT_ID: u8 = 0x2d;
pub(crate) const TAG_BOOL: u8 = 0x32;
pub(crate) const TAG_DATE: u8 = 0x37;
pub(crate) const TAG_TIMESTAMP: u8 = 0x3c;
pub(crate) const TAG_REGEX: u8 = 0x41;
pub(crate) const TAG_MAX_KEY: u8 = 0xfa;

// Numeric class bytes: NaN orders above every other number.
pub(crate) const NUMERIC_VALUE: u8 = 0x01;
pub(crate) const NUMERIC_NAN: u8 = 0x02;

// Container framing.
pub(crate) const ITEM_MARKER: u8 = 0x01;
pub(crate) const END_MARKER: u8 = 0x00;

// Numeric subtype tags in the type-bits side channel.
pub(crate) const SUBTYPE_INT32: u8 = 0x00;
pub(crate) const SUBTYPE_INT64: u8 = 0x01;
pub(crate) const SUBTYPE_DOUBLE: u8 = 0x02;
pub(crate) const SUBTYPE_DECIMAL128: u8 = 0x03;

/// Encode a value into an index term.
///
/// `truncation_limit` bounds the payload length in bytes; `0` means
/// unlimited. Encoding never fails: an oversized value yields a truncated
/// best-effort term rather than aborting the write.
pub fn encode_term(value: &Value, descending: bool, truncation_limit: u32) -> IndexTerm {
    let mut encoder = TermEncoder::default();
    encoder.push_value(value);

    let TermEncoder {
        mut payload,
        type_bits,
        inexact,
    } = encoder;

    let mut truncated = false;
    let limit = truncation_limit as usize;
    if limit > 0 && payload.len() > limit {
        let mut cut = limit.max(1);
        // Never leave a dangling partial UTF-8 codepoint in the kept prefix.
        let mut pullback = 0;
        while cut > 1 && pullback < 3 && payload[cut] & 0xc0 == 0x80 {
            cut -= 1;
            pullback += 1;
        }
        payload.truncate(cut);
        truncated = true;
    }

    if descending {
        for byte in &mut payload {
            *byte = !*byte;
        }
    }

    IndexTerm::new(
        TermFlags {
            descending,
            truncated,
            inexact,
        },
        payload,
        type_bits,
    )
}

#[derive(Default)]
struct TermEncoder {
    payload: Vec<u8>,
    type_bits: Vec<u8>,
    inexact: bool,
}

impl TermEncoder {
    fn push_value(&mut self, value: &Value) {
        match value {
            Value::MinKey => self.payload.push(TAG_MIN_KEY),
            Value::Undefined => self.payload.push(TAG_UNDEFINED),
            Value::Null => self.payload.push(TAG_NULL),
            Value::MaxKey => self.payload.push(TAG_MAX_KEY),

            Value::Int32(n) => {
                self.type_bits.push(SUBTYPE_INT32);
                self.push_numeric(f64::from(*n), 0);
            }
            Value::Int64(n) => {
                self.type_bits.push(SUBTYPE_INT64);
                let approx = *n as f64;
                // The rounding error of i64 -> f64 fits comfortably in i64.
                let residual = (i128::from(*n) - approx as i128) as i64;
                self.push_numeric(approx, residual);
            }
            Value::Double(f) => {
                self.type_bits.push(SUBTYPE_DOUBLE);
                if f.is_nan() {
                    self.payload.push(TAG_NUMERIC);
                    self.payload.push(NUMERIC_NAN);
                } else {
                    self.push_numeric(*f, 0);
                }
            }
            Value::Decimal128(d) => {
                self.type_bits.push(SUBTYPE_DECIMAL128);
                self.type_bits.extend_from_slice(&d.to_le_bytes());
                if let Some(exact) = d.as_i64() {
                    // Same scheme as Int64: equal integers are byte-identical
                    // across widths.
                    let approx = exact as f64;
                    let residual = (i128::from(exact) - approx as i128) as i64;
                    self.push_numeric(approx, residual);
                } else if let Some(exact) = d.to_f64_exact() {
                    self.push_numeric(exact, 0);
                } else {
                    let approx = d.to_f64();
                    if approx.is_nan() {
                        self.payload.push(TAG_NUMERIC);
                        self.payload.push(NUMERIC_NAN);
                    } else if approx.is_infinite() {
                        self.push_numeric(approx, 0);
                    } else {
                        // The payload can only approximate this decimal. A
                        // sign-only residual keeps integers that share the
                        // approximation on the correct side; the inexact flag
                        // sends equality decisions to document recheck.
                        const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
                        let residual = if approx.fract() == 0.0 && approx.abs() < TWO_POW_63 {
                            match d.compare_i64(approx as i64) {
                                Ordering::Less => -1,
                                Ordering::Equal => 0,
                                Ordering::Greater => 1,
                            }
                        } else {
                            0
                        };
                        self.inexact = true;
                        self.push_numeric(approx, residual);
                    }
                }
            }

            Value::String(s) => {
                self.payload.push(TAG_STRING);
                self.push_escaped(s.as_bytes());
            }

            Value::Document(fields) => {
                self.payload.push(TAG_DOCUMENT);
                for (key, field_value) in fields {
                    self.payload.push(ITEM_MARKER);
                    self.push_escaped(key.as_bytes());
                    self.push_value(field_value);
                }
                self.payload.push(END_MARKER);
            }

            Value::Array(items) => {
                self.payload.push(TAG_ARRAY);
                for item in items {
                    self.payload.push(ITEM_MARKER);
                    self.push_value(item);
                }
                self.payload.push(END_MARKER);
            }

            Value::Binary { subtype, bytes } => {
                self.payload.push(TAG_BINARY);
                self.payload
                    .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                self.payload.push(*subtype);
                self.payload.extend_from_slice(bytes);
            }

            Value::ObjectId(bytes) => {
                self.payload.push(TAG_OBJECT_ID);
                self.payload.extend_from_slice(bytes);
            }

            Value::Bool(b) => {
                self.payload.push(TAG_BOOL);
                self.payload.push(u8::from(*b));
            }

            Value::Date(millis) => {
                self.payload.push(TAG_DATE);
                self.payload
                    .extend_from_slice(&sortable_signed(*millis).to_be_bytes());
            }

            Value::Timestamp { time, increment } => {
                self.payload.push(TAG_TIMESTAMP);
                self.payload.extend_from_slice(&time.to_be_bytes());
                self.payload.extend_from_slice(&increment.to_be_bytes());
            }

            Value::Regex { pattern, options } => {
                self.payload.push(TAG_REGEX);
                self.push_escaped(pattern.as_bytes());
                self.push_escaped(options.as_bytes());
            }
        }
    }

    /// Numeric payload: class byte, sortable-double bits, biased residual.
    fn push_numeric(&mut self, approx: f64, residual: i64) {
        // -0.0 and 0.0 must be byte-identical.
        let approx = if approx == 0.0 { 0.0 } else { approx };
        self.payload.push(TAG_NUMERIC);
        self.payload.push(NUMERIC_VALUE);
        self.payload
            .extend_from_slice(&sortable_double(approx).to_be_bytes());
        self.payload
            .extend_from_slice(&sortable_signed(residual).to_be_bytes());
    }

    /// `0x00`-escaped bytes with a `0x00 0x00` terminator; preserves byte
    /// order and keeps embedded NULs unambiguous.
    fn push_escaped(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.payload.push(byte);
            if byte == 0x00 {
                self.payload.push(0xff);
            }
        }
        self.payload.push(0x00);
        self.payload.push(0x00);
    }
}

/// Map an `f64` onto `u64` such that unsigned order matches numeric order.
pub(crate) fn sortable_double(f: f64) -> u64 {
    let bits = f.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

/// Invert [`sortable_double`].
pub(crate) fn unsortable_double(bits: u64) -> f64 {
    if bits >> 63 == 1 {
        f64::from_bits(bits ^ (1 << 63))
    } else {
        f64::from_bits(!bits)
    }
}

/// Map an `i64` onto `u64` preserving order (bias by the sign bit).
pub(crate) fn sortable_signed(n: i64) -> u64 {
    (n as u64) ^ (1 << 63)
}

/// Invert [`sortable_signed`].
pub(crate) fn unsortable_signed(bits: u64) -> i64 {
    (bits ^ (1 << 63)) as i64
}
