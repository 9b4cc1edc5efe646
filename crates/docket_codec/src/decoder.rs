//! Decoding index terms back into values.
//!
//! Decoding is the exact inverse of encoding for non-truncated terms: the
//! payload drives the structure while the type-bits side channel restores the
//! numeric subtype that the order-preserving payload deliberately erased.
//! Truncated terms are refused outright; their payload ends mid-value by
//! construction and the caller must recheck the source document instead.

use crate::decimal::Decimal128;
use crate::encoder::{
    unsortable_double, unsortable_signed, END_MARKER, ITEM_MARKER, NUMERIC_NAN, NUMERIC_VALUE,
    SUBTYPE_DECIMAL128, SUBTYPE_DOUBLE, SUBTYPE_INT32, SUBTYPE_INT64, TAG_ARRAY, TAG_BINARY,
    TAG_BOOL, TAG_DATE, TAG_DOCUMENT, TAG_MAX_KEY, TAG_MIN_KEY, TAG_NULL, TAG_NUMERIC,
    TAG_OBJECT_ID, TAG_REGEX, TAG_STRING, TAG_TIMESTAMP, TAG_UNDEFINED,
};
use crate::error::{CodecError, CodecResult};
use crate::term::IndexTerm;
use crate::value::Value;

/// Decode a term back into the value it encodes.
///
/// Returns [`CodecError::Truncated`] for truncated terms and
/// [`CodecError::CorruptTerm`] / [`CodecError::UnsupportedType`] when the
/// payload does not follow the term grammar.
pub fn decode_term(term: &IndexTerm) -> CodecResult<Value> {
    if term.is_truncated() {
        return Err(CodecError::Truncated);
    }
    let payload;
    let bytes: &[u8] = if term.is_descending() {
        payload = term.payload().iter().map(|b| !b).collect::<Vec<u8>>();
        &payload
    } else {
        term.payload()
    };

    let mut decoder = TermDecoder {
        payload: bytes,
        type_bits: term.type_bits(),
    };
    let value = decoder.read_value()?;
    if !decoder.payload.is_empty() {
        return Err(CodecError::corrupt("trailing bytes after decoded value"));
    }
    Ok(value)
}

struct TermDecoder<'a> {
    payload: &'a [u8],
    type_bits: &'a [u8],
}

impl TermDecoder<'_> {
    fn read_byte(&mut self) -> CodecResult<u8> {
        let (&byte, rest) = self
            .payload
            .split_first()
            .ok_or_else(|| CodecError::corrupt("payload ended mid-value"))?;
        self.payload = rest;
        Ok(byte)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        if self.payload.len() < N {
            return Err(CodecError::corrupt("payload ended mid-value"));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.payload[..N]);
        self.payload = &self.payload[N..];
        Ok(out)
    }

    fn read_bytes(&mut self, len: usize) -> CodecResult<&[u8]> {
        if self.payload.len() < len {
            return Err(CodecError::corrupt("payload ended mid-value"));
        }
        let (head, rest) = self.payload.split_at(len);
        self.payload = rest;
        Ok(head)
    }

    fn read_type_bit(&mut self) -> CodecResult<u8> {
        let (&byte, rest) = self
            .type_bits
            .split_first()
            .ok_or_else(|| CodecError::corrupt("type bits exhausted before payload"))?;
        self.type_bits = rest;
        Ok(byte)
    }

    fn read_value(&mut self) -> CodecResult<Value> {
        let tag = self.read_byte()?;
        match tag {
            TAG_MIN_KEY => Ok(Value::MinKey),
            TAG_UNDEFINED => Ok(Value::Undefined),
            TAG_NULL => Ok(Value::Null),
            TAG_MAX_KEY => Ok(Value::MaxKey),
            TAG_NUMERIC => self.read_numeric(),
            TAG_STRING => Ok(Value::String(self.read_string()?)),
            TAG_DOCUMENT => {
                let mut fields = Vec::new();
                loop {
                    match self.read_byte()? {
                        END_MARKER => break,
                        ITEM_MARKER => {
                            let key = self.read_string()?;
                            let value = self.read_value()?;
                            fields.push((key, value));
                        }
                        other => {
                            return Err(CodecError::corrupt(format!(
                                "bad document field marker {other:#04x}"
                            )));
                        }
                    }
                }
                Ok(Value::Document(fields))
            }
            TAG_ARRAY => {
                let mut items = Vec::new();
                loop {
                    match self.read_byte()? {
                        END_MARKER => break,
                        ITEM_MARKER => items.push(self.read_value()?),
                        other => {
                            return Err(CodecError::corrupt(format!(
                                "bad array element marker {other:#04x}"
                            )));
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            TAG_BINARY => {
                let len = u32::from_be_bytes(self.read_array()?) as usize;
                let subtype = self.read_byte()?;
                let bytes = self.read_bytes(len)?.to_vec();
                Ok(Value::Binary { subtype, bytes })
            }
            TAG_OBJECT_ID => Ok(Value::ObjectId(self.read_array()?)),
            TAG_BOOL => match self.read_byte()? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(CodecError::corrupt(format!("bad bool byte {other:#04x}"))),
            },
            TAG_DATE => {
                let bits = u64::from_be_bytes(self.read_array()?);
                Ok(Value::Date(unsortable_signed(bits)))
            }
            TAG_TIMESTAMP => {
                let time = u32::from_be_bytes(self.read_array()?);
                let increment = u32::from_be_bytes(self.read_array()?);
                Ok(Value::Timestamp { time, increment })
            }
            TAG_REGEX => {
                let pattern = self.read_string()?;
                let options = self.read_string()?;
                Ok(Value::Regex { pattern, options })
            }
            other => Err(CodecError::UnsupportedType { tag: other }),
        }
    }

    fn read_numeric(&mut self) -> CodecResult<Value> {
        let class = self.read_byte()?;
        let subtype = self.read_type_bit()?;
        match class {
            NUMERIC_NAN => match subtype {
                SUBTYPE_DOUBLE => Ok(Value::Double(f64::NAN)),
                SUBTYPE_DECIMAL128 => Ok(Value::Decimal128(self.read_decimal_bits()?)),
                other => Err(CodecError::corrupt(format!(
                    "NaN with integer subtype {other:#04x}"
                ))),
            },
            NUMERIC_VALUE => {
                let approx = unsortable_double(u64::from_be_bytes(self.read_array()?));
                let residual = unsortable_signed(u64::from_be_bytes(self.read_array()?));
                match subtype {
                    SUBTYPE_INT32 => {
                        let wide = approx as i128 + i128::from(residual);
                        i32::try_from(wide).map(Value::Int32).map_err(|_| {
                            CodecError::corrupt("int32 payload out of range")
                        })
                    }
                    SUBTYPE_INT64 => {
                        // `approx` is in [-2^63, 2^63]; the cast is exact for
                        // every value the encoder can produce.
                        let wide = approx as i128 + i128::from(residual);
                        i64::try_from(wide).map(Value::Int64).map_err(|_| {
                            CodecError::corrupt("int64 payload out of range")
                        })
                    }
                    SUBTYPE_DOUBLE => Ok(Value::Double(approx)),
                    SUBTYPE_DECIMAL128 => Ok(Value::Decimal128(self.read_decimal_bits()?)),
                    other => Err(CodecError::corrupt(format!(
                        "unknown numeric subtype {other:#04x}"
                    ))),
                }
            }
            other => Err(CodecError::corrupt(format!(
                "unknown numeric class byte {other:#04x}"
            ))),
        }
    }

    /// Decimal128 raw bits live in the type-bits channel, not the payload.
    fn read_decimal_bits(&mut self) -> CodecResult<Decimal128> {
        if self.type_bits.len() < 16 {
            return Err(CodecError::corrupt("type bits exhausted mid-decimal"));
        }
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&self.type_bits[..16]);
        self.type_bits = &self.type_bits[16..];
        Ok(Decimal128::from_le_bytes(raw))
    }

    /// Inverse of the `0x00`-escaped, `0x00 0x00`-terminated string form.
    fn read_string(&mut self) -> CodecResult<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_byte()? {
                0x00 => match self.read_byte()? {
                    0x00 => break,
                    0xff => bytes.push(0x00),
                    other => {
                        return Err(CodecError::corrupt(format!(
                            "bad string escape {other:#04x}"
                        )));
                    }
                },
                byte => bytes.push(byte),
            }
        }
        String::from_utf8(bytes).map_err(|_| CodecError::corrupt("string is not valid UTF-8"))
    }
}
