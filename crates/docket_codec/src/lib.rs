//! # Docket Codec
//!
//! Order-preserving index term encoding for Docket.
//!
//! This crate turns document values into byte strings whose plain
//! lexicographic order agrees with the canonical value order:
//! - One total order across every value type, numbers compared by
//!   mathematical value regardless of width
//! - Equal numbers encode to identical payload bytes; a side channel of
//!   type bits keeps decoding lossless
//! - Oversized values truncate to an ordering-safe prefix, flagged so
//!   readers know equality needs a document recheck; decimals wider than
//!   double precision are flagged inexact for the same reason
//! - Descending paths complement the payload, reversing the byte order
//!
//! ## Usage
//!
//! ```
//! use docket_codec::{decode_term, encode_term, Value};
//!
//! let a = encode_term(&Value::Int32(5), false, 0);
//! let b = encode_term(&Value::Double(5.5), false, 0);
//! assert!(a.payload() < b.payload());
//!
//! // Equal numbers of different widths share payload bytes but decode
//! // back to their original subtype.
//! let wide = encode_term(&Value::Int64(5), false, 0);
//! assert_eq!(a.payload(), wide.payload());
//! assert_eq!(decode_term(&wide).unwrap(), Value::Int64(5));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decimal;
mod decoder;
mod encoder;
mod error;
mod ordering;
mod term;
mod value;

pub use decimal::{Decimal128, DecimalClass};
pub use decoder::decode_term;
pub use encoder::encode_term;
pub use error::{CodecError, CodecResult};
pub use ordering::{compare_values, type_rank};
pub use term::{
    compare_composite, compare_terms, is_serialized_composite, parse_composite,
    serialize_composite, IndexTerm, TermFlags,
};
pub use value::{doc, Value};
