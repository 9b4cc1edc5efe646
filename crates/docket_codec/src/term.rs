//! Serialized index terms.
//!
//! An index term is the ordered byte form of one `(value, flags)` pair. The
//! `payload` is the order-preserving part: for two terms with the same flag
//! configuration, plain byte-lexicographic comparison of payloads agrees with
//! the value order. `type_bits` is an ordering-neutral side channel recording
//! the numeric subtypes encountered during encoding, so that equal numbers of
//! different widths share payload bytes while decode stays lossless.
//!
//! Descending terms carry the bitwise complement of the ascending payload and
//! set the high flag bit, so ascending and descending terms of one index
//! remain ordered as disjoint blocks under plain byte order.

use std::cmp::Ordering;

use crate::error::{CodecError, CodecResult};

/// Flag bit: the payload was cut short of the full encoding.
pub(crate) const FLAG_TRUNCATED: u8 = 0x01;
/// Flag bit: the payload only approximates the value.
pub(crate) const FLAG_INEXACT: u8 = 0x02;
/// Flag bit: the serialized blob is a composite of several terms.
pub(crate) const FLAG_COMPOSITE: u8 = 0x04;
/// Flag bit: the payload is complemented for a descending path.
pub(crate) const FLAG_DESCENDING: u8 = 0x80;

/// Prefix tag of the textual debug encoding.
const DEBUG_FORMAT_TAG: &str = "term1-";

/// Direction and fidelity flags of an index term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermFlags {
    /// The term belongs to a descending index path.
    pub descending: bool,
    /// The payload is a truncated prefix of the full encoding.
    pub truncated: bool,
    /// The payload only approximates the value (a decimal wider than double
    /// precision). Equality decisions must go through document recheck.
    pub inexact: bool,
}

impl TermFlags {
    fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.truncated {
            byte |= FLAG_TRUNCATED;
        }
        if self.inexact {
            byte |= FLAG_INEXACT;
        }
        if self.descending {
            byte |= FLAG_DESCENDING;
        }
        byte
    }

    fn from_byte(byte: u8) -> CodecResult<Self> {
        if byte & !(FLAG_TRUNCATED | FLAG_INEXACT | FLAG_DESCENDING) != 0 {
            return Err(CodecError::corrupt(format!(
                "unknown flag bits {byte:#04x} in term header"
            )));
        }
        Ok(Self {
            descending: byte & FLAG_DESCENDING != 0,
            truncated: byte & FLAG_TRUNCATED != 0,
            inexact: byte & FLAG_INEXACT != 0,
        })
    }
}

/// The serialized, ordered form of one indexed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTerm {
    pub(crate) flags: TermFlags,
    pub(crate) payload: Vec<u8>,
    pub(crate) type_bits: Vec<u8>,
}

impl IndexTerm {
    pub(crate) fn new(flags: TermFlags, payload: Vec<u8>, type_bits: Vec<u8>) -> Self {
        Self {
            flags,
            payload,
            type_bits,
        }
    }

    /// The term's flags.
    pub fn flags(&self) -> TermFlags {
        self.flags
    }

    /// Whether the payload was truncated. Equality decisions against a
    /// truncated term must go through document recheck.
    pub fn is_truncated(&self) -> bool {
        self.flags.truncated
    }

    /// Whether the payload only approximates the value. Like truncation,
    /// equality against an inexact term must go through document recheck.
    pub fn is_inexact(&self) -> bool {
        self.flags.inexact
    }

    /// Whether the term belongs to a descending index path.
    pub fn is_descending(&self) -> bool {
        self.flags.descending
    }

    /// The order-preserving payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The ordering-neutral subtype side channel.
    pub fn type_bits(&self) -> &[u8] {
        &self.type_bits
    }

    /// Serialize to the storable wire form:
    /// `[flags][payload_len: u32 BE][payload][type_bits]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + self.payload.len() + self.type_bits.len());
        out.push(self.flags.to_byte());
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.type_bits);
        out
    }

    /// Parse the wire form produced by [`IndexTerm::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < 5 {
            return Err(CodecError::corrupt("term shorter than its header"));
        }
        let flags = TermFlags::from_byte(bytes[0])?;
        let payload_len =
            u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        if bytes.len() < 5 + payload_len {
            return Err(CodecError::corrupt("term payload length overruns buffer"));
        }
        Ok(Self {
            flags,
            payload: bytes[5..5 + payload_len].to_vec(),
            type_bits: bytes[5 + payload_len..].to_vec(),
        })
    }

    /// Textual debug encoding: a format tag followed by the hex wire form.
    /// Round-trips losslessly for non-truncated terms.
    pub fn to_debug_string(&self) -> String {
        format!("{DEBUG_FORMAT_TAG}{}", hex::encode(self.to_bytes()))
    }

    /// Parse the textual debug encoding.
    pub fn from_debug_string(text: &str) -> CodecResult<Self> {
        let hex_part = text
            .strip_prefix(DEBUG_FORMAT_TAG)
            .ok_or_else(|| CodecError::invalid_debug("missing format tag"))?;
        let bytes = hex::decode(hex_part)
            .map_err(|e| CodecError::invalid_debug(format!("bad hex: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// Compare two index terms.
///
/// Both terms must share a direction; comparing an ascending against a
/// descending term is a caller bug and surfaces as a hard error. When either
/// operand is truncated, an `Equal` result only establishes bound membership
/// (the full values may still differ past the truncation point) — equality
/// proper requires a document recheck.
pub fn compare_terms(a: &IndexTerm, b: &IndexTerm) -> CodecResult<Ordering> {
    if a.flags.descending != b.flags.descending {
        return Err(CodecError::MixedDirectionCompare);
    }
    let cmp = a.payload.cmp(&b.payload);
    if cmp != Ordering::Equal {
        return Ok(cmp);
    }
    // Payloads equal: a truncated or inexact term sorts after the equal
    // exact term (reversed on descending paths, matching the payload
    // complement), so exact equality bounds never pick up approximate
    // neighbours.
    let tie = (a.flags.truncated, a.flags.inexact).cmp(&(b.flags.truncated, b.flags.inexact));
    Ok(if a.flags.descending { tie.reverse() } else { tie })
}

/// Serialize a composite term: one storable blob holding the per-path member
/// terms of a single index row, ordered member-wise.
///
/// Layout: `[composite marker][member_len: u32 BE][member bytes]...` where
/// each member is an [`IndexTerm::to_bytes`] blob. Composite blobs sort after
/// every non-composite term.
pub fn serialize_composite(terms: &[IndexTerm]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(FLAG_COMPOSITE);
    for term in terms {
        let member = term.to_bytes();
        out.extend_from_slice(&(member.len() as u32).to_be_bytes());
        out.extend_from_slice(&member);
    }
    out
}

/// Whether a serialized blob is a composite term.
pub fn is_serialized_composite(bytes: &[u8]) -> bool {
    bytes.first() == Some(&FLAG_COMPOSITE)
}

/// Parse a composite blob back into its member terms.
pub fn parse_composite(bytes: &[u8]) -> CodecResult<Vec<IndexTerm>> {
    if !is_serialized_composite(bytes) {
        return Err(CodecError::corrupt("not a composite term"));
    }
    let mut members = Vec::new();
    let mut rest = &bytes[1..];
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(CodecError::corrupt("composite member header overruns buffer"));
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        rest = &rest[4..];
        if rest.len() < len {
            return Err(CodecError::corrupt("composite member overruns buffer"));
        }
        members.push(IndexTerm::from_bytes(&rest[..len])?);
        rest = &rest[len..];
    }
    Ok(members)
}

/// Compare two composite rows member-wise, shorter prefix first.
pub fn compare_composite(a: &[IndexTerm], b: &[IndexTerm]) -> CodecResult<Ordering> {
    for (term_a, term_b) in a.iter().zip(b.iter()) {
        let cmp = compare_terms(term_a, term_b)?;
        if cmp != Ordering::Equal {
            return Ok(cmp);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(descending: bool, truncated: bool, payload: &[u8]) -> IndexTerm {
        IndexTerm::new(
            TermFlags {
                descending,
                truncated,
                ..TermFlags::default()
            },
            payload.to_vec(),
            Vec::new(),
        )
    }

    #[test]
    fn wire_roundtrip() {
        let t = IndexTerm::new(
            TermFlags {
                descending: true,
                truncated: false,
                inexact: true,
            },
            vec![1, 2, 3],
            vec![9],
        );
        let parsed = IndexTerm::from_bytes(&t.to_bytes()).unwrap();
        assert_eq!(t, parsed);
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(matches!(
            IndexTerm::from_bytes(&[0xff, 0, 0, 0, 0]),
            Err(CodecError::CorruptTerm { .. })
        ));
        assert!(matches!(
            IndexTerm::from_bytes(&[0, 0, 0, 0, 9, 1]),
            Err(CodecError::CorruptTerm { .. })
        ));
        assert!(matches!(
            IndexTerm::from_bytes(&[]),
            Err(CodecError::CorruptTerm { .. })
        ));
    }

    #[test]
    fn compare_rejects_mixed_direction() {
        let asc = term(false, false, &[1]);
        let desc = term(true, false, &[1]);
        assert_eq!(
            compare_terms(&asc, &desc),
            Err(CodecError::MixedDirectionCompare)
        );
    }

    #[test]
    fn truncated_sorts_after_equal_payload() {
        let full = term(false, false, &[5, 5]);
        let cut = term(false, true, &[5, 5]);
        assert_eq!(compare_terms(&full, &cut).unwrap(), Ordering::Less);
        // Reversed for descending payloads.
        let full_d = term(true, false, &[5, 5]);
        let cut_d = term(true, true, &[5, 5]);
        assert_eq!(compare_terms(&full_d, &cut_d).unwrap(), Ordering::Greater);
    }

    #[test]
    fn inexact_sorts_after_equal_exact_payload() {
        let exact = term(false, false, &[7]);
        let mut approximate = term(false, false, &[7]);
        approximate.flags.inexact = true;
        assert_eq!(compare_terms(&exact, &approximate).unwrap(), Ordering::Less);
        assert_eq!(
            compare_terms(&approximate, &approximate).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn composite_roundtrip_and_order() {
        let row = vec![term(false, false, &[1, 2]), term(false, true, &[3])];
        let blob = serialize_composite(&row);
        assert!(is_serialized_composite(&blob));
        assert_eq!(parse_composite(&blob).unwrap(), row);

        let smaller = vec![term(false, false, &[1, 2]), term(false, false, &[2])];
        assert_eq!(compare_composite(&smaller, &row).unwrap(), Ordering::Less);
        // Prefix rows sort first.
        let prefix = vec![term(false, false, &[1, 2])];
        assert_eq!(compare_composite(&prefix, &row).unwrap(), Ordering::Less);
    }

    #[test]
    fn composite_blob_sorts_after_plain_terms() {
        // Ascending plain terms start with 0x00/0x01; composites with 0x04.
        let plain = term(false, true, &[0xff]).to_bytes();
        let composite = serialize_composite(&[term(false, false, &[0x00])]);
        assert!(plain < composite);
    }

    #[test]
    fn debug_string_roundtrip() {
        let t = IndexTerm::new(TermFlags::default(), vec![0xde, 0xad], vec![2]);
        let text = t.to_debug_string();
        assert!(text.starts_with("term1-"));
        assert_eq!(IndexTerm::from_debug_string(&text).unwrap(), t);
        assert!(IndexTerm::from_debug_string("nope-00").is_err());
    }
}
