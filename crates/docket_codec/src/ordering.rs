//! The total order over document values.
//!
//! All index semantics derive from this one comparison: type brackets first
//! (MinKey < Undefined < Null < numbers < strings < documents < arrays <
//! binary < object id < bool < date < timestamp < regex < MaxKey), then
//! within-type rules. Numbers compare by mathematical value regardless of
//! width; `-0.0 == 0.0`; NaN orders greater than every other number so the
//! order stays total within a single index.

use std::cmp::Ordering;

use crate::value::Value;

/// Rank of a value's type bracket in the canonical cross-type order.
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::MinKey => 0,
        Value::Undefined => 1,
        Value::Null => 2,
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_) => 3,
        Value::String(_) => 4,
        Value::Document(_) => 5,
        Value::Array(_) => 6,
        Value::Binary { .. } => 7,
        Value::ObjectId(_) => 8,
        Value::Bool(_) => 9,
        Value::Date(_) => 10,
        Value::Timestamp { .. } => 11,
        Value::Regex { .. } => 12,
        Value::MaxKey => 13,
    }
}

/// Compare two values under the canonical total order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank_a = type_rank(a);
    let rank_b = type_rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match (a, b) {
        (Value::MinKey, Value::MinKey)
        | (Value::Undefined, Value::Undefined)
        | (Value::Null, Value::Null)
        | (Value::MaxKey, Value::MaxKey) => Ordering::Equal,

        _ if a.is_numeric() => compare_numeric(a, b),

        (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),

        (Value::Document(a), Value::Document(b)) => {
            for ((key_a, val_a), (key_b, val_b)) in a.iter().zip(b.iter()) {
                let key_cmp = key_a.as_bytes().cmp(key_b.as_bytes());
                if key_cmp != Ordering::Equal {
                    return key_cmp;
                }
                let val_cmp = compare_values(val_a, val_b);
                if val_cmp != Ordering::Equal {
                    return val_cmp;
                }
            }
            a.len().cmp(&b.len())
        }

        (Value::Array(a), Value::Array(b)) => {
            for (item_a, item_b) in a.iter().zip(b.iter()) {
                let cmp = compare_values(item_a, item_b);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            a.len().cmp(&b.len())
        }

        (
            Value::Binary {
                subtype: sub_a,
                bytes: bytes_a,
            },
            Value::Binary {
                subtype: sub_b,
                bytes: bytes_b,
            },
        ) => bytes_a
            .len()
            .cmp(&bytes_b.len())
            .then(sub_a.cmp(sub_b))
            .then_with(|| bytes_a.cmp(bytes_b)),

        (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),

        (
            Value::Timestamp {
                time: time_a,
                increment: inc_a,
            },
            Value::Timestamp {
                time: time_b,
                increment: inc_b,
            },
        ) => time_a.cmp(time_b).then(inc_a.cmp(inc_b)),

        (
            Value::Regex {
                pattern: pat_a,
                options: opt_a,
            },
            Value::Regex {
                pattern: pat_b,
                options: opt_b,
            },
        ) => pat_a
            .as_bytes()
            .cmp(pat_b.as_bytes())
            .then_with(|| opt_a.as_bytes().cmp(opt_b.as_bytes())),

        // Unreachable: ranks matched above.
        _ => Ordering::Equal,
    }
}

fn is_nan(value: &Value) -> bool {
    match value {
        Value::Double(f) => f.is_nan(),
        Value::Decimal128(d) => d.is_nan(),
        _ => false,
    }
}

fn compare_numeric(a: &Value, b: &Value) -> Ordering {
    match (is_nan(a), is_nan(b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    match (a, b) {
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Decimal128(x), Value::Decimal128(y)) => x.compare(*y),
        (Value::Decimal128(x), Value::Double(y)) => {
            x.to_f64().partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Value::Double(x), Value::Decimal128(y)) => {
            x.partial_cmp(&y.to_f64()).unwrap_or(Ordering::Equal)
        }
        (Value::Decimal128(x), _) => {
            // Other side is an integer; exact.
            x.compare_i64(b.as_i64().unwrap_or(0))
        }
        (_, Value::Decimal128(y)) => y.compare_i64(a.as_i64().unwrap_or(0)).reverse(),
        (Value::Double(x), _) => compare_i64_f64(b.as_i64().unwrap_or(0), *x).reverse(),
        (_, Value::Double(y)) => compare_i64_f64(a.as_i64().unwrap_or(0), *y),
        _ => {
            // Both integers.
            a.as_i64().unwrap_or(0).cmp(&b.as_i64().unwrap_or(0))
        }
    }
}

/// Exact comparison of an `i64` against a non-NaN `f64`.
fn compare_i64_f64(value: i64, double: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if double >= TWO_POW_63 {
        return Ordering::Less;
    }
    if double < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let truncated = double.trunc();
    let truncated_int = truncated as i128;
    let value_wide = i128::from(value);
    if value_wide != truncated_int {
        return value_wide.cmp(&truncated_int);
    }
    let fraction = double - truncated;
    if fraction > 0.0 {
        Ordering::Less
    } else if fraction < 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Decimal128;
    use crate::value::doc;

    fn assert_less(a: Value, b: Value) {
        assert_eq!(compare_values(&a, &b), Ordering::Less, "{a:?} < {b:?}");
        assert_eq!(compare_values(&b, &a), Ordering::Greater, "{b:?} > {a:?}");
    }

    fn assert_same(a: Value, b: Value) {
        assert_eq!(compare_values(&a, &b), Ordering::Equal, "{a:?} == {b:?}");
    }

    #[test]
    fn cross_type_order() {
        let ladder = vec![
            Value::MinKey,
            Value::Undefined,
            Value::Null,
            Value::Int32(7),
            Value::String("a".into()),
            doc(vec![("a", Value::Int32(1))]),
            Value::Array(vec![Value::Int32(1)]),
            Value::Binary {
                subtype: 0,
                bytes: vec![1],
            },
            Value::ObjectId([1; 12]),
            Value::Bool(false),
            Value::Date(0),
            Value::Timestamp {
                time: 0,
                increment: 0,
            },
            Value::Regex {
                pattern: "a".into(),
                options: String::new(),
            },
            Value::MaxKey,
        ];
        for pair in ladder.windows(2) {
            assert_less(pair[0].clone(), pair[1].clone());
        }
    }

    #[test]
    fn minkey_below_null_below_every_numeric_subtype() {
        for number in [
            Value::Int32(i32::MIN),
            Value::Int64(i64::MIN),
            Value::Double(f64::NEG_INFINITY),
            Value::Decimal128(Decimal128::from_parts(true, 100, 1)),
        ] {
            assert_less(Value::MinKey, Value::Null);
            assert_less(Value::Null, number);
        }
    }

    #[test]
    fn numbers_compare_by_value_across_widths() {
        assert_same(Value::Int32(5), Value::Int64(5));
        assert_same(Value::Int64(5), Value::Double(5.0));
        assert_same(Value::Int32(5), Value::Decimal128(Decimal128::from_i64(5)));
        assert_same(
            Value::Double(2.5),
            Value::Decimal128(Decimal128::from_parts(false, -1, 25)),
        );
        assert_less(Value::Double(4.5), Value::Int32(5));
        assert_less(Value::Int64(4), Value::Double(4.5));
    }

    #[test]
    fn large_integers_compare_exactly_against_doubles() {
        // 2^53 + 1 is not representable as f64; the comparison must still be
        // exact rather than rounding both sides.
        let big = (1i64 << 53) + 1;
        assert_less(Value::Double((1i64 << 53) as f64), Value::Int64(big));
        assert_less(Value::Int64(i64::MAX), Value::Double(f64::INFINITY));
        assert_same(Value::Int64(i64::MIN), Value::Double(-(2f64.powi(63))));
    }

    #[test]
    fn negative_zero_and_nan_policy() {
        assert_same(Value::Double(-0.0), Value::Double(0.0));
        assert_same(Value::Double(-0.0), Value::Int32(0));
        assert_less(Value::Double(f64::INFINITY), Value::Double(f64::NAN));
        assert_less(Value::Int64(i64::MAX), Value::Double(f64::NAN));
        assert_same(Value::Double(f64::NAN), Value::Double(f64::NAN));
        // NaN is still inside the numeric bracket: below strings.
        assert_less(Value::Double(f64::NAN), Value::String(String::new()));
    }

    #[test]
    fn string_order_is_bytewise() {
        assert_less(Value::from(""), Value::from("a"));
        assert_less(Value::from("a"), Value::from("a\u{0}b"));
        assert_less(Value::from("abc"), Value::from("abd"));
    }

    #[test]
    fn document_order_is_field_by_field() {
        assert_less(
            doc(vec![("a", Value::Int32(1))]),
            doc(vec![("a", Value::Int32(2))]),
        );
        assert_less(
            doc(vec![("a", Value::Int32(1))]),
            doc(vec![("a", Value::Int32(1)), ("b", Value::Int32(0))]),
        );
        assert_less(
            doc(vec![("a", Value::Int32(9))]),
            doc(vec![("b", Value::Int32(0))]),
        );
    }

    #[test]
    fn binary_orders_by_length_first() {
        assert_less(
            Value::Binary {
                subtype: 9,
                bytes: vec![0xff],
            },
            Value::Binary {
                subtype: 0,
                bytes: vec![0, 0],
            },
        );
        assert_less(
            Value::Binary {
                subtype: 0,
                bytes: vec![1, 2],
            },
            Value::Binary {
                subtype: 1,
                bytes: vec![1, 2],
            },
        );
    }
}
