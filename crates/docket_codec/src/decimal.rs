//! IEEE 754-2008 decimal128 values.
//!
//! The index core never does decimal arithmetic; it only needs to classify a
//! decimal128 (finite / infinity / NaN), compare two decimals by mathematical
//! value, and approximate one as an `f64` for the order-preserving numeric
//! payload. Values are carried as raw BID (binary integer decimal) bits so
//! they round-trip losslessly through the term codec.

use std::cmp::Ordering;

const EXPONENT_BIAS: i32 = 6176;
const COEFFICIENT_MASK: u128 = (1u128 << 113) - 1;
const MAX_COEFFICIENT: u128 = 10u128.pow(34) - 1;

/// A decimal128 value, stored as its raw BID encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal128 {
    bits: u128,
}

/// The decoded classification of a decimal128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalClass {
    /// A finite value `(-1)^negative * coefficient * 10^exponent`.
    Finite {
        /// Sign bit.
        negative: bool,
        /// Decimal exponent, already unbiased.
        exponent: i32,
        /// Integer coefficient, at most 34 decimal digits.
        coefficient: u128,
    },
    /// Positive or negative infinity.
    Infinity {
        /// Sign bit.
        negative: bool,
    },
    /// Not a number.
    NaN,
}

impl Decimal128 {
    /// A decimal NaN.
    pub const NAN: Decimal128 = Decimal128 {
        bits: 0x7c00_0000_0000_0000_0000_0000_0000_0000,
    };

    /// Positive infinity.
    pub const INFINITY: Decimal128 = Decimal128 {
        bits: 0x7800_0000_0000_0000_0000_0000_0000_0000,
    };

    /// Construct from raw BID bits.
    pub fn from_bits(bits: u128) -> Self {
        Self { bits }
    }

    /// The raw BID bits.
    pub fn to_bits(self) -> u128 {
        self.bits
    }

    /// Construct from the 16-byte little-endian form used by BSON.
    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self {
            bits: u128::from_le_bytes(bytes),
        }
    }

    /// The 16-byte little-endian form used by BSON.
    pub fn to_le_bytes(self) -> [u8; 16] {
        self.bits.to_le_bytes()
    }

    /// Build a finite decimal from parts. The coefficient is clamped to 34
    /// digits and the exponent to the representable range.
    pub fn from_parts(negative: bool, exponent: i32, coefficient: u128) -> Self {
        let coefficient = coefficient.min(MAX_COEFFICIENT);
        let raw_exponent = (exponent + EXPONENT_BIAS).clamp(0, 0x2fff) as u128;
        let mut bits = (raw_exponent << 113) | coefficient;
        if negative {
            bits |= 1u128 << 127;
        }
        Self { bits }
    }

    /// An exact decimal rendering of an `i64`.
    pub fn from_i64(value: i64) -> Self {
        Self::from_parts(value < 0, 0, value.unsigned_abs() as u128)
    }

    /// Decode the BID layout.
    pub fn classify(self) -> DecimalClass {
        let negative = (self.bits >> 127) & 1 == 1;
        let combination = (self.bits >> 122) & 0x1f;
        if combination == 0x1f {
            return DecimalClass::NaN;
        }
        if combination == 0x1e {
            return DecimalClass::Infinity { negative };
        }
        if (self.bits >> 125) & 0b11 == 0b11 {
            // Second BID form: the implied coefficient always exceeds
            // 10^34 - 1, which the standard defines as non-canonical zero.
            let exponent = ((self.bits >> 111) & 0x3fff) as i32 - EXPONENT_BIAS;
            return DecimalClass::Finite {
                negative,
                exponent,
                coefficient: 0,
            };
        }
        let exponent = ((self.bits >> 113) & 0x3fff) as i32 - EXPONENT_BIAS;
        let coefficient = self.bits & COEFFICIENT_MASK;
        if coefficient > MAX_COEFFICIENT {
            // Non-canonical coefficient is also zero.
            return DecimalClass::Finite {
                negative,
                exponent,
                coefficient: 0,
            };
        }
        DecimalClass::Finite {
            negative,
            exponent,
            coefficient,
        }
    }

    /// Whether this decimal is NaN.
    pub fn is_nan(self) -> bool {
        matches!(self.classify(), DecimalClass::NaN)
    }

    /// Nearest `f64` approximation.
    pub fn to_f64(self) -> f64 {
        match self.classify() {
            DecimalClass::NaN => f64::NAN,
            DecimalClass::Infinity { negative } => {
                if negative {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                }
            }
            DecimalClass::Finite {
                negative,
                exponent,
                coefficient,
            } => {
                let (coefficient, exponent) = normalize(coefficient, exponent);
                // Dividing by the positive power keeps the error to one
                // rounding; multiplying by the inexact reciprocal does not.
                let magnitude = if (-308..0).contains(&exponent) {
                    coefficient as f64 / 10f64.powi(-exponent)
                } else {
                    coefficient as f64 * 10f64.powi(exponent)
                };
                if negative {
                    -magnitude
                } else {
                    magnitude
                }
            }
        }
    }

    /// The exact `i64` this decimal denotes, if it is one.
    pub fn as_i64(self) -> Option<i64> {
        let DecimalClass::Finite {
            negative,
            exponent,
            coefficient,
        } = self.classify()
        else {
            return None;
        };
        let (coefficient, exponent) = normalize(coefficient, exponent);
        if coefficient == 0 {
            return Some(0);
        }
        if exponent < 0 {
            return None;
        }
        let scale = 10u128.checked_pow(u32::try_from(exponent).ok()?)?;
        let magnitude = coefficient.checked_mul(scale)?;
        if negative {
            if magnitude > 1 << 63 {
                return None;
            }
            Some((-(magnitude as i128)) as i64)
        } else {
            i64::try_from(magnitude).ok()
        }
    }

    /// The exact `f64` equal to this decimal, if one exists.
    ///
    /// A fractional decimal `coeff * 10^-p` is a double exactly when `5^p`
    /// divides the coefficient and the quotient fits the 53-bit mantissa.
    pub fn to_f64_exact(self) -> Option<f64> {
        if let Some(value) = self.as_i64() {
            let approx = value as f64;
            return (approx as i128 == i128::from(value)).then_some(approx);
        }
        let DecimalClass::Finite {
            negative,
            exponent,
            coefficient,
        } = self.classify()
        else {
            return None;
        };
        let (coefficient, exponent) = normalize(coefficient, exponent);
        if exponent >= 0 {
            return None;
        }
        let halvings = u32::try_from(-exponent).ok()?;
        let divisor = 5u128.checked_pow(halvings)?;
        if coefficient % divisor != 0 {
            return None;
        }
        let mantissa = coefficient / divisor;
        if mantissa >= 1 << 53 || halvings > 1000 {
            return None;
        }
        let magnitude = mantissa as f64 * 2f64.powi(-(halvings as i32));
        Some(if negative { -magnitude } else { magnitude })
    }

    /// Exact comparison of two decimals by mathematical value.
    ///
    /// NaN compares greater than everything else (the index-wide NaN policy)
    /// and equal to itself so the order stays total.
    pub fn compare(self, other: Decimal128) -> Ordering {
        use DecimalClass::*;
        match (self.classify(), other.classify()) {
            (NaN, NaN) => Ordering::Equal,
            (NaN, _) => Ordering::Greater,
            (_, NaN) => Ordering::Less,
            (Infinity { negative: a }, Infinity { negative: b }) => b.cmp(&a),
            (Infinity { negative }, Finite { .. }) => {
                if negative {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Finite { .. }, Infinity { negative }) => {
                if negative {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (
                Finite {
                    negative: neg_a,
                    exponent: exp_a,
                    coefficient: coeff_a,
                },
                Finite {
                    negative: neg_b,
                    exponent: exp_b,
                    coefficient: coeff_b,
                },
            ) => {
                if coeff_a == 0 && coeff_b == 0 {
                    return Ordering::Equal;
                }
                if coeff_a == 0 {
                    return if neg_b { Ordering::Greater } else { Ordering::Less };
                }
                if coeff_b == 0 {
                    return if neg_a { Ordering::Less } else { Ordering::Greater };
                }
                if neg_a != neg_b {
                    return if neg_a { Ordering::Less } else { Ordering::Greater };
                }
                let magnitude = compare_magnitude(coeff_a, exp_a, coeff_b, exp_b);
                if neg_a {
                    magnitude.reverse()
                } else {
                    magnitude
                }
            }
        }
    }

    /// Exact comparison against an `i64`.
    pub fn compare_i64(self, value: i64) -> Ordering {
        self.compare(Decimal128::from_i64(value))
    }
}

/// Compare two positive magnitudes `coeff * 10^exp`.
///
/// Aligning coefficients by multiplying can overflow `u128` (34-digit
/// coefficients), so compare by adjusted exponent first, then by the decimal
/// digit strings padded to equal length. Equal adjusted exponents mean the
/// leading digits occupy the same decimal position, so positional digit
/// comparison is exact.
fn compare_magnitude(coeff_a: u128, exp_a: i32, coeff_b: u128, exp_b: i32) -> Ordering {
    let adjusted_a = exp_a + decimal_digits(coeff_a);
    let adjusted_b = exp_b + decimal_digits(coeff_b);
    if adjusted_a != adjusted_b {
        return adjusted_a.cmp(&adjusted_b);
    }
    let mut digits_a = coeff_a.to_string();
    let mut digits_b = coeff_b.to_string();
    let width = digits_a.len().max(digits_b.len());
    while digits_a.len() < width {
        digits_a.push('0');
    }
    while digits_b.len() < width {
        digits_b.push('0');
    }
    digits_a.cmp(&digits_b)
}

/// Strip trailing zeros so equal values share one `(coefficient, exponent)`.
fn normalize(mut coefficient: u128, mut exponent: i32) -> (u128, i32) {
    while coefficient != 0 && coefficient % 10 == 0 {
        coefficient /= 10;
        exponent += 1;
    }
    (coefficient, exponent)
}

fn decimal_digits(mut coeff: u128) -> i32 {
    let mut digits = 1;
    while coeff >= 10 {
        coeff /= 10;
        digits += 1;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(negative: bool, exponent: i32, coefficient: u128) -> Decimal128 {
        Decimal128::from_parts(negative, exponent, coefficient)
    }

    #[test]
    fn classify_roundtrip() {
        let d = dec(false, -2, 12345); // 123.45
        assert_eq!(
            d.classify(),
            DecimalClass::Finite {
                negative: false,
                exponent: -2,
                coefficient: 12345
            }
        );
        assert!(Decimal128::NAN.is_nan());
        assert_eq!(
            Decimal128::INFINITY.classify(),
            DecimalClass::Infinity { negative: false }
        );
    }

    #[test]
    fn to_f64_simple() {
        assert_eq!(dec(false, 0, 5).to_f64(), 5.0);
        assert_eq!(dec(true, -1, 25).to_f64(), -2.5);
        assert!(Decimal128::NAN.to_f64().is_nan());
    }

    #[test]
    fn compare_same_value_different_scale() {
        // 1.0 == 1.00
        assert_eq!(dec(false, -1, 10).compare(dec(false, -2, 100)), Ordering::Equal);
        // 0.5 < 1
        assert_eq!(dec(false, -1, 5).compare(dec(false, 0, 1)), Ordering::Less);
        // -2 < -1
        assert_eq!(dec(true, 0, 2).compare(dec(true, 0, 1)), Ordering::Less);
    }

    #[test]
    fn compare_zeros_and_signs() {
        // 0 == -0 == 0.00
        assert_eq!(dec(false, 0, 0).compare(dec(true, -2, 0)), Ordering::Equal);
        assert_eq!(dec(true, 0, 1).compare(dec(false, 0, 0)), Ordering::Less);
    }

    #[test]
    fn compare_extreme_exponents() {
        // 1e100 > 9.99e99 without overflow
        let big = dec(false, 100, 1);
        let close = dec(false, 97, 999);
        assert_eq!(big.compare(close), Ordering::Greater);
        // 34 full digits against a shifted copy
        let wide = dec(false, 0, MAX_COEFFICIENT);
        let shifted = dec(false, 1, MAX_COEFFICIENT / 10);
        assert_eq!(wide.compare(shifted), Ordering::Greater);
    }

    #[test]
    fn nan_orders_greatest() {
        assert_eq!(Decimal128::NAN.compare(Decimal128::INFINITY), Ordering::Greater);
        assert_eq!(dec(false, 0, 1).compare(Decimal128::NAN), Ordering::Less);
        assert_eq!(Decimal128::NAN.compare(Decimal128::NAN), Ordering::Equal);
    }

    #[test]
    fn as_i64_extracts_exact_integers() {
        assert_eq!(dec(false, 0, 42).as_i64(), Some(42));
        assert_eq!(dec(true, -2, 500).as_i64(), Some(-5));
        assert_eq!(dec(false, 3, 7).as_i64(), Some(7000));
        assert_eq!(Decimal128::from_i64(i64::MIN).as_i64(), Some(i64::MIN));
        assert_eq!(dec(false, -1, 25).as_i64(), None);
        assert_eq!(dec(false, 30, 1).as_i64(), None);
        assert_eq!(Decimal128::NAN.as_i64(), None);
    }

    #[test]
    fn to_f64_exact_accepts_only_binary_fractions() {
        assert_eq!(dec(false, -1, 25).to_f64_exact(), Some(2.5));
        assert_eq!(dec(true, -2, 75).to_f64_exact(), Some(-0.75));
        assert_eq!(dec(false, 0, 42).to_f64_exact(), Some(42.0));
        // 0.1 has no finite binary expansion.
        assert_eq!(dec(false, -1, 1).to_f64_exact(), None);
        // One digit past double precision.
        assert_eq!(dec(false, -20, 10u128.pow(20) + 1).to_f64_exact(), None);
    }

    #[test]
    fn compare_i64_exact() {
        assert_eq!(dec(false, 0, 42).compare_i64(42), Ordering::Equal);
        assert_eq!(dec(false, -1, 425).compare_i64(42), Ordering::Greater);
        assert_eq!(Decimal128::from_i64(i64::MIN).compare_i64(i64::MIN), Ordering::Equal);
    }
}
