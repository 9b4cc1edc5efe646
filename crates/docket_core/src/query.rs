//! Query constraints and recheck predicates.
//!
//! A query against a composite index supplies at most one constraint per
//! indexed path. The bounds engine turns each constraint into scan bounds
//! where it can, and into a [`RecheckPredicate`] where the index term alone
//! cannot prove the match; the storage layer re-evaluates those predicates
//! against the full document for every candidate row.

use std::cmp::Ordering;

use docket_codec::{compare_values, type_rank, Value};

use crate::path::resolve;

/// One constraint on one document path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathConstraint {
    /// Match values equal to the operand.
    Eq(Value),
    /// Match values strictly greater than the operand, within its type
    /// bracket.
    Gt(Value),
    /// Match values greater than or equal to the operand, within its type
    /// bracket.
    Gte(Value),
    /// Match values strictly less than the operand, within its type bracket.
    Lt(Value),
    /// Match values less than or equal to the operand, within its type
    /// bracket.
    Lte(Value),
    /// Match values inside an explicit range.
    Range {
        /// Lower bound value.
        lo: Value,
        /// Whether the lower bound is inclusive.
        lo_incl: bool,
        /// Upper bound value.
        hi: Value,
        /// Whether the upper bound is inclusive.
        hi_incl: bool,
    },
    /// Match values equal to any operand.
    In(Vec<Value>),
    /// Match documents where no value at the path equals the operand.
    Ne(Value),
    /// Match documents where the path is (or is not) present.
    Exists(bool),
    /// Match documents where one array element satisfies every sub-constraint
    /// at once.
    ElemMatch(Vec<(String, PathConstraint)>),
}

impl PathConstraint {
    /// Whether this constraint is a pure equality (directly pushable as an
    /// equality bound).
    pub fn is_equality(&self) -> bool {
        matches!(self, PathConstraint::Eq(_) | PathConstraint::In(_))
    }

    /// Evaluate this constraint against one resolved candidate value.
    fn matches_value(&self, candidate: &Value) -> bool {
        match self {
            PathConstraint::Eq(v) => compare_values(candidate, v) == Ordering::Equal,
            PathConstraint::Gt(v) => {
                type_rank(candidate) == type_rank(v)
                    && compare_values(candidate, v) == Ordering::Greater
            }
            PathConstraint::Gte(v) => {
                type_rank(candidate) == type_rank(v)
                    && compare_values(candidate, v) != Ordering::Less
            }
            PathConstraint::Lt(v) => {
                type_rank(candidate) == type_rank(v)
                    && compare_values(candidate, v) == Ordering::Less
            }
            PathConstraint::Lte(v) => {
                type_rank(candidate) == type_rank(v)
                    && compare_values(candidate, v) != Ordering::Greater
            }
            PathConstraint::Range {
                lo,
                lo_incl,
                hi,
                hi_incl,
            } => {
                let above = match compare_values(candidate, lo) {
                    Ordering::Greater => true,
                    Ordering::Equal => *lo_incl,
                    Ordering::Less => false,
                };
                let below = match compare_values(candidate, hi) {
                    Ordering::Less => true,
                    Ordering::Equal => *hi_incl,
                    Ordering::Greater => false,
                };
                above && below
            }
            PathConstraint::In(values) => values
                .iter()
                .any(|v| compare_values(candidate, v) == Ordering::Equal),
            // Ne and Exists quantify over all candidates; handled one level
            // up in `matches_document`.
            PathConstraint::Ne(v) => compare_values(candidate, v) != Ordering::Equal,
            PathConstraint::Exists(_) => true,
            PathConstraint::ElemMatch(subs) => match candidate {
                Value::Array(items) => items.iter().any(|item| {
                    subs.iter()
                        .all(|(subpath, sub)| sub.matches_document(item, subpath))
                }),
                _ => false,
            },
        }
    }

    /// Evaluate this constraint against a full document at `path`.
    pub fn matches_document(&self, document: &Value, path: &str) -> bool {
        let candidates = resolve(document, path);
        match self {
            PathConstraint::Ne(v) => !candidates
                .iter()
                .any(|c| compare_values(c, v) == Ordering::Equal),
            PathConstraint::Exists(expected) => {
                let present = candidates.iter().any(|c| !c.is_undefined());
                present == *expected
            }
            PathConstraint::ElemMatch(_) => candidates
                .iter()
                .filter(|c| matches!(c, Value::Array(_)))
                .any(|c| self.matches_value(c)),
            _ => candidates.iter().any(|c| self.matches_value(c)),
        }
    }
}

/// The per-path constraint list of one query.
#[derive(Debug, Clone, Default)]
pub struct QueryPredicate {
    constraints: Vec<(String, PathConstraint)>,
}

impl QueryPredicate {
    /// An empty predicate (matches everything; full-range scan).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint on a path, replacing any previous one.
    pub fn with(mut self, path: impl Into<String>, constraint: PathConstraint) -> Self {
        let path = path.into();
        self.constraints.retain(|(p, _)| *p != path);
        self.constraints.push((path, constraint));
        self
    }

    /// The constraint on an exact path, if any.
    pub fn get(&self, path: &str) -> Option<&PathConstraint> {
        self.constraints
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, c)| c)
    }

    /// Iterate over all `(path, constraint)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathConstraint)> {
        self.constraints.iter().map(|(p, c)| (p.as_str(), c))
    }
}

/// Why a scan range needs a document recheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckReason {
    /// A bound term was truncated; the index prefix cannot decide equality.
    TruncatedBound,
    /// A bound term's payload only approximates its value (a decimal wider
    /// than double precision); equality past that precision needs the
    /// document.
    InexactBound,
    /// An absence test on a multi-key path: partial-presence rows carry the
    /// absent sentinel for elements missing only the subpath.
    PartialPresence,
    /// Two or more constrained paths share a multi-key correlated ancestor;
    /// per-row conjunction across array elements is not provable.
    CorrelatedConjunction,
    /// The operator is not representable as a single contiguous bound.
    NotRepresentable,
    /// The path is equality-only; a range constraint degraded to full range.
    UnorderedPath,
    /// An `$elemMatch` whose sub-paths are not proven co-occurring.
    ElemMatch,
}

/// A predicate the storage layer must re-evaluate against the full document.
#[derive(Debug, Clone, PartialEq)]
pub struct RecheckPredicate {
    /// The constrained document path.
    pub path: String,
    /// The original constraint.
    pub constraint: PathConstraint,
    /// Why the index alone cannot prove the match.
    pub reason: RecheckReason,
}

impl RecheckPredicate {
    /// Re-evaluate the original constraint against the full document.
    pub fn evaluate(&self, document: &Value) -> bool {
        self.constraint.matches_document(document, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_codec::doc;

    fn sample() -> Value {
        doc(vec![
            ("name", Value::from("ada")),
            ("age", Value::Int32(36)),
            (
                "a",
                Value::Array(vec![
                    doc(vec![("b", Value::Int32(1)), ("c", Value::Int32(1))]),
                    doc(vec![("b", Value::Int32(2)), ("c", Value::Int32(2))]),
                ]),
            ),
            ("tags", Value::from(vec![1i32, 2, 3])),
        ])
    }

    fn matches(path: &str, constraint: PathConstraint) -> bool {
        constraint.matches_document(&sample(), path)
    }

    #[test]
    fn equality_and_ranges() {
        assert!(matches("age", PathConstraint::Eq(Value::Int32(36))));
        assert!(matches("age", PathConstraint::Eq(Value::Double(36.0))));
        assert!(matches("age", PathConstraint::Gt(Value::Int32(35))));
        assert!(!matches("age", PathConstraint::Gt(Value::Int32(36))));
        assert!(matches("age", PathConstraint::Gte(Value::Int32(36))));
        assert!(matches(
            "age",
            PathConstraint::Range {
                lo: Value::Int32(30),
                lo_incl: true,
                hi: Value::Int32(36),
                hi_incl: true,
            }
        ));
        // Type bracketing: a string never satisfies a numeric range.
        assert!(!matches("name", PathConstraint::Gt(Value::Int32(0))));
    }

    #[test]
    fn multikey_paths_match_any_element() {
        assert!(matches("tags", PathConstraint::Eq(Value::Int32(2))));
        assert!(matches("a.b", PathConstraint::Eq(Value::Int32(2))));
        assert!(!matches("a.b", PathConstraint::Eq(Value::Int32(3))));
        assert!(matches(
            "tags",
            PathConstraint::In(vec![Value::Int32(9), Value::Int32(3)])
        ));
    }

    #[test]
    fn ne_quantifies_over_all_elements() {
        // Some element equals 2, so $ne: 2 must not match.
        assert!(!matches("tags", PathConstraint::Ne(Value::Int32(2))));
        assert!(matches("tags", PathConstraint::Ne(Value::Int32(9))));
    }

    #[test]
    fn exists_semantics() {
        assert!(matches("age", PathConstraint::Exists(true)));
        assert!(matches("missing", PathConstraint::Exists(false)));
        assert!(!matches("age", PathConstraint::Exists(false)));
    }

    #[test]
    fn elem_match_requires_one_element_satisfying_all() {
        // {b:1, c:2} spans two different elements: must not match.
        let cross = PathConstraint::ElemMatch(vec![
            ("b".into(), PathConstraint::Eq(Value::Int32(1))),
            ("c".into(), PathConstraint::Eq(Value::Int32(2))),
        ]);
        assert!(!matches("a", cross));

        let aligned = PathConstraint::ElemMatch(vec![
            ("b".into(), PathConstraint::Eq(Value::Int32(2))),
            ("c".into(), PathConstraint::Eq(Value::Int32(2))),
        ]);
        assert!(matches("a", aligned));
    }

    #[test]
    fn predicate_replaces_per_path() {
        let q = QueryPredicate::new()
            .with("a", PathConstraint::Eq(Value::Int32(1)))
            .with("a", PathConstraint::Eq(Value::Int32(2)));
        assert_eq!(q.get("a"), Some(&PathConstraint::Eq(Value::Int32(2))));
        assert_eq!(q.iter().count(), 1);
    }

    #[test]
    fn recheck_predicate_evaluates_original_constraint() {
        let recheck = RecheckPredicate {
            path: "a.b".into(),
            constraint: PathConstraint::Gt(Value::Int32(1)),
            reason: RecheckReason::CorrelatedConjunction,
        };
        assert!(recheck.evaluate(&sample()));
    }
}
