//! Composite bounds computation.
//!
//! Turns the per-path constraints of a query into per-slot scan bounds.
//! Every indexed path gets at least the full range; operators that a single
//! contiguous range cannot express keep the full range and add a recheck
//! predicate instead, so the scan over-approximates and the storage layer
//! filters. Open ranges are type-bracketed: `$gt: 5` scans to the top of the
//! numeric bracket, not to `MaxKey`.
//!
//! `$in` produces several disjoint alternatives for one slot; those are left
//! as a multi-bound set here and permuted into physical scan ranges by
//! [`crate::scan`].

use std::cmp::Ordering;

use docket_codec::{compare_values, encode_term, type_rank, IndexTerm, Value};
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::generate::MultikeyMetadata;
use crate::query::{PathConstraint, QueryPredicate, RecheckPredicate, RecheckReason};
use crate::spec::{CompositeIndexSpec, IndexPathSpec};

/// One side (lower or upper) of a range restriction on one path.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSingleBound {
    /// The bound value.
    pub value: Value,
    /// Whether the bound itself is part of the range.
    pub inclusive: bool,
    /// The encoded term, carrying the truncated flag if the bound value
    /// exceeded the path's term size limit.
    pub term: IndexTerm,
}

impl CompositeSingleBound {
    fn new(value: Value, inclusive: bool, spec: &IndexPathSpec) -> Self {
        let term = encode_term(&value, spec.order.is_descending(), spec.truncation_limit);
        Self {
            value,
            inclusive,
            term,
        }
    }
}

/// The resolved bounds for one path slot.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeIndexBounds {
    /// Scan-key slot this restriction applies to.
    pub path_index: usize,
    /// Lower bound.
    pub lower: CompositeSingleBound,
    /// Upper bound.
    pub upper: CompositeSingleBound,
    /// Whether lower and upper pin a single value.
    pub is_equality_bound: bool,
    /// Whether matches in this range still need the full document.
    pub requires_runtime_recheck: bool,
    /// The predicates to re-evaluate when rechecking.
    pub recheck_predicates: Vec<RecheckPredicate>,
}

impl CompositeIndexBounds {
    fn full_range(path_index: usize, spec: &IndexPathSpec) -> Self {
        Self {
            path_index,
            lower: CompositeSingleBound::new(Value::MinKey, true, spec),
            upper: CompositeSingleBound::new(Value::MaxKey, true, spec),
            is_equality_bound: false,
            requires_runtime_recheck: false,
            recheck_predicates: Vec::new(),
        }
    }

    fn equality(path_index: usize, value: Value, spec: &IndexPathSpec) -> Self {
        Self {
            path_index,
            lower: CompositeSingleBound::new(value.clone(), true, spec),
            upper: CompositeSingleBound::new(value, true, spec),
            is_equality_bound: true,
            requires_runtime_recheck: false,
            recheck_predicates: Vec::new(),
        }
    }

    fn range(
        path_index: usize,
        lower: (Value, bool),
        upper: (Value, bool),
        spec: &IndexPathSpec,
    ) -> Self {
        Self {
            path_index,
            lower: CompositeSingleBound::new(lower.0, lower.1, spec),
            upper: CompositeSingleBound::new(upper.0, upper.1, spec),
            is_equality_bound: false,
            requires_runtime_recheck: false,
            recheck_predicates: Vec::new(),
        }
    }

    fn add_recheck(&mut self, predicate: RecheckPredicate) {
        self.requires_runtime_recheck = true;
        self.recheck_predicates.push(predicate);
    }

    /// Whether either bound term is truncated.
    pub fn has_truncated_bound(&self) -> bool {
        self.lower.term.is_truncated() || self.upper.term.is_truncated()
    }

    /// Whether either bound term carries an approximate payload.
    pub fn has_inexact_bound(&self) -> bool {
        self.lower.term.is_inexact() || self.upper.term.is_inexact()
    }
}

/// All disjoint bound alternatives for one path slot (`$in` yields several).
#[derive(Debug, Clone)]
pub struct CompositeIndexBoundsSet {
    /// The slot these alternatives restrict.
    pub path_index: usize,
    /// One or more disjoint ranges, in scan order.
    pub bounds: Vec<CompositeIndexBounds>,
}

/// Per-slot bound sets for a whole query, pre-permutation.
#[derive(Debug, Clone)]
pub struct VariableIndexBounds {
    /// One set per scan-key slot, in slot order.
    pub sets: Vec<CompositeIndexBoundsSet>,
}

impl VariableIndexBounds {
    /// Whether any alternative of any slot needs a recheck.
    pub fn requires_runtime_recheck(&self) -> bool {
        self.sets
            .iter()
            .flat_map(|s| &s.bounds)
            .any(|b| b.requires_runtime_recheck)
    }
}

/// The smallest value of the type bracket with the given rank.
fn bracket_min(rank: u8) -> Value {
    match rank {
        0 => Value::MinKey,
        1 => Value::Undefined,
        2 => Value::Null,
        3 => Value::Double(f64::NEG_INFINITY),
        4 => Value::String(String::new()),
        5 => Value::Document(Vec::new()),
        6 => Value::Array(Vec::new()),
        7 => Value::Binary {
            subtype: 0,
            bytes: Vec::new(),
        },
        8 => Value::ObjectId([0; 12]),
        9 => Value::Bool(false),
        10 => Value::Date(i64::MIN),
        11 => Value::Timestamp {
            time: 0,
            increment: 0,
        },
        12 => Value::Regex {
            pattern: String::new(),
            options: String::new(),
        },
        _ => Value::MaxKey,
    }
}

/// The upper edge of a value's type bracket: the next bracket's minimum,
/// exclusive (or `MaxKey` inclusive at the top).
fn bracket_upper(value: &Value) -> (Value, bool) {
    let rank = type_rank(value);
    if rank >= 13 {
        (Value::MaxKey, true)
    } else {
        (bracket_min(rank + 1), false)
    }
}

/// The lower edge of a value's type bracket, inclusive.
fn bracket_lower(value: &Value) -> (Value, bool) {
    (bracket_min(type_rank(value)), true)
}

/// Compute the per-slot bound sets for a query.
///
/// `metadata` is the index's accumulated multi-key metadata (which paths
/// traversed arrays, which shared one); it decides whether conjunctions
/// across paths are provable per-row or must go to recheck.
pub fn compute_bounds(
    predicate: &QueryPredicate,
    spec: &CompositeIndexSpec,
    metadata: &MultikeyMetadata,
) -> CoreResult<VariableIndexBounds> {
    // Cluster id marks constraints proven co-occurring by one $elemMatch.
    let mut effective: Vec<Option<(PathConstraint, Option<usize>)>> = vec![None; spec.len()];
    let mut forced_recheck: Vec<Vec<RecheckPredicate>> = vec![Vec::new(); spec.len()];
    let mut next_cluster = 0usize;

    for (path, constraint) in predicate.iter() {
        if let Some(slot) = spec.slot_of(path) {
            effective[slot] = Some((constraint.clone(), None));
            continue;
        }
        if let PathConstraint::ElemMatch(subs) = constraint {
            resolve_elem_match(
                path,
                constraint,
                subs,
                spec,
                metadata,
                &mut effective,
                &mut forced_recheck,
                &mut next_cluster,
            )?;
            continue;
        }
        return Err(CoreError::unbound_path(path));
    }

    let mut sets = Vec::with_capacity(spec.len());
    for (slot, path_spec) in spec.paths().iter().enumerate() {
        let mut bounds = match &effective[slot] {
            None => vec![CompositeIndexBounds::full_range(slot, path_spec)],
            Some((constraint, _)) => slot_bounds(slot, constraint, path_spec),
        };
        for bound in &mut bounds {
            if let Some((constraint, _)) = &effective[slot] {
                if bound.has_truncated_bound() {
                    bound.add_recheck(RecheckPredicate {
                        path: path_spec.path.clone(),
                        constraint: constraint.clone(),
                        reason: RecheckReason::TruncatedBound,
                    });
                } else if bound.has_inexact_bound() {
                    // An approximate edge could exclude values it should
                    // not: widen it and let the document decide.
                    if bound.lower.term.is_inexact() {
                        bound.lower.inclusive = true;
                    }
                    if bound.upper.term.is_inexact() {
                        bound.upper.inclusive = true;
                    }
                    bound.add_recheck(RecheckPredicate {
                        path: path_spec.path.clone(),
                        constraint: constraint.clone(),
                        reason: RecheckReason::InexactBound,
                    });
                }
                if matches!(constraint, PathConstraint::Exists(false))
                    && (metadata.is_multikey(slot) || metadata.is_ambiguous())
                {
                    // Partial-presence rows store the absent sentinel for
                    // elements missing only this subpath; the bound cannot
                    // tell them from a truly absent path.
                    bound.add_recheck(RecheckPredicate {
                        path: path_spec.path.clone(),
                        constraint: constraint.clone(),
                        reason: RecheckReason::PartialPresence,
                    });
                }
            }
            for predicate in &forced_recheck[slot] {
                bound.add_recheck(predicate.clone());
            }
        }
        sets.push(CompositeIndexBoundsSet {
            path_index: slot,
            bounds,
        });
    }

    apply_correlation_recheck(spec, metadata, &effective, &mut sets);

    trace!(
        paths = spec.len(),
        recheck = sets
            .iter()
            .flat_map(|s| &s.bounds)
            .any(|b| b.requires_runtime_recheck),
        "computed composite bounds"
    );
    Ok(VariableIndexBounds { sets })
}

/// A conjunction over two or more constrained paths that share a multi-key
/// array ancestor is provable per-row only when every constraint came from
/// one `$elemMatch`; otherwise different array elements may each satisfy one
/// constraint while the stored rows pair per element and never show the
/// queried combination. Intersecting the bounds would then miss matches, so
/// only the first constrained slot of the group keeps its bounds; the rest
/// widen to the full range and carry their constraint as a recheck predicate.
fn apply_correlation_recheck(
    spec: &CompositeIndexSpec,
    metadata: &MultikeyMetadata,
    effective: &[Option<(PathConstraint, Option<usize>)>],
    sets: &mut [CompositeIndexBoundsSet],
) {
    let mut suspect_groups: Vec<Vec<usize>> = metadata
        .correlated_groups()
        .iter()
        .map(|g| {
            g.iter()
                .copied()
                .filter(|&slot| effective.get(slot).is_some_and(Option::is_some))
                .collect()
        })
        .collect();
    if metadata.is_ambiguous() {
        // Shape defeated correlation analysis: treat every constrained slot
        // as potentially co-resident in one array.
        suspect_groups.push(
            effective
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_some())
                .map(|(slot, _)| slot)
                .collect(),
        );
    }

    for group in suspect_groups {
        if group.len() < 2 {
            continue;
        }
        let clusters: Vec<Option<usize>> = group
            .iter()
            .map(|&slot| effective[slot].as_ref().and_then(|(_, c)| *c))
            .collect();
        let proven = clusters[0].is_some() && clusters.iter().all(|c| *c == clusters[0]);
        if proven && !metadata.is_ambiguous() {
            continue;
        }
        for &slot in &group[1..] {
            let Some((constraint, _)) = effective[slot].as_ref() else {
                continue;
            };
            let mut widened =
                CompositeIndexBounds::full_range(slot, &spec.paths()[slot]);
            widened.add_recheck(RecheckPredicate {
                path: spec.paths()[slot].path.clone(),
                constraint: constraint.clone(),
                reason: RecheckReason::CorrelatedConjunction,
            });
            sets[slot].bounds = vec![widened];
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_elem_match(
    path: &str,
    original: &PathConstraint,
    subs: &[(String, PathConstraint)],
    spec: &CompositeIndexSpec,
    metadata: &MultikeyMetadata,
    effective: &mut [Option<(PathConstraint, Option<usize>)>],
    forced_recheck: &mut [Vec<RecheckPredicate>],
    next_cluster: &mut usize,
) -> CoreResult<()> {
    let mut mapped: Vec<(usize, &PathConstraint)> = Vec::new();
    let mut all_mapped = true;
    for (subpath, sub_constraint) in subs {
        match spec.slot_of(&format!("{path}.{subpath}")) {
            Some(slot) => mapped.push((slot, sub_constraint)),
            None => all_mapped = false,
        }
    }
    if mapped.is_empty() {
        return Err(CoreError::unbound_path(path));
    }

    let slots: Vec<usize> = mapped.iter().map(|(slot, _)| *slot).collect();
    let provable = all_mapped
        && !metadata.is_ambiguous()
        && slots.iter().all(|&s| metadata.is_multikey(s))
        && (slots.len() == 1
            || slots
                .iter()
                .all(|&s| metadata.are_correlated(slots[0], s)));

    if provable {
        // Co-occurrence is guaranteed by the shared array ancestor: each
        // sub-constraint pushes down as a plain bound on its own slot.
        let cluster = *next_cluster;
        *next_cluster += 1;
        for (slot, sub_constraint) in mapped {
            effective[slot] = Some(((*sub_constraint).clone(), Some(cluster)));
        }
    } else {
        // Not provable per-row: scan the mapped slots wide and recheck the
        // whole $elemMatch against the document.
        forced_recheck[slots[0]].push(RecheckPredicate {
            path: path.to_string(),
            constraint: original.clone(),
            reason: RecheckReason::ElemMatch,
        });
    }
    Ok(())
}

/// Bounds for a single slot's constraint. Multiple entries only for `$in`.
fn slot_bounds(
    slot: usize,
    constraint: &PathConstraint,
    spec: &IndexPathSpec,
) -> Vec<CompositeIndexBounds> {
    let range_pushable = spec.ordered;
    match constraint {
        PathConstraint::Eq(v) => vec![CompositeIndexBounds::equality(slot, v.clone(), spec)],

        PathConstraint::In(values) => {
            let mut sorted: Vec<&Value> = values.iter().collect();
            sorted.sort_by(|a, b| compare_values(a, b));
            sorted.dedup_by(|a, b| compare_values(a, b) == Ordering::Equal);
            sorted
                .into_iter()
                .map(|v| CompositeIndexBounds::equality(slot, v.clone(), spec))
                .collect()
        }

        PathConstraint::Gt(v) | PathConstraint::Gte(v) if range_pushable => {
            let inclusive = matches!(constraint, PathConstraint::Gte(_));
            vec![CompositeIndexBounds::range(
                slot,
                (v.clone(), inclusive),
                bracket_upper(v),
                spec,
            )]
        }

        PathConstraint::Lt(v) | PathConstraint::Lte(v) if range_pushable => {
            let inclusive = matches!(constraint, PathConstraint::Lte(_));
            vec![CompositeIndexBounds::range(
                slot,
                bracket_lower(v),
                (v.clone(), inclusive),
                spec,
            )]
        }

        PathConstraint::Range {
            lo,
            lo_incl,
            hi,
            hi_incl,
        } if range_pushable => vec![CompositeIndexBounds::range(
            slot,
            (lo.clone(), *lo_incl),
            (hi.clone(), *hi_incl),
            spec,
        )],

        PathConstraint::Gt(_)
        | PathConstraint::Gte(_)
        | PathConstraint::Lt(_)
        | PathConstraint::Lte(_)
        | PathConstraint::Range { .. } => {
            // Equality-only path: the range cannot push down.
            let mut bound = CompositeIndexBounds::full_range(slot, spec);
            bound.add_recheck(RecheckPredicate {
                path: spec.path.clone(),
                constraint: constraint.clone(),
                reason: RecheckReason::UnorderedPath,
            });
            vec![bound]
        }

        PathConstraint::Ne(_) => {
            // Two-sided exclusion is not one contiguous range.
            let mut bound = CompositeIndexBounds::full_range(slot, spec);
            bound.add_recheck(RecheckPredicate {
                path: spec.path.clone(),
                constraint: constraint.clone(),
                reason: RecheckReason::NotRepresentable,
            });
            vec![bound]
        }

        PathConstraint::Exists(false) => {
            // Absent paths index as the undefined sentinel.
            vec![CompositeIndexBounds::equality(slot, Value::Undefined, spec)]
        }

        PathConstraint::Exists(true) => {
            // One range cannot carve the undefined slot out of the middle.
            let mut bound = CompositeIndexBounds::full_range(slot, spec);
            bound.add_recheck(RecheckPredicate {
                path: spec.path.clone(),
                constraint: constraint.clone(),
                reason: RecheckReason::NotRepresentable,
            });
            vec![bound]
        }

        PathConstraint::ElemMatch(_) => {
            // $elemMatch directly on an indexed path: the row carries one
            // element, match it wide and recheck.
            let mut bound = CompositeIndexBounds::full_range(slot, spec);
            bound.add_recheck(RecheckPredicate {
                path: spec.path.clone(),
                constraint: constraint.clone(),
                reason: RecheckReason::ElemMatch,
            });
            vec![bound]
        }
    }
}
