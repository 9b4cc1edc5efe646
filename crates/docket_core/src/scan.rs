//! Scan range permutation and merge.
//!
//! A query leaves each slot with one or more disjoint bound alternatives
//! (`$in` fans out). The physical index walks one contiguous range at a
//! time, so the alternatives must be combined into an ordered list of fully
//! resolved scan ranges:
//!
//! - alternatives on independent slots permute (mixed-radix enumeration over
//!   the per-slot counts);
//! - alternatives on slots sharing a multi-key array ancestor do not: their
//!   lists merge pairwise in generation order, the shorter list reusing its
//!   last entry, because cross-pairing values drawn from different array
//!   elements would scan combinations no single element can produce;
//! - a descending query flips the scan direction: lower/upper pick swapped
//!   per slot and ranges emitted in reverse, so the output stream is in
//!   physical visit order.

use docket_codec::{serialize_composite, IndexTerm};
use tracing::debug;

use crate::bounds::{compute_bounds, CompositeIndexBounds, VariableIndexBounds};
use crate::error::CoreResult;
use crate::generate::MultikeyMetadata;
use crate::query::{QueryPredicate, RecheckPredicate};
use crate::spec::CompositeIndexSpec;

/// One fully resolved physical scan range.
#[derive(Debug, Clone)]
pub struct CompositeScanRange {
    /// Per-slot bounds, in scan-key slot order.
    pub bounds: Vec<CompositeIndexBounds>,
    /// Per-slot terms the physical scan starts from (the first composite key
    /// the access method seeks to).
    pub scan_start: Vec<IndexTerm>,
    /// Whether every slot is an equality bound (point lookup).
    pub is_point_lookup: bool,
    /// Whether candidate rows from this range need the full document.
    pub requires_runtime_recheck: bool,
    /// Predicates to re-evaluate when rechecking, in slot order.
    pub recheck_predicates: Vec<RecheckPredicate>,
}

impl CompositeScanRange {
    /// The serialized composite form of the scan start key.
    pub fn scan_start_blob(&self) -> Vec<u8> {
        serialize_composite(&self.scan_start)
    }
}

/// Summary of a planned query against one composite index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeQueryMetaInfo {
    /// Number of scan-key slots in the index.
    pub num_index_paths: usize,
    /// Number of physical scan ranges to visit.
    pub num_scan_ranges: usize,
    /// Whether any bound term anywhere is truncated.
    pub has_truncation: bool,
    /// The first slot whose bound is truncated, if any.
    pub truncation_path: Option<usize>,
    /// Whether any range needs document recheck.
    pub requires_runtime_recheck: bool,
    /// Whether the physical scan runs backward relative to storage order.
    pub is_backward_scan: bool,
}

/// Everything the access method needs to execute one query.
#[derive(Debug, Clone)]
pub struct CompositeQueryRunData {
    /// Plan summary.
    pub meta: CompositeQueryMetaInfo,
    /// The scan ranges, in physical visit order.
    pub ranges: Vec<CompositeScanRange>,
}

/// Plan a query: compute bounds, permute/merge the alternatives, and resolve
/// scan-start keys. `descending_scan` requests result order opposite to the
/// index's storage order.
pub fn plan_query(
    predicate: &QueryPredicate,
    spec: &CompositeIndexSpec,
    metadata: &MultikeyMetadata,
    descending_scan: bool,
) -> CoreResult<CompositeQueryRunData> {
    let variable = compute_bounds(predicate, spec, metadata)?;
    let clusters = build_clusters(spec, metadata);

    // A slot with no alternatives (an empty $in) makes the conjunction
    // unsatisfiable: nothing to scan.
    let satisfiable = variable.sets.iter().all(|s| !s.bounds.is_empty());
    let total: usize = if satisfiable {
        clusters
            .iter()
            .map(|c| c.alternative_count(&variable))
            .product()
    } else {
        0
    };

    let mut ranges = Vec::with_capacity(total);
    for permutation in 0..total {
        ranges.push(resolve_range(
            &variable,
            &clusters,
            permutation,
            spec,
            descending_scan,
        ));
    }
    if descending_scan {
        ranges.reverse();
    }

    let has_truncation = ranges
        .iter()
        .any(|r| r.bounds.iter().any(|b| b.has_truncated_bound()));
    let truncation_path = ranges
        .iter()
        .flat_map(|r| r.bounds.iter())
        .find(|b| b.has_truncated_bound())
        .map(|b| b.path_index);
    let requires_runtime_recheck = ranges.iter().any(|r| r.requires_runtime_recheck);

    let meta = CompositeQueryMetaInfo {
        num_index_paths: spec.len(),
        num_scan_ranges: ranges.len(),
        has_truncation,
        truncation_path,
        requires_runtime_recheck,
        is_backward_scan: descending_scan,
    };
    debug!(
        ranges = meta.num_scan_ranges,
        recheck = meta.requires_runtime_recheck,
        backward = meta.is_backward_scan,
        "planned composite query"
    );
    Ok(CompositeQueryRunData { meta, ranges })
}

/// A permutation unit: one slot, or a run of slots whose alternatives merge
/// pairwise instead of permuting.
struct Cluster {
    slots: Vec<usize>,
}

impl Cluster {
    /// Alternatives contributed to the permutation: the longest member list.
    fn alternative_count(&self, variable: &VariableIndexBounds) -> usize {
        self.slots
            .iter()
            .map(|&slot| variable.sets[slot].bounds.len())
            .max()
            .unwrap_or(1)
    }
}

/// Group the slots: each correlated group forms one cluster, every other
/// slot stands alone. Correlated slots are adjacent by spec validation, so
/// clusters preserve slot order.
fn build_clusters(spec: &CompositeIndexSpec, metadata: &MultikeyMetadata) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for slot in 0..spec.len() {
        if let Some(group) = metadata.group_of(slot) {
            if group.first() == Some(&slot) {
                clusters.push(Cluster {
                    slots: group.to_vec(),
                });
            }
            // Non-leading members were added with their group.
        } else {
            clusters.push(Cluster { slots: vec![slot] });
        }
    }
    clusters
}

fn resolve_range(
    variable: &VariableIndexBounds,
    clusters: &[Cluster],
    permutation: usize,
    spec: &CompositeIndexSpec,
    descending_scan: bool,
) -> CompositeScanRange {
    let mut chosen: Vec<Option<&CompositeIndexBounds>> = vec![None; spec.len()];
    let mut remaining = permutation;
    for cluster in clusters {
        let count = cluster.alternative_count(variable);
        let index = remaining % count;
        remaining /= count;
        for &slot in &cluster.slots {
            let alternatives = &variable.sets[slot].bounds;
            // The shorter correlated list reuses its last alternative.
            let pick = index.min(alternatives.len() - 1);
            chosen[slot] = Some(&alternatives[pick]);
        }
    }

    let mut bounds = Vec::with_capacity(spec.len());
    let mut scan_start = Vec::with_capacity(spec.len());
    let mut recheck_predicates = Vec::new();
    for (slot, choice) in chosen.iter().enumerate() {
        // Every slot is covered by exactly one cluster.
        let bound = match choice {
            Some(bound) => (*bound).clone(),
            None => variable.sets[slot].bounds[0].clone(),
        };
        // A forward scan over an ascending path starts at the lower bound;
        // a descending path stores complemented payloads, so its physical
        // start is the value upper bound. A backward scan swaps both.
        let path_descending = spec.paths()[slot].order.is_descending();
        let start_is_upper = path_descending != descending_scan;
        let start = if start_is_upper {
            bound.upper.term.clone()
        } else {
            bound.lower.term.clone()
        };
        scan_start.push(start);
        recheck_predicates.extend(bound.recheck_predicates.iter().cloned());
        bounds.push(bound);
    }

    CompositeScanRange {
        is_point_lookup: bounds.iter().all(|b| b.is_equality_bound),
        requires_runtime_recheck: bounds.iter().any(|b| b.requires_runtime_recheck),
        bounds,
        scan_start,
        recheck_predicates,
    }
}
