//! Multi-key composite term generation.
//!
//! Given one document and a composite index spec, produce the set of
//! composite rows (one index term per path slot) to store. Arrays fan the
//! generation out, but how they fan out is the whole game:
//!
//! - Paths that share an array ancestor are *correlated*: each element of
//!   that array contributes one row pairing the element's own sub-values.
//!   `a = [{b:1,c:1},{b:2,c:2}]` indexed on `[a.b, a.c]` yields the rows
//!   `(1,1)` and `(2,2)`, never the cross pairs.
//! - Paths with no shared array ancestor are *independent* and take the full
//!   cross-product of their individual expansions.
//!
//! The expansion walks the document once with the whole path set: paths split
//! into independent groups at document fields and stay together through array
//! elements, which yields exactly the correlated pairing without ever
//! materializing a cross-product to filter back down.
//!
//! A path missing from one array element (partial presence) fills its slot
//! with the `Undefined` sentinel rather than dropping the row, so uniqueness
//! and equality matching stay sound. Identical rows from duplicate array
//! elements deduplicate. Shapes the expansion cannot interpret (nested
//! arrays mid-path, arrays mixing scalars and documents under correlated
//! paths) set an ambiguity flag that forces query-time recheck; they never
//! fail the write.

use std::collections::{BTreeSet, HashSet};

use docket_codec::{encode_term, serialize_composite, IndexTerm, Value};
use tracing::debug;

use crate::path::segments;
use crate::spec::CompositeIndexSpec;

/// One generated composite row: one term per index path, in slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeRow {
    terms: Vec<IndexTerm>,
}

impl CompositeRow {
    /// The member terms in scan-key slot order.
    pub fn terms(&self) -> &[IndexTerm] {
        &self.terms
    }

    /// Whether any member term is truncated.
    pub fn is_truncated(&self) -> bool {
        self.terms.iter().any(IndexTerm::is_truncated)
    }

    /// Serialize to the storable composite blob.
    pub fn serialize(&self) -> Vec<u8> {
        serialize_composite(&self.terms)
    }
}

/// Which paths traversed arrays and which travelled through a shared one.
///
/// Persisted by the write path alongside the index (the catalog's multi-key
/// metadata) and handed back to the bounds engine at query compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultikeyMetadata {
    multikey_paths: Vec<bool>,
    correlated_groups: Vec<Vec<usize>>,
    has_truncation: bool,
    ambiguous: bool,
}

impl MultikeyMetadata {
    /// Whether the path at `slot` traversed at least one array.
    pub fn is_multikey(&self, slot: usize) -> bool {
        self.multikey_paths.get(slot).copied().unwrap_or(false)
    }

    /// Whether any path traversed an array.
    pub fn any_multikey(&self) -> bool {
        self.multikey_paths.iter().any(|&m| m)
    }

    /// Groups of slots that shared an array ancestor, each sorted ascending.
    pub fn correlated_groups(&self) -> &[Vec<usize>] {
        &self.correlated_groups
    }

    /// The correlated group containing `slot`, if any.
    pub fn group_of(&self, slot: usize) -> Option<&[usize]> {
        self.correlated_groups
            .iter()
            .find(|g| g.contains(&slot))
            .map(Vec::as_slice)
    }

    /// Whether two slots proved co-occurring (shared an array ancestor).
    pub fn are_correlated(&self, a: usize, b: usize) -> bool {
        self.group_of(a).is_some_and(|g| g.contains(&b))
    }

    /// Whether any generated term was truncated.
    pub fn has_truncation(&self) -> bool {
        self.has_truncation
    }

    /// Whether the document shape defeated correlation analysis. Queries
    /// conjoining paths of an ambiguous index must recheck.
    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    /// Merge metadata observed across many documents (index-wide state).
    pub fn merge(&mut self, other: &MultikeyMetadata) {
        if self.multikey_paths.len() < other.multikey_paths.len() {
            self.multikey_paths.resize(other.multikey_paths.len(), false);
        }
        for (slot, &m) in other.multikey_paths.iter().enumerate() {
            self.multikey_paths[slot] = self.multikey_paths[slot] || m;
        }
        let mut groups: BTreeSet<Vec<usize>> =
            self.correlated_groups.iter().cloned().collect();
        groups.extend(other.correlated_groups.iter().cloned());
        self.correlated_groups = groups.into_iter().collect();
        self.has_truncation |= other.has_truncation;
        self.ambiguous |= other.ambiguous;
    }
}

/// The output of one document's term generation.
#[derive(Debug, Clone)]
pub struct GeneratedTerms {
    rows: Vec<CompositeRow>,
    metadata: MultikeyMetadata,
}

impl GeneratedTerms {
    /// The deduplicated composite rows to store.
    pub fn rows(&self) -> &[CompositeRow] {
        &self.rows
    }

    /// Multi-key metadata observed while generating.
    pub fn multikey_metadata(&self) -> &MultikeyMetadata {
        &self.metadata
    }
}

/// Generate the composite index rows for one document.
pub fn generate_terms(document: &Value, spec: &CompositeIndexSpec) -> GeneratedTerms {
    let mut expansion = Expansion {
        multikey: vec![false; spec.len()],
        groups: BTreeSet::new(),
        ambiguous: false,
    };

    let paths: Vec<(usize, Vec<&str>)> = spec
        .paths()
        .iter()
        .enumerate()
        .map(|(slot, p)| (slot, segments(&p.path)))
        .collect();
    let borrowed: Vec<(usize, &[&str])> = paths
        .iter()
        .map(|(slot, segs)| (*slot, segs.as_slice()))
        .collect();

    let fragments = expansion.expand(document, &borrowed);

    let mut rows = Vec::new();
    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    let mut has_truncation = false;
    for fragment in fragments {
        let mut slots: Vec<Value> = vec![Value::Undefined; spec.len()];
        for (slot, value) in fragment {
            slots[slot] = value;
        }
        let terms: Vec<IndexTerm> = slots
            .iter()
            .zip(spec.paths())
            .map(|(value, path_spec)| {
                encode_term(
                    value,
                    path_spec.order.is_descending(),
                    path_spec.truncation_limit,
                )
            })
            .collect();
        has_truncation |= terms.iter().any(IndexTerm::is_truncated);

        // Dedup on flags + payload only: equal numbers of different widths
        // are one logical key even though their type bits differ.
        let mut key = Vec::new();
        for term in &terms {
            key.push(u8::from(term.is_truncated()));
            key.extend_from_slice(&(term.payload().len() as u32).to_be_bytes());
            key.extend_from_slice(term.payload());
        }
        if seen.insert(key) {
            rows.push(CompositeRow { terms });
        }
    }

    let metadata = MultikeyMetadata {
        multikey_paths: expansion.multikey,
        correlated_groups: expansion.groups.into_iter().collect(),
        has_truncation,
        ambiguous: expansion.ambiguous,
    };
    debug!(
        rows = rows.len(),
        multikey = metadata.any_multikey(),
        ambiguous = metadata.is_ambiguous(),
        truncated = metadata.has_truncation(),
        "generated composite terms"
    );
    GeneratedTerms { rows, metadata }
}

struct Expansion {
    multikey: Vec<bool>,
    groups: BTreeSet<Vec<usize>>,
    ambiguous: bool,
}

/// A partial row: `(slot, value)` assignments produced by one path subset.
type Fragment = Vec<(usize, Value)>;

impl Expansion {
    /// Expand a value against a set of paths, each given as its slot and the
    /// path segments still to be resolved.
    fn expand(&mut self, value: &Value, paths: &[(usize, &[&str])]) -> Vec<Fragment> {
        if paths.is_empty() {
            return vec![Vec::new()];
        }
        match value {
            Value::Array(items) => self.expand_array(items, paths),
            Value::Document(_) => self.expand_document(value, paths),
            _ => vec![Self::leaf_fragment(value, paths)],
        }
    }

    /// Document fields vary independently: paths split into groups by their
    /// next segment and the groups' expansions cross-product.
    fn expand_document(&mut self, value: &Value, paths: &[(usize, &[&str])]) -> Vec<Fragment> {
        let mut finished: Fragment = Vec::new();
        let mut by_field: Vec<(&str, Vec<(usize, &[&str])>)> = Vec::new();
        for &(slot, remaining) in paths {
            match remaining.split_first() {
                None => finished.push((slot, value.clone())),
                Some((head, rest)) => match by_field.iter_mut().find(|(h, _)| h == head) {
                    Some((_, group)) => group.push((slot, rest)),
                    None => by_field.push((head, vec![(slot, rest)])),
                },
            }
        }

        let mut out = vec![finished];
        for (field, group) in by_field {
            let sub = match value.get(field) {
                Some(field_value) => self.expand(field_value, &group),
                // Missing field: every path in the group is absent here.
                None => vec![group
                    .iter()
                    .map(|&(slot, _)| (slot, Value::Undefined))
                    .collect()],
            };
            out = cross_product(out, sub);
        }
        out
    }

    /// Array elements pair all paths in the set per element: this is where
    /// correlation happens. Every path in the set becomes multi-key and, if
    /// there are two or more, they form a correlated group.
    fn expand_array(&mut self, items: &[Value], paths: &[(usize, &[&str])]) -> Vec<Fragment> {
        for &(slot, _) in paths {
            self.multikey[slot] = true;
        }
        if paths.len() >= 2 {
            let mut group: Vec<usize> = paths.iter().map(|&(slot, _)| slot).collect();
            group.sort_unstable();
            self.groups.insert(group);
        }

        if items.is_empty() {
            // An empty array indexes as a single absent row.
            return vec![paths
                .iter()
                .map(|&(slot, _)| (slot, Value::Undefined))
                .collect()];
        }

        let descends = paths.iter().any(|&(_, remaining)| !remaining.is_empty());
        let mut saw_document = false;
        let mut saw_other = false;

        let mut fragments = Vec::new();
        for item in items {
            match item {
                Value::Document(_) => {
                    saw_document = true;
                    fragments.extend(self.expand(item, paths));
                }
                Value::Array(_) => {
                    // A nested array where the path expects a document is a
                    // shape correlation analysis cannot interpret.
                    saw_other = true;
                    if descends {
                        self.ambiguous = true;
                    }
                    fragments.push(Self::leaf_fragment(item, paths));
                }
                _ => {
                    saw_other = true;
                    fragments.push(Self::leaf_fragment(item, paths));
                }
            }
        }
        if descends && saw_document && saw_other {
            self.ambiguous = true;
        }
        fragments
    }

    /// A scalar (or opaque) value: finished paths take it as their slot
    /// value, paths expecting further descent are absent.
    fn leaf_fragment(value: &Value, paths: &[(usize, &[&str])]) -> Fragment {
        paths
            .iter()
            .map(|&(slot, remaining)| {
                if remaining.is_empty() {
                    (slot, value.clone())
                } else {
                    (slot, Value::Undefined)
                }
            })
            .collect()
    }
}

fn cross_product(lhs: Vec<Fragment>, rhs: Vec<Fragment>) -> Vec<Fragment> {
    let mut out = Vec::with_capacity(lhs.len() * rhs.len());
    for left in &lhs {
        for right in &rhs {
            let mut row = left.clone();
            row.extend(right.iter().cloned());
            out.push(row);
        }
    }
    out
}
