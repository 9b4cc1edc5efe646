//! Composite index definitions.
//!
//! An index definition is plain data supplied by the catalog at
//! index-creation time and immutable for the index lifetime; changing any of
//! it means a rebuild. Validation happens once, up front, so the write and
//! query paths can trust the spec unconditionally.

use crate::error::{CoreError, CoreResult};
use crate::path::common_prefix;

/// Hard cap on the number of paths in one composite index.
pub const MAX_INDEX_PATHS: usize = 32;

/// Sort direction of one index path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending storage order.
    #[default]
    Ascending,
    /// Descending storage order (payloads stored complemented).
    Descending,
}

impl SortOrder {
    /// Whether terms on this path are encoded descending.
    pub fn is_descending(self) -> bool {
        matches!(self, SortOrder::Descending)
    }
}

/// One entry of a composite index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPathSpec {
    /// Dotted document path, e.g. `"a.b"`.
    pub path: String,
    /// Sort direction.
    pub order: SortOrder,
    /// Whether range queries are pushable on this path. Equality-only paths
    /// still index, but range constraints on them degrade to a full-range
    /// scan plus recheck.
    pub ordered: bool,
    /// Per-term payload size limit in bytes; `0` means unlimited.
    pub truncation_limit: u32,
}

impl IndexPathSpec {
    /// An ascending, range-pushable path with no truncation limit.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            order: SortOrder::Ascending,
            ordered: true,
            truncation_limit: 0,
        }
    }

    /// Sets descending sort order.
    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    /// Marks the path equality-only.
    pub fn equality_only(mut self) -> Self {
        self.ordered = false;
        self
    }

    /// Sets the truncation limit in bytes.
    pub fn truncation_limit(mut self, limit: u32) -> Self {
        self.truncation_limit = limit;
        self
    }
}

/// A validated composite index definition: the ordered list of indexed paths.
#[derive(Debug, Clone)]
pub struct CompositeIndexSpec {
    paths: Vec<IndexPathSpec>,
}

impl CompositeIndexSpec {
    /// Validates and wraps a path list.
    ///
    /// Rejects an empty list, more than [`MAX_INDEX_PATHS`] entries, empty or
    /// malformed dotted paths, duplicates, and orderings where paths sharing
    /// a dotted prefix are not adjacent. Adjacency matters because a shared
    /// prefix may resolve to an array, making the paths correlated, and
    /// correlated paths must occupy adjacent scan-key slots.
    pub fn new(paths: Vec<IndexPathSpec>) -> CoreResult<Self> {
        if paths.is_empty() {
            return Err(CoreError::invalid_spec("index must have at least one path"));
        }
        if paths.len() > MAX_INDEX_PATHS {
            return Err(CoreError::invalid_spec(format!(
                "index has {} paths, maximum is {MAX_INDEX_PATHS}",
                paths.len()
            )));
        }
        for spec in &paths {
            if spec.path.is_empty() || spec.path.split('.').any(str::is_empty) {
                return Err(CoreError::invalid_spec(format!(
                    "malformed path {:?}",
                    spec.path
                )));
            }
        }
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                if a.path == b.path {
                    return Err(CoreError::invalid_spec(format!(
                        "duplicate path {:?}",
                        a.path
                    )));
                }
            }
        }
        // Paths sharing a prefix must form a contiguous run.
        for (i, a) in paths.iter().enumerate() {
            for (j, b) in paths.iter().enumerate().skip(i + 2) {
                if common_prefix(&a.path, &b.path).is_some()
                    && paths[i + 1..j]
                        .iter()
                        .any(|mid| common_prefix(&a.path, &mid.path).is_none())
                {
                    return Err(CoreError::invalid_spec(format!(
                        "paths {:?} and {:?} share a prefix but are not adjacent",
                        a.path, b.path
                    )));
                }
            }
        }
        Ok(Self { paths })
    }

    /// The indexed paths in declared (scan-key slot) order.
    pub fn paths(&self) -> &[IndexPathSpec] {
        &self.paths
    }

    /// Number of indexed paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the spec is empty (never true for a validated spec).
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Slot index of an exactly matching path.
    pub fn slot_of(&self, path: &str) -> Option<usize> {
        self.paths.iter().position(|p| p.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let spec = IndexPathSpec::new("a.b");
        assert_eq!(spec.order, SortOrder::Ascending);
        assert!(spec.ordered);
        assert_eq!(spec.truncation_limit, 0);

        let spec = IndexPathSpec::new("a.b")
            .descending()
            .equality_only()
            .truncation_limit(128);
        assert!(spec.order.is_descending());
        assert!(!spec.ordered);
        assert_eq!(spec.truncation_limit, 128);
    }

    #[test]
    fn rejects_bad_specs() {
        assert!(CompositeIndexSpec::new(vec![]).is_err());
        assert!(CompositeIndexSpec::new(vec![IndexPathSpec::new("")]).is_err());
        assert!(CompositeIndexSpec::new(vec![IndexPathSpec::new("a..b")]).is_err());
        assert!(CompositeIndexSpec::new(vec![
            IndexPathSpec::new("a"),
            IndexPathSpec::new("a"),
        ])
        .is_err());
        let too_many = (0..33).map(|i| IndexPathSpec::new(format!("p{i}"))).collect();
        assert!(CompositeIndexSpec::new(too_many).is_err());
    }

    #[test]
    fn rejects_split_prefix_groups() {
        assert!(CompositeIndexSpec::new(vec![
            IndexPathSpec::new("a.b"),
            IndexPathSpec::new("x"),
            IndexPathSpec::new("a.c"),
        ])
        .is_err());
        let ok = CompositeIndexSpec::new(vec![
            IndexPathSpec::new("a.b"),
            IndexPathSpec::new("a.c"),
            IndexPathSpec::new("x"),
        ])
        .unwrap();
        assert_eq!(ok.slot_of("a.c"), Some(1));
        assert_eq!(ok.slot_of("missing"), None);
    }
}
