//! # Docket Core
//!
//! Multi-key composite index core for Docket.
//!
//! This crate sits between the query compiler and the storage access method:
//! - **Write path**: [`generate::generate_terms`] expands a document against
//!   a [`spec::CompositeIndexSpec`] into the composite rows to store,
//!   pairing values from shared array ancestors and cross-producting
//!   independent ones.
//! - **Read path**: [`scan::plan_query`] turns per-path constraints into an
//!   ordered list of physical scan ranges plus the recheck predicates the
//!   access method must re-evaluate against full documents.
//!
//! Everything here is pure and synchronous: no I/O, no shared state, safe to
//! call concurrently. Data-shape surprises (oversized values, ambiguous
//! array layouts) degrade to recheck obligations rather than errors.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bounds;
mod error;
pub mod generate;
pub mod path;
pub mod query;
pub mod scan;
pub mod spec;

pub use bounds::{
    compute_bounds, CompositeIndexBounds, CompositeIndexBoundsSet, CompositeSingleBound,
    VariableIndexBounds,
};
pub use error::{CoreError, CoreResult};
pub use generate::{generate_terms, CompositeRow, GeneratedTerms, MultikeyMetadata};
pub use query::{PathConstraint, QueryPredicate, RecheckPredicate, RecheckReason};
pub use scan::{plan_query, CompositeQueryMetaInfo, CompositeQueryRunData, CompositeScanRange};
pub use spec::{CompositeIndexSpec, IndexPathSpec, SortOrder, MAX_INDEX_PATHS};
