//! Interval-indexed store for spectrum allocation tables and satellite
//! frequency catalogs.
//!
//! Everything in this crate is pure: collections are built once from
//! validated records and every further operation (queries, merges,
//! relabeling) reads them or derives new collections.

mod collation;
mod collection;
mod database;
mod frequency;
mod pattern;
mod predicate;
mod record;

pub use collation::{collate, relabel, AliasMap, AliasRule, AmbiguousAlias, Combine, Relabeled};
pub use collection::{Collection, Direction, Reach, Records};
pub use database::{merge_sensors, SourceProvenance, SpectrumDatabase};
pub use frequency::{
    Frequency, FrequencyUnit, Interval, FREQUENCY_ATOL_HZ, FREQUENCY_RTOL, TRIVIAL_WIDTH_HZ,
};
pub use pattern::{MatchCase, WildcardPattern};
pub use predicate::{
    has_allocation, has_footnote, has_label, And, HasAllocation, HasFootnote, HasLabel, Not, Or,
    Predicate,
};
pub use record::{
    AllocationRecord, CatalogEntry, CatalogStatus, Coalesce, Labeled, QualityIssue, Record,
    Region, ServiceAllocation, Tier,
};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum KernelError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("invalid search direction {0}: expected +1 or -1")]
    InvalidDirection(i8),
    #[error("invalid scope: {0}")]
    InvalidScope(String),
}
