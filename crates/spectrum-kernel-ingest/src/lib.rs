//! Ingestion boundary for spectrum allocation tables and satellite catalogs.
//!
//! Source documents are fingerprinted and checked against a registry before
//! any of their rows are trusted. Rows arrive already tokenized (the table
//! extraction itself happens elsewhere) and are converted into core records
//! under an explicit [`UnitContext`] and [`RowPolicy`].

mod config;
mod fingerprint;
mod ingestion;
mod jurisdictions;
mod rows;
mod services;
mod units;

pub use config::{alias_map_from_json_str, alias_map_from_yaml_str};
pub use fingerprint::{DocumentIdentity, Fingerprint, FingerprintRegistry, RegisteredDocument};
pub use ingestion::{
    FlaggedIssue, IngestOptions, IngestReport, Ingested, IngestionState, RowPolicy, SkippedRow,
    UnverifiedDocument, VerifiedDocument,
};
pub use jurisdictions::parse_region;
pub use rows::{parse_bounds, parse_catalog_date, parse_catalog_status, AllocationRow, CatalogRow};
pub use services::{identify_service, parse_allocation, KnownService, KNOWN_SERVICES};
pub use units::UnitContext;

use spectrum_kernel_core::KernelError;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum IngestError {
    #[error("fingerprint mismatch for {identity}: expected {expected}, observed {observed}")]
    VersionMismatch {
        identity: DocumentIdentity,
        expected: Fingerprint,
        observed: Fingerprint,
    },
    #[error("no fingerprint registered for {0}")]
    UnknownDocument(DocumentIdentity),
    #[error("invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Kernel(#[from] KernelError),
}
