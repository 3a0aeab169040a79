//! Verified-document ingestion.
//!
//! ```text
//! UnverifiedDocument --verify--> VerifiedDocument --ingest_*--> Ingested { database, report }
//!         \--mismatch / unknown--> Err (rejected, nothing built)
//! ```
//!
//! Rows can only be ingested from a [`VerifiedDocument`], so every database
//! carries the fingerprint of the exact bytes it was built from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spectrum_kernel_core::{
    AllocationRecord, CatalogEntry, Collection, KernelError, QualityIssue, Record, Region,
    SourceProvenance, SpectrumDatabase,
};

use crate::fingerprint::{DocumentIdentity, Fingerprint, FingerprintRegistry};
use crate::rows::{AllocationRow, CatalogRow};
use crate::units::UnitContext;
use crate::IngestError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    Unverified,
    Verified,
    Built,
    Rejected,
}

impl IngestionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Built => "built",
            Self::Rejected => "rejected",
        }
    }
}

/// What happens to a batch when one of its rows cannot be converted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// The first invalid row fails the whole ingestion.
    #[default]
    FailBatch,
    /// Invalid rows are dropped and listed in the report.
    SkipRow,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct IngestOptions {
    pub row_policy: RowPolicy,
    pub units: UnitContext,
}

impl IngestOptions {
    #[must_use]
    pub fn with_row_policy(mut self, row_policy: RowPolicy) -> Self {
        self.row_policy = row_policy;
        self
    }

    #[must_use]
    pub fn with_units(mut self, units: UnitContext) -> Self {
        self.units = units;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SkippedRow {
    /// Zero-based position in the submitted batch.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FlaggedIssue {
    pub row: usize,
    pub catalog_id: String,
    pub issue: QualityIssue,
}

/// Outcome of one ingestion, returned alongside the database.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct IngestReport {
    pub document: DocumentIdentity,
    pub fingerprint: Fingerprint,
    pub state: IngestionState,
    pub accepted: usize,
    /// Rows describing ranges the table leaves unallocated.
    pub unallocated: usize,
    pub skipped: Vec<SkippedRow>,
    pub quality_issues: Vec<FlaggedIssue>,
}

impl IngestReport {
    fn new(document: &VerifiedDocument) -> Self {
        Self {
            document: document.identity.clone(),
            fingerprint: document.fingerprint.clone(),
            state: IngestionState::Verified,
            accepted: 0,
            unallocated: 0,
            skipped: Vec::new(),
            quality_issues: Vec::new(),
        }
    }

    fn reject_row(
        &mut self,
        policy: RowPolicy,
        row: usize,
        err: KernelError,
    ) -> Result<(), IngestError> {
        let reason = match err {
            KernelError::InvalidRecord(reason) | KernelError::InvalidScope(reason) => reason,
            other @ KernelError::InvalidDirection(_) => other.to_string(),
        };
        match policy {
            RowPolicy::FailBatch => Err(IngestError::InvalidRecord { row, reason }),
            RowPolicy::SkipRow => {
                tracing::warn!(document = %self.document, row, reason = %reason, "skipping row");
                self.skipped.push(SkippedRow { row, reason });
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ingested<R> {
    pub database: SpectrumDatabase<R>,
    pub report: IngestReport,
}

/// Document bytes whose fingerprint has not been checked yet.
#[derive(Debug, Clone)]
pub struct UnverifiedDocument {
    identity: DocumentIdentity,
    bytes: Vec<u8>,
}

impl UnverifiedDocument {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        edition: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            identity: DocumentIdentity::new(name, edition),
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.bytes)
    }

    #[must_use]
    pub fn state(&self) -> IngestionState {
        IngestionState::Unverified
    }

    /// Check the bytes against `registry`. A failure is terminal: the
    /// document is consumed and nothing can be built from it.
    ///
    /// # Errors
    /// Returns [`IngestError::UnknownDocument`] or [`IngestError::VersionMismatch`].
    pub fn verify(self, registry: &FingerprintRegistry) -> Result<VerifiedDocument, IngestError> {
        match registry.verify(&self.identity, &self.bytes) {
            Ok(fingerprint) => {
                tracing::info!(
                    document = %self.identity,
                    fingerprint = %fingerprint,
                    state = IngestionState::Verified.as_str(),
                    "verified source document"
                );
                Ok(VerifiedDocument {
                    identity: self.identity,
                    fingerprint,
                    bytes: self.bytes,
                })
            }
            Err(err) => {
                tracing::warn!(
                    document = %self.identity,
                    state = IngestionState::Rejected.as_str(),
                    error = %err,
                    "rejected source document"
                );
                Err(err)
            }
        }
    }
}

/// Document bytes that matched their registered fingerprint.
#[derive(Debug, Clone)]
pub struct VerifiedDocument {
    identity: DocumentIdentity,
    fingerprint: Fingerprint,
    bytes: Vec<u8>,
}

impl VerifiedDocument {
    #[must_use]
    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn state(&self) -> IngestionState {
        IngestionState::Verified
    }

    #[must_use]
    pub fn provenance(&self) -> SourceProvenance {
        SourceProvenance {
            document: self.identity.name.clone(),
            edition: self.identity.edition.clone(),
            fingerprint: self.fingerprint.to_string(),
        }
    }

    /// Convert allocation-table rows and assemble one collection per region.
    ///
    /// # Errors
    /// Under [`RowPolicy::FailBatch`], the first unconvertible row fails with
    /// [`IngestError::InvalidRecord`]. Assembly failures surface as
    /// [`IngestError::Kernel`].
    pub fn ingest_allocations<I>(
        &self,
        rows: I,
        options: &IngestOptions,
    ) -> Result<Ingested<AllocationRecord>, IngestError>
    where
        I: IntoIterator<Item = AllocationRow>,
    {
        let mut report = IngestReport::new(self);
        let mut by_region: BTreeMap<Region, Vec<AllocationRecord>> = BTreeMap::new();
        for (row, item) in rows.into_iter().enumerate() {
            let converted = item.to_record(&options.units).and_then(|record| {
                if let Some(record) = &record {
                    record.validate()?;
                }
                Ok(record)
            });
            match converted {
                Ok(Some(record)) => {
                    report.accepted += 1;
                    by_region.entry(record.region).or_default().push(record);
                }
                Ok(None) => report.unallocated += 1,
                Err(err) => report.reject_row(options.row_policy, row, err)?,
            }
        }

        let mut scopes = Vec::with_capacity(by_region.len());
        for (region, records) in by_region {
            scopes.push((region, Collection::build(records)?));
        }
        let database = SpectrumDatabase::assemble(self.provenance(), scopes)?;
        report.state = IngestionState::Built;
        tracing::debug!(
            document = %self.identity,
            accepted = report.accepted,
            skipped = report.skipped.len(),
            "ingested allocation table"
        );
        Ok(Ingested { database, report })
    }

    /// Convert catalog rows into a single-scope database. Data-quality
    /// findings are reported, never fatal.
    ///
    /// # Errors
    /// As for [`VerifiedDocument::ingest_allocations`]; `scope` MUST NOT be
    /// [`Region::Combined`].
    pub fn ingest_catalog<I>(
        &self,
        scope: Region,
        rows: I,
        options: &IngestOptions,
    ) -> Result<Ingested<CatalogEntry>, IngestError>
    where
        I: IntoIterator<Item = CatalogRow>,
    {
        let mut report = IngestReport::new(self);
        let mut entries = Vec::new();
        for (row, item) in rows.into_iter().enumerate() {
            let converted = item.to_entry(&options.units).and_then(|entry| {
                entry.validate()?;
                Ok(entry)
            });
            match converted {
                Ok(entry) => {
                    for issue in entry.quality_issues() {
                        tracing::warn!(
                            document = %self.identity,
                            row,
                            catalog_id = %entry.catalog_id,
                            issue = %issue,
                            "catalog data-quality issue"
                        );
                        report.quality_issues.push(FlaggedIssue {
                            row,
                            catalog_id: entry.catalog_id.clone(),
                            issue,
                        });
                    }
                    report.accepted += 1;
                    entries.push(entry);
                }
                Err(err) => report.reject_row(options.row_policy, row, err)?,
            }
        }

        let database =
            SpectrumDatabase::single(self.provenance(), scope, Collection::build(entries)?)?;
        report.state = IngestionState::Built;
        tracing::debug!(
            document = %self.identity,
            scope = %scope,
            accepted = report.accepted,
            skipped = report.skipped.len(),
            flagged = report.quality_issues.len(),
            "ingested satellite catalog"
        );
        Ok(Ingested { database, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectrum_kernel_core::{Frequency, FrequencyUnit, Interval};

    const TABLE: &[u8] = b"allocation table fixture";

    fn verified() -> VerifiedDocument {
        let registry = match FingerprintRegistry::new().with_document(
            "Table of Frequency Allocations",
            "2022",
            Fingerprint::of(TABLE),
        ) {
            Ok(registry) => registry,
            Err(err) => panic!("registry fixture should be valid: {err}"),
        };
        match UnverifiedDocument::new("Table of Frequency Allocations", "2022", TABLE)
            .verify(&registry)
        {
            Ok(document) => document,
            Err(err) => panic!("fixture document should verify: {err}"),
        }
    }

    fn mhz(start: f64, stop: f64) -> Interval {
        match Interval::from_values(start, stop, FrequencyUnit::MHz) {
            Ok(interval) => interval,
            Err(err) => panic!("fixture interval should be valid: {err}"),
        }
    }

    fn rows() -> Vec<AllocationRow> {
        vec![
            AllocationRow::new("1400-1427 MHz", "Region 1").with_allocation("RADIO ASTRONOMY"),
            AllocationRow::new("1400-1427 MHz", "Region 2").with_allocation("RADIO ASTRONOMY"),
            AllocationRow::new("1427-1429 MHz", "Region 1").with_allocation("Weather chatter"),
            AllocationRow::new("Below 8.3 (Not Allocated)", "Region 1"),
        ]
    }

    #[test]
    fn unverified_documents_report_their_state() {
        let document = UnverifiedDocument::new("Table", "2022", TABLE.to_vec());
        assert_eq!(document.state(), IngestionState::Unverified);
        assert_eq!(document.fingerprint(), Fingerprint::of(TABLE));
        assert_eq!(verified().state(), IngestionState::Verified);
    }

    #[test]
    fn fail_batch_stops_at_the_first_bad_row() {
        let err = match verified().ingest_allocations(rows(), &IngestOptions::default()) {
            Ok(ingested) => panic!("batch should fail, built {:?}", ingested.report),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            IngestError::InvalidRecord { row: 2, reason } if reason.contains("no known service")
        ));
    }

    #[test]
    fn skip_row_reports_and_continues() {
        let options = IngestOptions::default().with_row_policy(RowPolicy::SkipRow);
        let ingested = match verified().ingest_allocations(rows(), &options) {
            Ok(ingested) => ingested,
            Err(err) => panic!("skip policy should build: {err}"),
        };
        let report = &ingested.report;
        assert_eq!(report.state, IngestionState::Built);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.unallocated, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 2);

        let database = &ingested.database;
        assert_eq!(database.regions().collect::<Vec<_>>(), vec![Region::Region1, Region::Region2]);
        assert_eq!(database.get(Region::Combined, &mhz(1410.0, 1411.0)).len(), 2);
        assert_eq!(database.provenance().fingerprint, Fingerprint::of(TABLE).to_string());
    }

    #[test]
    fn catalog_quality_issues_are_flagged_not_fatal() {
        let row = CatalogRow {
            id: "7".to_string(),
            satellite: "Sat".to_string(),
            label: "MWR".to_string(),
            frequency: "23.6-24.0".to_string(),
            bandwidth: "50".to_string(),
            ..CatalogRow::default()
        };
        let options = IngestOptions::default();
        let ingested = match verified().ingest_catalog(Region::Region1, [row], &options) {
            Ok(ingested) => ingested,
            Err(err) => panic!("catalog should build: {err}"),
        };
        assert_eq!(ingested.report.quality_issues.len(), 1);
        assert_eq!(ingested.report.quality_issues[0].catalog_id, "7");
        assert!(matches!(
            ingested.report.quality_issues[0].issue,
            QualityIssue::BandwidthMismatch { .. }
        ));
        let hits = ingested.database.get(Region::Region1, &mhz(23_700.0, 23_800.0));
        assert_eq!(hits.len(), 1);
        let lower_edge = match Frequency::new(23.6, FrequencyUnit::GHz) {
            Ok(frequency) => frequency,
            Err(err) => panic!("fixture frequency should be valid: {err}"),
        };
        assert!(hits[0].interval.start().is_close_to(lower_edge));
    }

    #[test]
    fn combined_catalog_scope_is_rejected() {
        assert!(matches!(
            verified().ingest_catalog(Region::Combined, Vec::new(), &IngestOptions::default()),
            Err(IngestError::Kernel(KernelError::InvalidScope(_)))
        ));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        match serde_json::from_str::<IngestOptions>(r#"{"row_policy": "skip_row"}"#) {
            Ok(options) => {
                assert_eq!(options.row_policy, RowPolicy::SkipRow);
                assert_eq!(options.units, UnitContext::default());
            }
            Err(err) => panic!("options should deserialize: {err}"),
        }
    }
}
