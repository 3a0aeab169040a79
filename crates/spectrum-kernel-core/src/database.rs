use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collation::{collate, AliasMap, AmbiguousAlias, Combine, Relabeled};
use crate::collection::{Collection, Direction};
use crate::frequency::{Frequency, Interval};
use crate::predicate::Predicate;
use crate::record::{Labeled, Record, Region};
use crate::KernelError;

/// Identity and content fingerprint of the document a database was built from.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct SourceProvenance {
    pub document: String,
    pub edition: String,
    /// `sha256:<hex>` digest of the verified document bytes.
    pub fingerprint: String,
}

impl SourceProvenance {
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] when a field is blank or the
    /// fingerprint is not `sha256:<hex>`.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.document.trim().is_empty() {
            return Err(KernelError::InvalidRecord("document MUST be provided".to_string()));
        }
        if self.edition.trim().is_empty() {
            return Err(KernelError::InvalidRecord("edition MUST be provided".to_string()));
        }
        let digest = self.fingerprint.strip_prefix("sha256:").unwrap_or_default();
        if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KernelError::InvalidRecord(
                "fingerprint MUST be formatted as sha256:<hex>".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-scope collections built from one verified source document.
///
/// The [`Region::Combined`] scope is never stored directly: it is the merge
/// of every authored scope, computed at assembly.
#[derive(Debug, Clone)]
pub struct SpectrumDatabase<R> {
    provenance: SourceProvenance,
    scopes: BTreeMap<Region, Collection<R>>,
    combined: Collection<R>,
    footnote_definitions: BTreeMap<String, String>,
}

impl<R: Record> SpectrumDatabase<R> {
    /// # Errors
    /// Returns [`KernelError::InvalidScope`] when a scope is listed twice or is
    /// [`Region::Combined`], and [`KernelError::InvalidRecord`] for invalid
    /// provenance.
    pub fn assemble<I>(provenance: SourceProvenance, scopes: I) -> Result<Self, KernelError>
    where
        I: IntoIterator<Item = (Region, Collection<R>)>,
    {
        provenance.validate()?;
        let mut by_region = BTreeMap::new();
        for (region, collection) in scopes {
            if region == Region::Combined {
                return Err(KernelError::InvalidScope(
                    "the combined scope is derived and cannot be authored".to_string(),
                ));
            }
            if by_region.insert(region, collection).is_some() {
                return Err(KernelError::InvalidScope(format!("scope {region} listed twice")));
            }
        }
        let database = Self::from_scopes(provenance, by_region, BTreeMap::new());
        tracing::debug!(
            document = %database.provenance.document,
            edition = %database.provenance.edition,
            scopes = database.scopes.len(),
            records = database.combined.len(),
            "assembled spectrum database"
        );
        Ok(database)
    }

    /// # Errors
    /// See [`SpectrumDatabase::assemble`].
    pub fn single(
        provenance: SourceProvenance,
        region: Region,
        collection: Collection<R>,
    ) -> Result<Self, KernelError> {
        Self::assemble(provenance, [(region, collection)])
    }

    fn from_scopes(
        provenance: SourceProvenance,
        scopes: BTreeMap<Region, Collection<R>>,
        footnote_definitions: BTreeMap<String, String>,
    ) -> Self {
        let combined = scopes
            .values()
            .fold(Collection::empty(), |combined, collection| combined.merge(collection));
        Self {
            provenance,
            scopes,
            combined,
            footnote_definitions,
        }
    }

    #[must_use]
    pub fn with_footnote_definitions<I, K, V>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.footnote_definitions
            .extend(definitions.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    #[must_use]
    pub fn provenance(&self) -> &SourceProvenance {
        &self.provenance
    }

    /// Authored scopes in region order; excludes [`Region::Combined`].
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.scopes.keys().copied()
    }

    #[must_use]
    pub fn scope(&self, region: Region) -> Option<&Collection<R>> {
        match region {
            Region::Combined => Some(&self.combined),
            other => self.scopes.get(&other),
        }
    }

    #[must_use]
    pub fn combined(&self) -> &Collection<R> {
        &self.combined
    }

    /// Records of `scope` overlapping `range`; empty when the scope is absent.
    #[must_use]
    pub fn get(&self, scope: Region, range: &Interval) -> Vec<&R> {
        self.scope(scope).map(|collection| collection.query_range(range)).unwrap_or_default()
    }

    #[must_use]
    pub fn find_closest_matching_band<P>(
        &self,
        scope: Region,
        frequency: Frequency,
        direction: Direction,
        condition: &P,
    ) -> Option<&R>
    where
        P: Predicate<R> + ?Sized,
    {
        self.scope(scope)?.find_closest(frequency, direction, condition)
    }

    /// As [`SpectrumDatabase::find_closest_matching_band`], except that a
    /// matching band containing `frequency` is returned first.
    #[must_use]
    pub fn find_closest_matching_band_including<P>(
        &self,
        scope: Region,
        frequency: Frequency,
        direction: Direction,
        condition: &P,
    ) -> Option<&R>
    where
        P: Predicate<R> + ?Sized,
    {
        self.scope(scope)?.find_closest_or_containing(frequency, direction, condition)
    }

    /// Footnote text for `id`. A trailing `#` (table marker) is ignored.
    #[must_use]
    pub fn footnote_definition(&self, id: &str) -> Option<&str> {
        let key = id.trim().trim_end_matches('#');
        self.footnote_definitions.get(key).map(String::as_str)
    }
}

/// Collate every scope of `database` under `alias_map` and rebuild the
/// combined view. Ambiguities are reported once per raw label.
#[must_use]
pub fn merge_sensors<R>(
    database: &SpectrumDatabase<R>,
    alias_map: &AliasMap,
) -> Relabeled<SpectrumDatabase<R>>
where
    R: Record + Labeled + Combine,
{
    let mut ambiguities: Vec<AmbiguousAlias> = Vec::new();
    let mut scopes = BTreeMap::new();
    for (region, collection) in &database.scopes {
        let collated = collate(collection, alias_map);
        ambiguities.extend(collated.ambiguities);
        scopes.insert(*region, collated.relabeled);
    }
    ambiguities.sort();
    ambiguities.dedup();
    let relabeled = SpectrumDatabase::from_scopes(
        database.provenance.clone(),
        scopes,
        database.footnote_definitions.clone(),
    );
    Relabeled { relabeled, ambiguities }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::FrequencyUnit;
    use crate::predicate::has_allocation;
    use crate::record::{AllocationRecord, CatalogEntry, ServiceAllocation, Tier};

    fn provenance() -> SourceProvenance {
        SourceProvenance {
            document: "ITU Radio Regulations Article 5".to_string(),
            edition: "2020".to_string(),
            fingerprint: format!("sha256:{}", "ab".repeat(32)),
        }
    }

    fn mhz_interval(start: f64, stop: f64) -> Interval {
        match Interval::from_values(start, stop, FrequencyUnit::MHz) {
            Ok(interval) => interval,
            Err(err) => panic!("fixture interval should be valid: {err}"),
        }
    }

    fn band(region: Region, start: f64, stop: f64, service: &str) -> AllocationRecord {
        AllocationRecord::new(mhz_interval(start, stop), region)
            .with_allocation(ServiceAllocation::new(service, Tier::Primary))
    }

    fn collection<R: Record>(records: Vec<R>) -> Collection<R> {
        match Collection::build(records) {
            Ok(collection) => collection,
            Err(err) => panic!("fixture collection should build: {err}"),
        }
    }

    fn region_database() -> SpectrumDatabase<AllocationRecord> {
        let region_1 = collection(vec![
            band(Region::Region1, 1_400.0, 1_427.0, "Radio Astronomy"),
            band(Region::Region1, 1_427.0, 1_429.0, "Space Operation"),
        ]);
        let region_2 = collection(vec![
            band(Region::Region2, 1_400.0, 1_427.0, "Radio Astronomy"),
            band(Region::Region2, 1_610.6, 1_613.8, "Radio Astronomy"),
            band(Region::Region2, 1_613.8, 1_626.5, "Mobile-Satellite"),
        ]);
        match SpectrumDatabase::assemble(
            provenance(),
            [(Region::Region1, region_1), (Region::Region2, region_2)],
        ) {
            Ok(database) => database,
            Err(err) => panic!("fixture database should assemble: {err}"),
        }
    }

    #[test]
    fn combined_view_holds_every_region() {
        let database = region_database();
        assert_eq!(database.combined().len(), 5);
        assert_eq!(database.regions().collect::<Vec<_>>(), vec![Region::Region1, Region::Region2]);

        let hits = database.get(Region::Combined, &mhz_interval(1_400.0, 1_427.0));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].region, Region::Region1);
        assert_eq!(hits[1].region, Region::Region2);
        assert!(database.get(Region::Region3, &mhz_interval(1_400.0, 1_427.0)).is_empty());
    }

    #[test]
    fn closest_band_is_scoped() {
        let database = region_database();
        let frequency = match Frequency::new(1_475.0, FrequencyUnit::MHz) {
            Ok(frequency) => frequency,
            Err(err) => panic!("fixture frequency should be valid: {err}"),
        };
        let condition = has_allocation("Radio Astronomy*");
        assert!(database
            .find_closest_matching_band(Region::Region1, frequency, Direction::Above, &condition)
            .is_none());
        match database.find_closest_matching_band(
            Region::Combined,
            frequency,
            Direction::Above,
            &condition,
        ) {
            Some(band) => assert_eq!(band.region, Region::Region2),
            None => panic!("expected the 1610.6 MHz band in the combined view"),
        }
    }

    #[test]
    fn closest_band_may_include_the_one_containing_the_frequency() {
        let database = region_database();
        let frequency = match Frequency::new(1_410.0, FrequencyUnit::MHz) {
            Ok(frequency) => frequency,
            Err(err) => panic!("fixture frequency should be valid: {err}"),
        };
        let condition = has_allocation("Radio Astronomy*");
        let including = database.find_closest_matching_band_including(
            Region::Region2,
            frequency,
            Direction::Above,
            &condition,
        );
        let expected = mhz_interval(1_400.0, 1_427.0).start();
        assert_eq!(including.map(|band| band.interval.start()), Some(expected));
        let excluding = database.find_closest_matching_band(
            Region::Region2,
            frequency,
            Direction::Above,
            &condition,
        );
        let expected = mhz_interval(1_610.6, 1_613.8).start();
        assert_eq!(excluding.map(|band| band.interval.start()), Some(expected));
    }

    #[test]
    fn assemble_rejects_authored_combined_scope_and_bad_provenance() {
        let result = SpectrumDatabase::single(
            provenance(),
            Region::Combined,
            collection(vec![band(Region::Combined, 1.0, 2.0, "Fixed")]),
        );
        assert!(matches!(result, Err(KernelError::InvalidScope(_))));

        let mut unhashed = provenance();
        unhashed.fingerprint = "md5:abc".to_string();
        let result = SpectrumDatabase::<AllocationRecord>::assemble(unhashed, []);
        assert!(matches!(
            result,
            Err(KernelError::InvalidRecord(message)) if message.contains("sha256")
        ));
    }

    #[test]
    fn footnote_lookup_ignores_table_marker() {
        let database = region_database()
            .with_footnote_definitions([("5.340", "All emissions are prohibited")]);
        assert_eq!(database.footnote_definition("5.340#"), Some("All emissions are prohibited"));
        assert_eq!(database.footnote_definition("5.341"), None);
    }

    #[test]
    fn merge_sensors_collates_every_scope() {
        let entry = |id: &str, label: &str, start: f64, stop: f64| {
            CatalogEntry::new(mhz_interval(start, stop), id, "Aqua", label)
        };
        let national = collection(vec![
            entry("1", "AMSR-E", 18_600.0, 18_800.0),
            entry("2", "AMSR2", 18_700.0, 18_900.0),
            entry("3", "ATMS-3", 23_600.0, 24_000.0),
        ]);
        let database = match SpectrumDatabase::single(provenance(), Region::National, national) {
            Ok(database) => database,
            Err(err) => panic!("fixture database should assemble: {err}"),
        };
        let alias_map = AliasMap::new().with_rule("AMSR", ["AMSR*"]);

        let Relabeled { relabeled, ambiguities } = merge_sensors(&database, &alias_map);
        assert!(ambiguities.is_empty());
        assert_eq!(relabeled.combined().len(), 2);
        assert_eq!(relabeled.provenance(), database.provenance());
        let labels = relabeled.combined().iter().map(|e| e.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["AMSR", "ATMS-3"]);
        assert_eq!(database.combined().len(), 3);
    }
}
