use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::collation::Combine;
use crate::frequency::{Frequency, Interval};
use crate::predicate::{has_allocation, Predicate};
use crate::KernelError;

/// Anything that can be stored in a [`crate::Collection`].
pub trait Record {
    fn interval(&self) -> &Interval;

    /// Check record-level invariants before indexing.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] describing the first violation.
    fn validate(&self) -> Result<(), KernelError> {
        Ok(())
    }
}

/// Records carrying a free-text category label that aliases can rewrite.
pub trait Labeled: Sized {
    fn label(&self) -> &str;

    #[must_use]
    fn with_label(&self, label: &str) -> Self;
}

/// Records whose contents can be pooled into one band, as needed to stitch
/// touching bands together or to split a collection at every band edge.
pub trait Coalesce: Record + Sized {
    /// Copy of `self` bounded by `interval` instead.
    #[must_use]
    fn with_interval(&self, interval: Interval) -> Self;

    /// Contents of both records on the hull of their intervals.
    #[must_use]
    fn coalesce(&self, other: &Self) -> Self;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Primary,
    Secondary,
    FootnoteOnly,
}

impl Tier {
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Primary => 3,
            Self::Secondary => 2,
            Self::FootnoteOnly => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::FootnoteOnly => "footnote_only",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "footnote_only" => Some(Self::FootnoteOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Region {
    #[serde(rename = "region_1")]
    Region1,
    #[serde(rename = "region_2")]
    Region2,
    #[serde(rename = "region_3")]
    Region3,
    #[serde(rename = "national")]
    National,
    #[serde(rename = "combined")]
    Combined,
}

impl Region {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region1 => "region_1",
            Self::Region2 => "region_2",
            Self::Region3 => "region_3",
            Self::National => "national",
            Self::Combined => "combined",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "region_1" => Some(Self::Region1),
            "region_2" => Some(Self::Region2),
            "region_3" => Some(Self::Region3),
            "national" => Some(Self::National),
            "combined" => Some(Self::Combined),
            _ => None,
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Region1 => "Region 1",
            Self::Region2 => "Region 2",
            Self::Region3 => "Region 3",
            Self::National => "National",
            Self::Combined => "Combined",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct ServiceAllocation {
    pub service: String,
    pub tier: Tier,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub footnotes: Vec<String>,
}

impl ServiceAllocation {
    #[must_use]
    pub fn new(service: impl Into<String>, tier: Tier) -> Self {
        Self {
            service: service.into(),
            tier,
            modifiers: Vec::new(),
            footnotes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifiers.push(modifier.into());
        self
    }

    #[must_use]
    pub fn with_footnote(mut self, footnote: impl Into<String>) -> Self {
        self.footnotes.push(footnote.into());
        self
    }
}

/// Table-style rendering: primary services upper-case, secondary capitalized,
/// footnote-only mentions lower-case with a trailing marker.
impl Display for ServiceAllocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut rendered = match self.tier {
            Tier::Primary => self.service.to_uppercase(),
            Tier::Secondary => {
                let lower = self.service.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            Tier::FootnoteOnly => self.service.to_lowercase(),
        };
        for modifier in &self.modifiers {
            rendered.push_str(&format!(" ({modifier})"));
        }
        if self.tier == Tier::FootnoteOnly {
            rendered.push_str(" (by footnote)");
        }
        for footnote in &self.footnotes {
            rendered.push(' ');
            rendered.push_str(footnote);
        }
        f.write_str(&rendered)
    }
}

/// One cell of a regulatory allocation table.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AllocationRecord {
    pub interval: Interval,
    pub region: Region,
    pub allocations: Vec<ServiceAllocation>,
    #[serde(default)]
    pub footnotes: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl AllocationRecord {
    #[must_use]
    pub fn new(interval: Interval, region: Region) -> Self {
        Self {
            interval,
            region,
            allocations: Vec::new(),
            footnotes: Vec::new(),
            annotations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_allocation(mut self, allocation: ServiceAllocation) -> Self {
        self.allocations.push(allocation);
        self
    }

    #[must_use]
    pub fn with_footnote(mut self, footnote: impl Into<String>) -> Self {
        self.footnotes.push(footnote.into());
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Allocations that confer protection, i.e. excluding footnote-only mentions.
    fn tiered_count(&self) -> (usize, usize) {
        let primary = self.allocations.iter().filter(|a| a.tier == Tier::Primary).count();
        let secondary = self.allocations.iter().filter(|a| a.tier == Tier::Secondary).count();
        (primary, secondary)
    }

    /// A primary allocation sharing the band with at least one other primary.
    #[must_use]
    pub fn is_co_primary(&self, allocation: &ServiceAllocation) -> bool {
        allocation.tier == Tier::Primary && self.tiered_count().0 > 1
    }

    /// The band's only primary-or-secondary allocation.
    #[must_use]
    pub fn is_exclusive(&self, allocation: &ServiceAllocation) -> bool {
        let (primary, secondary) = self.tiered_count();
        allocation.tier != Tier::FootnoteOnly && primary + secondary == 1
    }

    /// Wildcard match of `name` against the service labels, optionally limited to `tiers`.
    #[must_use]
    pub fn has_allocation(&self, name: &str, tiers: Option<&[Tier]>) -> bool {
        let mut predicate = has_allocation(name);
        if let Some(tiers) = tiers {
            predicate = predicate.with_tiers(tiers.iter().copied());
        }
        predicate.evaluate(self)
    }

    /// Band-level and allocation-level footnotes, sorted and deduplicated.
    #[must_use]
    pub fn all_footnotes(&self) -> Vec<&str> {
        let mut footnotes = self
            .footnotes
            .iter()
            .chain(self.allocations.iter().flat_map(|a| a.footnotes.iter()))
            .map(String::as_str)
            .collect::<Vec<_>>();
        footnotes.sort_unstable();
        footnotes.dedup();
        footnotes
    }
}

impl Record for AllocationRecord {
    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn validate(&self) -> Result<(), KernelError> {
        if self.allocations.is_empty() {
            return Err(KernelError::InvalidRecord(format!(
                "band {} MUST carry at least one service allocation",
                self.interval
            )));
        }
        if self.allocations.iter().any(|a| a.service.trim().is_empty()) {
            return Err(KernelError::InvalidRecord(format!(
                "band {} has an allocation without a service label",
                self.interval
            )));
        }
        let footnotes = self
            .footnotes
            .iter()
            .chain(self.allocations.iter().flat_map(|a| a.footnotes.iter()));
        for footnote in footnotes {
            if footnote.trim().is_empty() {
                return Err(KernelError::InvalidRecord(format!(
                    "band {} has an empty footnote identifier",
                    self.interval
                )));
            }
        }
        Ok(())
    }
}

impl Coalesce for AllocationRecord {
    fn with_interval(&self, interval: Interval) -> Self {
        Self { interval, ..self.clone() }
    }

    /// Allocations, footnotes and annotations are pooled without duplicates;
    /// records from different regions pool into [`Region::Combined`].
    fn coalesce(&self, other: &Self) -> Self {
        let mut pooled = self.with_interval(self.interval.hull(&other.interval));
        if pooled.region != other.region {
            pooled.region = Region::Combined;
        }
        extend_distinct(&mut pooled.allocations, &other.allocations);
        extend_distinct(&mut pooled.footnotes, &other.footnotes);
        extend_distinct(&mut pooled.annotations, &other.annotations);
        pooled
    }
}

fn extend_distinct<T: Clone + PartialEq>(target: &mut Vec<T>, extra: &[T]) {
    for item in extra {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

impl Display for AllocationRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.interval, self.region)?;
        for allocation in &self.allocations {
            write!(f, " / {allocation}")?;
        }
        if !self.footnotes.is_empty() {
            write!(f, " / {}", self.footnotes.join(" "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CatalogStatus {
    Operational,
    Planned,
    Inactive,
    Unclear,
}

impl CatalogStatus {
    /// Activity ranking used when catalog entries are collated together.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Operational => 3,
            Self::Planned => 2,
            Self::Inactive => 1,
            Self::Unclear => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Planned => "planned",
            Self::Inactive => "inactive",
            Self::Unclear => "unclear",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "operational" => Some(Self::Operational),
            "planned" => Some(Self::Planned),
            "inactive" => Some(Self::Inactive),
            "unclear" => Some(Self::Unclear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityIssue {
    /// The declared bandwidth disagrees with the width of the declared range.
    BandwidthMismatch {
        declared_bandwidth: Frequency,
        range_width: Frequency,
    },
    /// End of life precedes launch.
    LifecycleInverted { launch: Date, end_of_life: Date },
}

impl Display for QualityIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BandwidthMismatch { declared_bandwidth, range_width } => write!(
                f,
                "declared bandwidth {declared_bandwidth} disagrees with range width {range_width}"
            ),
            Self::LifecycleInverted { launch, end_of_life } => {
                write!(f, "end of life {end_of_life} precedes launch {launch}")
            }
        }
    }
}

/// One instrument channel from a satellite frequency catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CatalogEntry {
    pub interval: Interval,
    pub catalog_id: String,
    pub satellite: String,
    pub agency: String,
    /// Sensor or service label, the field aliases operate on.
    pub label: String,
    pub sensing_mode: Option<String>,
    pub polarization: Option<String>,
    pub comment: Option<String>,
    pub launch: Option<Date>,
    pub end_of_life: Option<Date>,
    pub status: CatalogStatus,
    pub nominal_center: Option<Frequency>,
    pub declared_bandwidth: Option<Frequency>,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(
        interval: Interval,
        catalog_id: impl Into<String>,
        satellite: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            interval,
            catalog_id: catalog_id.into(),
            satellite: satellite.into(),
            agency: String::new(),
            label: label.into(),
            sensing_mode: None,
            polarization: None,
            comment: None,
            launch: None,
            end_of_life: None,
            status: CatalogStatus::Unclear,
            nominal_center: None,
            declared_bandwidth: None,
        }
    }

    #[must_use]
    pub fn center(&self) -> Frequency {
        self.nominal_center.unwrap_or_else(|| self.interval.center())
    }

    /// Declared bandwidth when present and non-zero, otherwise the range width.
    #[must_use]
    pub fn bandwidth(&self) -> Frequency {
        self.declared_bandwidth
            .filter(|bandwidth| *bandwidth > Frequency::ZERO)
            .unwrap_or_else(|| self.interval.width())
    }

    /// Data-quality findings that are reported rather than resolved.
    #[must_use]
    pub fn quality_issues(&self) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        let range_width = self.interval.width();
        if let Some(declared_bandwidth) = self.declared_bandwidth {
            let declared_is_trivial = declared_bandwidth.is_close_to(Frequency::ZERO);
            if !self.interval.is_trivial()
                && !declared_is_trivial
                && !range_width.is_close_to(declared_bandwidth)
            {
                issues.push(QualityIssue::BandwidthMismatch { declared_bandwidth, range_width });
            }
        }
        if let (Some(launch), Some(end_of_life)) = (self.launch, self.end_of_life) {
            if end_of_life < launch {
                issues.push(QualityIssue::LifecycleInverted { launch, end_of_life });
            }
        }
        issues
    }
}

impl Record for CatalogEntry {
    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn validate(&self) -> Result<(), KernelError> {
        if self.satellite.trim().is_empty() {
            return Err(KernelError::InvalidRecord(format!(
                "catalog entry {} MUST name a satellite",
                self.catalog_id
            )));
        }
        if self.label.trim().is_empty() {
            return Err(KernelError::InvalidRecord(format!(
                "catalog entry {} MUST carry a sensor/service label",
                self.catalog_id
            )));
        }
        if let Some(center) = self.nominal_center {
            let inside = (self.interval.start() <= center && center <= self.interval.stop())
                || center.is_close_to(self.interval.start())
                || center.is_close_to(self.interval.stop());
            if !inside {
                return Err(KernelError::InvalidRecord(format!(
                    "catalog entry {}: nominal center {center} lies outside {}",
                    self.catalog_id, self.interval
                )));
            }
        }
        Ok(())
    }
}

impl Labeled for CatalogEntry {
    fn label(&self) -> &str {
        &self.label
    }

    fn with_label(&self, label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..self.clone()
        }
    }
}

fn join_distinct(lhs: &str, rhs: &str) -> String {
    if rhs.is_empty() || lhs.split('/').any(|part| part == rhs) {
        lhs.to_string()
    } else if lhs.is_empty() {
        rhs.to_string()
    } else {
        format!("{lhs}/{rhs}")
    }
}

fn join_optional(lhs: Option<&String>, rhs: Option<&String>) -> Option<String> {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Some(join_distinct(lhs, rhs)),
        (Some(value), None) | (None, Some(value)) => Some(value.clone()),
        (None, None) => None,
    }
}

impl Combine for CatalogEntry {
    /// Identifiers are joined with `/`; the merged entry spans both ranges and
    /// derives its center and bandwidth from that span.
    fn combine(&self, other: &Self, label: &str) -> Self {
        let launch = match (self.launch, other.launch) {
            (Some(lhs), Some(rhs)) => Some(lhs.min(rhs)),
            (lhs, rhs) => lhs.or(rhs),
        };
        let end_of_life = match (self.end_of_life, other.end_of_life) {
            (Some(lhs), Some(rhs)) => Some(lhs.max(rhs)),
            (lhs, rhs) => lhs.or(rhs),
        };
        let status =
            if other.status.rank() > self.status.rank() { other.status } else { self.status };
        Self {
            interval: self.interval.hull(&other.interval),
            catalog_id: join_distinct(&self.catalog_id, &other.catalog_id),
            satellite: join_distinct(&self.satellite, &other.satellite),
            agency: join_distinct(&self.agency, &other.agency),
            label: label.to_string(),
            sensing_mode: join_optional(self.sensing_mode.as_ref(), other.sensing_mode.as_ref()),
            polarization: join_optional(self.polarization.as_ref(), other.polarization.as_ref()),
            comment: join_optional(self.comment.as_ref(), other.comment.as_ref()),
            launch,
            end_of_life,
            status,
            nominal_center: None,
            declared_bandwidth: None,
        }
    }
}

impl Coalesce for CatalogEntry {
    /// The nominal center and declared bandwidth describe the old bounds and
    /// are dropped.
    fn with_interval(&self, interval: Interval) -> Self {
        Self {
            interval,
            nominal_center: None,
            declared_bandwidth: None,
            ..self.clone()
        }
    }

    fn coalesce(&self, other: &Self) -> Self {
        self.combine(other, &join_distinct(&self.label, &other.label))
    }
}
