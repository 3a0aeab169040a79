//! Tokenized table rows and their conversion into core records.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use spectrum_kernel_core::{
    AllocationRecord, CatalogEntry, CatalogStatus, Frequency, FrequencyUnit, Interval, KernelError,
    Tier,
};
use time::{Date, Month};

use crate::jurisdictions::parse_region;
use crate::services::parse_allocation;
use crate::units::UnitContext;

type Pattern = Lazy<Result<Regex, String>>;

static RANGE: Pattern = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*([A-Za-z]+)?\s*[-–]\s*(\d+(?:\.\d+)?)\s*([A-Za-z]+)?$")
        .map_err(|err| err.to_string())
});
static BELOW: Pattern = Lazy::new(|| {
    Regex::new(r"^(?i:below)\s+(\d+(?:\.\d+)?)\s*([A-Za-z]+)?(?:\s*\((?i:not allocated)\))?$")
        .map_err(|err| err.to_string())
});

fn compiled(pattern: &'static Pattern) -> Result<&'static Regex, KernelError> {
    Lazy::force(pattern).as_ref().map_err(|err| {
        KernelError::InvalidRecord(format!("bounds pattern failed to compile: {err}"))
    })
}

fn number(captures: &Captures<'_>, group: usize) -> Result<f64, KernelError> {
    let text = captures.get(group).map_or("", |m| m.as_str());
    text.parse::<f64>()
        .map_err(|err| KernelError::InvalidRecord(format!("`{text}` is not a number: {err}")))
}

fn unit(captures: &Captures<'_>, group: usize) -> Result<Option<FrequencyUnit>, KernelError> {
    match captures.get(group) {
        None => Ok(None),
        Some(symbol) => FrequencyUnit::parse(symbol.as_str()).map(Some).ok_or_else(|| {
            KernelError::InvalidRecord(format!("`{}` is not a frequency unit", symbol.as_str()))
        }),
    }
}

/// Parse a band-edge cell such as `10.6-10.68`, `10.6-10.68 GHz`,
/// `137 kHz - 1.8 MHz` or `Below 8.3 (Not Allocated)`.
///
/// A unit written on one edge applies to an edge without one; otherwise
/// the context's bounds unit applies. `Below X` spans zero to `X`.
///
/// # Errors
/// Returns [`KernelError::InvalidRecord`] for text that is not a range, unknown
/// units, and inverted ranges.
pub fn parse_bounds(text: &str, units: &UnitContext) -> Result<Interval, KernelError> {
    let text = text.trim();
    if let Some(captures) = compiled(&RANGE)?.captures(text) {
        let start_unit = unit(&captures, 2)?;
        let stop_unit = unit(&captures, 4)?;
        let start = units.bound(number(&captures, 1)?, start_unit.or(stop_unit))?;
        let stop = units.bound(number(&captures, 3)?, stop_unit.or(start_unit))?;
        return Interval::new(start, stop);
    }

    if let Some(captures) = compiled(&BELOW)?.captures(text) {
        let stop = units.bound(number(&captures, 1)?, unit(&captures, 2)?)?;
        return Interval::new(Frequency::ZERO, stop);
    }

    Err(KernelError::InvalidRecord(format!("not a valid range: `{text}`")))
}

fn is_not_allocated(text: &str) -> bool {
    text.to_ascii_lowercase().contains("(not allocated)")
}

/// Values catalog exports use for "no data".
fn is_absent(text: &str) -> bool {
    matches!(text.trim().to_ascii_lowercase().as_str(), "" | "-" | "n/r" | "nan" | "tbd" | "n/a")
}

/// Parse a launch or end-of-life cell: `YYYY-MM-DD`, `YYYY-MM` or `YYYY`,
/// optionally prefixed by `≥`. Partial dates fall on the first day of the
/// period. `TBD` and empty cells are absent.
///
/// # Errors
/// Returns [`KernelError::InvalidRecord`] for any other text.
pub fn parse_catalog_date(text: &str) -> Result<Option<Date>, KernelError> {
    if is_absent(text) {
        return Ok(None);
    }
    let trimmed = text.trim();
    let unprefixed = trimmed.trim_start_matches(['≥', '>', '=']).trim_start();
    let invalid = || KernelError::InvalidRecord(format!("invalid date format: `{trimmed}`"));

    let mut parts = unprefixed.split('-');
    let year = parts.next().and_then(|part| part.parse::<i32>().ok()).ok_or_else(invalid)?;
    let month = match parts.next() {
        None => Month::January,
        Some(part) => part
            .parse::<u8>()
            .ok()
            .and_then(|month| Month::try_from(month).ok())
            .ok_or_else(invalid)?,
    };
    let day = match parts.next() {
        None => 1,
        Some(part) => part.parse::<u8>().map_err(|_| invalid())?,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }
    Date::from_calendar_date(year, month, day).map(Some).map_err(|_| invalid())
}

/// Map a mission-status cell onto [`CatalogStatus`]; unrecognised text is
/// [`CatalogStatus::Unclear`].
#[must_use]
pub fn parse_catalog_status(text: &str) -> CatalogStatus {
    let lower = text.trim().to_ascii_lowercase();
    if lower.contains("operational") || lower == "current" {
        CatalogStatus::Operational
    } else if ["planned", "approved", "considered", "future"]
        .iter()
        .any(|word| lower.contains(word))
    {
        CatalogStatus::Planned
    } else if ["inactive", "retired", "failed", "decommissioned", "previous"]
        .iter()
        .any(|word| lower.contains(word))
    {
        CatalogStatus::Inactive
    } else {
        CatalogStatus::Unclear
    }
}

/// A catalog frequency cell: a single value or a `start-stop` range, with
/// anything after the first token of each side (units, notes) ignored unless
/// it is a unit symbol.
fn parse_catalog_frequencies(
    text: &str,
    units: &UnitContext,
) -> Result<(Frequency, Frequency), KernelError> {
    let mut sides = text.splitn(2, ['-', '–']).map(str::trim);
    let mut side = |label: &str| -> Result<Option<Frequency>, KernelError> {
        let Some(side) = sides.next() else {
            return Ok(None);
        };
        let mut tokens = side.split_whitespace();
        let Some(value) = tokens.next() else {
            return Err(KernelError::InvalidRecord(format!(
                "catalog frequency `{text}` lacks a {label}"
            )));
        };
        let value = value.parse::<f64>().map_err(|err| {
            KernelError::InvalidRecord(format!("catalog frequency `{text}`: {err}"))
        })?;
        let unit = tokens.next().and_then(FrequencyUnit::parse);
        units.catalog_frequency(value, unit).map(Some)
    };
    let start = side("value")?;
    let stop = side("upper bound")?;
    match (start, stop) {
        (Some(start), Some(stop)) => Ok((start, stop)),
        (Some(point), None) => Ok((point, point)),
        _ => Err(KernelError::InvalidRecord(format!("catalog frequency `{text}` is empty"))),
    }
}

fn parse_catalog_bandwidth(
    text: &str,
    units: &UnitContext,
) -> Result<Option<Frequency>, KernelError> {
    if is_absent(text) {
        return Ok(None);
    }
    let mut tokens = text.split_whitespace();
    let value = tokens
        .next()
        .unwrap_or_default()
        .parse::<f64>()
        .map_err(|err| KernelError::InvalidRecord(format!("catalog bandwidth `{text}`: {err}")))?;
    let unit = tokens.next().and_then(FrequencyUnit::parse);
    let bandwidth = units.catalog_bandwidth(value, unit)?;
    Ok((bandwidth > Frequency::ZERO).then_some(bandwidth))
}

fn optional(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!is_absent(trimmed)).then(|| trimmed.to_string())
}

/// One extracted cell of an allocation table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct AllocationRow {
    pub bounds: String,
    pub region: String,
    /// Allocation lines, e.g. `RADIO ASTRONOMY 5.149`.
    #[serde(default)]
    pub allocations: Vec<String>,
    /// Services named only by a footnote, parsed like allocation lines.
    #[serde(default)]
    pub footnote_mentions: Vec<String>,
    /// Band-level footnote identifiers; a cell may hold several separated by spaces.
    #[serde(default)]
    pub footnotes: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl AllocationRow {
    #[must_use]
    pub fn new(bounds: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bounds: bounds.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_allocation(mut self, text: impl Into<String>) -> Self {
        self.allocations.push(text.into());
        self
    }

    #[must_use]
    pub fn with_footnote_mention(mut self, text: impl Into<String>) -> Self {
        self.footnote_mentions.push(text.into());
        self
    }

    #[must_use]
    pub fn with_footnotes(mut self, text: impl Into<String>) -> Self {
        self.footnotes.push(text.into());
        self
    }

    /// `None` for a range the table explicitly leaves unallocated.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for malformed bounds or
    /// allocation lines, and [`KernelError::InvalidScope`] for unknown regions.
    pub fn to_record(&self, units: &UnitContext) -> Result<Option<AllocationRecord>, KernelError> {
        let interval = parse_bounds(&self.bounds, units)?;
        let region = parse_region(&self.region)?;
        if self.allocations.is_empty()
            && self.footnote_mentions.is_empty()
            && is_not_allocated(&self.bounds)
        {
            return Ok(None);
        }

        let mut record = AllocationRecord::new(interval, region);
        for text in &self.allocations {
            record = record.with_allocation(parse_allocation(text)?);
        }
        for text in &self.footnote_mentions {
            let mut mention = parse_allocation(text)?;
            mention.tier = Tier::FootnoteOnly;
            record = record.with_allocation(mention);
        }
        for footnote in self.footnotes.iter().flat_map(|cell| cell.split_whitespace()) {
            record = record.with_footnote(footnote);
        }
        for annotation in &self.annotations {
            record = record.with_annotation(annotation.trim());
        }
        Ok(Some(record))
    }
}

/// One row of a satellite frequency catalog export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct CatalogRow {
    pub id: String,
    pub satellite: String,
    #[serde(default, alias = "space_agency")]
    pub agency: String,
    /// Instrument or service name, the label aliases operate on.
    #[serde(alias = "service")]
    pub label: String,
    /// Single value (`23.8`) or range (`18.6-18.8`) in the context's catalog unit.
    pub frequency: String,
    #[serde(default)]
    pub bandwidth: String,
    #[serde(default)]
    pub polarization: String,
    #[serde(default)]
    pub sensing_mode: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub launch: String,
    #[serde(default, alias = "eol")]
    pub end_of_life: String,
    #[serde(default)]
    pub status: String,
}

impl CatalogRow {
    /// A single-frequency row, or a range no wider than 100 kHz, with a
    /// declared bandwidth becomes the band of that width centered on the
    /// row's frequency. A wider range keeps its edges even when the declared
    /// bandwidth disagrees; that case surfaces as a quality issue.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for unparseable frequencies,
    /// bandwidths or dates.
    pub fn to_entry(&self, units: &UnitContext) -> Result<CatalogEntry, KernelError> {
        let (start, stop) = parse_catalog_frequencies(&self.frequency, units)?;
        let declared_bandwidth = parse_catalog_bandwidth(&self.bandwidth, units)?;

        let range = Interval::new(start, stop)?;
        let center = if start == stop { start } else { range.center() };
        let (interval, nominal_center) = match declared_bandwidth {
            Some(bandwidth) if range.is_trivial() => {
                let half = 0.5 * bandwidth.hz();
                let widened = Interval::new(
                    Frequency::from_hz((center.hz() - half).max(0.0))?,
                    Frequency::from_hz(center.hz() + half)?,
                )?;
                (widened, Some(center))
            }
            _ if start == stop => (range, Some(center)),
            _ => (range, None),
        };

        let mut entry =
            CatalogEntry::new(interval, self.id.trim(), self.satellite.trim(), self.label.trim());
        entry.agency = self.agency.trim().to_string();
        entry.sensing_mode = optional(&self.sensing_mode);
        entry.polarization = optional(&self.polarization);
        entry.comment = optional(&self.comment);
        entry.launch = parse_catalog_date(&self.launch)?;
        entry.end_of_life = parse_catalog_date(&self.end_of_life)?;
        entry.status = parse_catalog_status(&self.status);
        entry.nominal_center = nominal_center;
        entry.declared_bandwidth = declared_bandwidth;
        Ok(entry)
    }
}
