use std::collections::BTreeSet;

use crate::pattern::{MatchCase, WildcardPattern};
use crate::record::{AllocationRecord, Labeled, Tier};

/// A pure test over one record, usable as a query filter or search condition.
///
/// Closures `Fn(&R) -> bool` are predicates; the structs in this module
/// cover the common allocation and label checks and combine with
/// [`Predicate::and`], [`Predicate::or`] and [`Predicate::not`].
pub trait Predicate<R: ?Sized> {
    fn evaluate(&self, record: &R) -> bool;

    fn and<P>(self, other: P) -> And<Self, P>
    where
        Self: Sized,
        P: Predicate<R>,
    {
        And(self, other)
    }

    fn or<P>(self, other: P) -> Or<Self, P>
    where
        Self: Sized,
        P: Predicate<R>,
    {
        Or(self, other)
    }

    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

impl<R: ?Sized, F> Predicate<R> for F
where
    F: Fn(&R) -> bool,
{
    fn evaluate(&self, record: &R) -> bool {
        self(record)
    }
}

#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

impl<R: ?Sized, A: Predicate<R>, B: Predicate<R>> Predicate<R> for And<A, B> {
    fn evaluate(&self, record: &R) -> bool {
        self.0.evaluate(record) && self.1.evaluate(record)
    }
}

#[derive(Debug, Clone)]
pub struct Or<A, B>(A, B);

impl<R: ?Sized, A: Predicate<R>, B: Predicate<R>> Predicate<R> for Or<A, B> {
    fn evaluate(&self, record: &R) -> bool {
        self.0.evaluate(record) || self.1.evaluate(record)
    }
}

#[derive(Debug, Clone)]
pub struct Not<A>(A);

impl<R: ?Sized, A: Predicate<R>> Predicate<R> for Not<A> {
    fn evaluate(&self, record: &R) -> bool {
        !self.0.evaluate(record)
    }
}

/// Does a band carry a matching service allocation?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasAllocation {
    pattern: WildcardPattern,
    tiers: Option<BTreeSet<Tier>>,
    but_not: Option<WildcardPattern>,
    co_primary: Option<bool>,
    exclusive: Option<bool>,
}

/// Predicate factory: service label matches `name` (`*` wildcards, case-sensitive).
#[must_use]
pub fn has_allocation(name: impl Into<WildcardPattern>) -> HasAllocation {
    HasAllocation {
        pattern: name.into(),
        tiers: None,
        but_not: None,
        co_primary: None,
        exclusive: None,
    }
}

impl HasAllocation {
    /// Only allocations whose tier is listed count as a match.
    #[must_use]
    pub fn with_tiers(mut self, tiers: impl IntoIterator<Item = Tier>) -> Self {
        self.tiers = Some(tiers.into_iter().collect());
        self
    }

    #[must_use]
    pub fn primary(self) -> Self {
        self.with_tiers([Tier::Primary])
    }

    #[must_use]
    pub fn case_insensitive(mut self) -> Self {
        self.pattern = self.pattern.case_insensitive();
        if let Some(but_not) = self.but_not.take() {
            self.but_not = Some(but_not.case_insensitive());
        }
        self
    }

    /// Skip allocations that also match `pattern`.
    #[must_use]
    pub fn but_not(mut self, pattern: impl Into<WildcardPattern>) -> Self {
        let pattern = pattern.into();
        self.but_not = Some(match self.pattern.case() {
            MatchCase::Sensitive => pattern,
            MatchCase::Insensitive => pattern.case_insensitive(),
        });
        self
    }

    #[must_use]
    pub fn co_primary(mut self, required: bool) -> Self {
        self.co_primary = Some(required);
        self
    }

    #[must_use]
    pub fn exclusive(mut self, required: bool) -> Self {
        self.exclusive = Some(required);
        self
    }
}

impl Predicate<AllocationRecord> for HasAllocation {
    fn evaluate(&self, record: &AllocationRecord) -> bool {
        record.allocations.iter().any(|allocation| {
            if !self.pattern.matches(&allocation.service) {
                return false;
            }
            if let Some(tiers) = &self.tiers {
                if !tiers.contains(&allocation.tier) {
                    return false;
                }
            }
            if let Some(but_not) = &self.but_not {
                if but_not.matches(&allocation.service) {
                    return false;
                }
            }
            if let Some(required) = self.co_primary {
                if record.is_co_primary(allocation) != required {
                    return false;
                }
            }
            if let Some(required) = self.exclusive {
                if record.is_exclusive(allocation) != required {
                    return false;
                }
            }
            true
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasFootnote {
    pattern: WildcardPattern,
    band_level_only: bool,
}

/// Predicate factory: any footnote identifier matches `pattern`.
#[must_use]
pub fn has_footnote(pattern: impl Into<WildcardPattern>) -> HasFootnote {
    HasFootnote {
        pattern: pattern.into(),
        band_level_only: false,
    }
}

impl HasFootnote {
    /// Ignore footnotes attached to individual allocations.
    #[must_use]
    pub fn band_level_only(mut self) -> Self {
        self.band_level_only = true;
        self
    }
}

impl Predicate<AllocationRecord> for HasFootnote {
    fn evaluate(&self, record: &AllocationRecord) -> bool {
        if self.band_level_only {
            record.footnotes.iter().any(|footnote| self.pattern.matches(footnote))
        } else {
            record.all_footnotes().into_iter().any(|footnote| self.pattern.matches(footnote))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasLabel {
    pattern: WildcardPattern,
}

/// Predicate factory over [`Labeled`] records such as catalog entries.
#[must_use]
pub fn has_label(pattern: impl Into<WildcardPattern>) -> HasLabel {
    HasLabel { pattern: pattern.into() }
}

impl<R: Labeled> Predicate<R> for HasLabel {
    fn evaluate(&self, record: &R) -> bool {
        self.pattern.matches(record.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{FrequencyUnit, Interval};
    use crate::record::{CatalogEntry, Region, ServiceAllocation};

    fn band() -> AllocationRecord {
        let interval = match Interval::from_values(10.6, 10.68, FrequencyUnit::GHz) {
            Ok(interval) => interval,
            Err(err) => panic!("fixture interval should be valid: {err}"),
        };
        AllocationRecord::new(interval, Region::Region1)
            .with_allocation(ServiceAllocation::new(
                "Earth Exploration-Satellite (passive)",
                Tier::Primary,
            ))
            .with_allocation(ServiceAllocation::new("Fixed", Tier::Primary))
            .with_allocation(
                ServiceAllocation::new("Radio Astronomy", Tier::Secondary).with_footnote("5.149"),
            )
            .with_footnote("5.482")
    }

    #[test]
    fn wildcard_suffix_matches_qualified_service_names() {
        let record = band();
        assert!(has_allocation("Earth Exploration-Satellite*").evaluate(&record));
        assert!(!has_allocation("Earth Exploration-Satellite").evaluate(&record));
        assert!(has_allocation("Radio Astronomy*").evaluate(&record));
        assert!(!has_allocation("radio astronomy*").evaluate(&record));
        assert!(has_allocation("radio astronomy*").case_insensitive().evaluate(&record));
    }

    #[test]
    fn tier_filter_limits_matching_labels() {
        let record = band();
        assert!(!has_allocation("Radio Astronomy").primary().evaluate(&record));
        assert!(has_allocation("Radio Astronomy")
            .with_tiers([Tier::Secondary, Tier::FootnoteOnly])
            .evaluate(&record));
        assert!(record.has_allocation("Fixed", Some(&[Tier::Primary])));
        assert!(!record.has_allocation("Fixed", Some(&[Tier::Secondary])));
        assert!(record.has_allocation("Fixed", None));
    }

    #[test]
    fn but_not_and_co_primary_qualifiers() {
        let record = band();
        assert!(!has_allocation("*").but_not("*").evaluate(&record));
        assert!(has_allocation("F*").but_not("Fixed-Satellite*").evaluate(&record));
        assert!(has_allocation("Fixed").co_primary(true).evaluate(&record));
        assert!(!has_allocation("Fixed").exclusive(true).evaluate(&record));
    }

    #[test]
    fn footnote_predicate_respects_level() {
        let record = band();
        assert!(has_footnote("5.149").evaluate(&record));
        assert!(!has_footnote("5.149").band_level_only().evaluate(&record));
        assert!(has_footnote("5.48*").band_level_only().evaluate(&record));
    }

    #[test]
    fn closures_and_combinators_compose() {
        let record = band();
        let narrow = |band: &AllocationRecord| band.interval.width().hz() < 1e8;
        let condition = has_allocation("Radio Astronomy*").and(narrow);
        assert!(condition.evaluate(&record));
        let negated = has_allocation("Radio Astronomy*").not();
        assert!(!negated.evaluate(&record));
        let either = has_allocation("Mobile").or(has_footnote("5.482"));
        assert!(either.evaluate(&record));
    }

    #[test]
    fn label_predicate_applies_to_catalog_entries() {
        let interval = match Interval::from_values(23.8, 23.8, FrequencyUnit::GHz) {
            Ok(interval) => interval,
            Err(err) => panic!("fixture interval should be valid: {err}"),
        };
        let entry = CatalogEntry::new(interval, "1", "Aqua", "AMSR-E");
        assert!(has_label("AMSR*").evaluate(&entry));
        assert!(!has_label("ATMS*").evaluate(&entry));
    }
}
