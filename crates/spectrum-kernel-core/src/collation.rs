use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::pattern::WildcardPattern;
use crate::record::{Labeled, Record};

/// Records that can be folded into one when collated under a shared label.
pub trait Combine {
    /// Merge `other` into a copy of `self`, carrying `label`.
    #[must_use]
    fn combine(&self, other: &Self, label: &str) -> Self;
}

/// One canonical label and the raw-label patterns it absorbs.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AliasRule {
    pub canonical: String,
    pub patterns: Vec<WildcardPattern>,
}

impl AliasRule {
    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(label))
    }
}

/// Ordered canonical-label rules. Earlier rules take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct AliasMap {
    rules: Vec<AliasRule>,
}

impl AliasMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rule<I, P>(mut self, canonical: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<WildcardPattern>,
    {
        self.push_rule(canonical, patterns);
        self
    }

    pub fn push_rule<I, P>(&mut self, canonical: impl Into<String>, patterns: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<WildcardPattern>,
    {
        self.rules.push(AliasRule {
            canonical: canonical.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        });
    }

    #[must_use]
    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Canonical labels with a pattern matching `label`, in declaration order.
    #[must_use]
    pub fn candidates(&self, label: &str) -> Vec<&str> {
        let mut matched: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if rule.matches(label) && !matched.contains(&rule.canonical.as_str()) {
                matched.push(&rule.canonical);
            }
        }
        matched
    }

    /// The canonical label for `label`: the first declared rule that matches.
    #[must_use]
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.rules.iter().find(|rule| rule.matches(label)).map(|rule| rule.canonical.as_str())
    }

    fn is_canonical(&self, label: &str) -> bool {
        self.rules.iter().any(|rule| rule.canonical == label)
    }
}

/// A raw label claimed by more than one canonical rule.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AmbiguousAlias {
    pub label: String,
    pub candidates: Vec<String>,
    pub chosen: String,
}

/// Result of relabeling: the derived value plus every ambiguity diagnostic.
#[derive(Debug, Clone)]
pub struct Relabeled<C> {
    pub relabeled: C,
    pub ambiguities: Vec<AmbiguousAlias>,
}

/// Replace each raw label with its canonical label under `alias_map`.
///
/// Records whose label is already canonical, resolves to itself, or resolves
/// to nothing are shared with `collection` rather than copied, so a second
/// pass with the same map changes nothing. Ambiguous labels resolve to the
/// first declared rule and are reported, once per label.
#[must_use]
pub fn relabel<R>(collection: &Collection<R>, alias_map: &AliasMap) -> Relabeled<Collection<R>>
where
    R: Record + Labeled,
{
    let mut ambiguities = BTreeMap::new();
    let mut slots = Vec::with_capacity(collection.len());
    for record in collection.shared() {
        if alias_map.is_canonical(record.label()) {
            slots.push(Arc::clone(record));
            continue;
        }
        let candidates = alias_map.candidates(record.label());
        let Some(&chosen) = candidates.first() else {
            slots.push(Arc::clone(record));
            continue;
        };
        if candidates.len() > 1 && !ambiguities.contains_key(record.label()) {
            tracing::warn!(
                label = record.label(),
                candidates = ?candidates,
                chosen,
                "label matches more than one canonical alias"
            );
            ambiguities.insert(
                record.label().to_string(),
                AmbiguousAlias {
                    label: record.label().to_string(),
                    candidates: candidates.iter().map(ToString::to_string).collect(),
                    chosen: chosen.to_string(),
                },
            );
        }
        if chosen == record.label() {
            slots.push(Arc::clone(record));
        } else {
            slots.push(Arc::new(record.with_label(chosen)));
        }
    }
    Relabeled {
        relabeled: Collection::from_shared(slots),
        ambiguities: ambiguities.into_values().collect(),
    }
}

/// Relabel, then fold overlapping or touching records within each canonical
/// group into one record spanning them.
///
/// Records outside every group pass through untouched.
#[must_use]
pub fn collate<R>(collection: &Collection<R>, alias_map: &AliasMap) -> Relabeled<Collection<R>>
where
    R: Record + Labeled + Combine,
{
    let Relabeled { relabeled, ambiguities } = relabel(collection, alias_map);

    let mut passthrough = Vec::new();
    let mut groups: BTreeMap<String, Vec<Arc<R>>> = BTreeMap::new();
    for record in relabeled.shared() {
        if alias_map.is_canonical(record.label()) {
            groups.entry(record.label().to_string()).or_default().push(Arc::clone(record));
        } else {
            passthrough.push(Arc::clone(record));
        }
    }

    let grouped = groups.values().map(Vec::len).sum::<usize>();
    let mut slots = passthrough;
    for (label, members) in &groups {
        let mut members = members.iter();
        let Some(first) = members.next() else {
            continue;
        };
        let mut current = Arc::clone(first);
        for next in members {
            if next.interval().start() <= current.interval().stop() {
                current = Arc::new(current.combine(next, label));
            } else {
                slots.push(current);
                current = Arc::clone(next);
            }
        }
        slots.push(current);
    }

    let collated = Collection::from_shared(slots);
    tracing::debug!(
        groups = groups.len(),
        grouped,
        records = collated.len(),
        "collated records under canonical labels"
    );
    Relabeled { relabeled: collated, ambiguities }
}
