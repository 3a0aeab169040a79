use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::frequency::{Frequency, Interval, FREQUENCY_ATOL_HZ};
use crate::predicate::Predicate;
use crate::record::{Coalesce, Record};
use crate::KernelError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward higher frequencies (`+1`).
    Above,
    /// Toward lower frequencies (`-1`).
    Below,
}

/// How far [`Collection::query_range_with_reach`] extends past the records
/// overlapping the query range.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Reach {
    #[default]
    Overlapping,
    /// Also matching records touching the overlapping ones.
    Adjacent,
    /// Keeps following touching matching records until none are left.
    RecursivelyAdjacent,
}

impl TryFrom<i8> for Direction {
    type Error = KernelError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Above),
            -1 => Ok(Self::Below),
            other => Err(KernelError::InvalidDirection(other)),
        }
    }
}

/// Immutable, interval-indexed multiset of records.
///
/// Records sit in a slice sorted by `(start, stop, insertion order)`. The
/// slice doubles as an implicit balanced search tree: the node for the
/// half-open slot range `[lo, hi)` is `lo + (hi - lo) / 2`, and `max_stop`
/// holds the greatest stop within each node's subtree. `by_stop` orders slot
/// indices by `(stop, start, slot descending)` for downward searches.
///
/// Records are held behind `Arc`, so merges and filters share them.
#[derive(Debug)]
pub struct Collection<R> {
    slots: Vec<Arc<R>>,
    max_stop: Vec<Frequency>,
    by_stop: Vec<usize>,
}

impl<R> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            max_stop: self.max_stop.clone(),
            by_stop: self.by_stop.clone(),
        }
    }
}

impl<R: Record> Default for Collection<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R: Record> Collection<R> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slots: Vec::new(),
            max_stop: Vec::new(),
            by_stop: Vec::new(),
        }
    }

    /// Validate every record and index the batch.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] naming the position of the first
    /// record that fails [`Record::validate`]. Nothing is indexed in that case.
    pub fn build<I>(records: I) -> Result<Self, KernelError>
    where
        I: IntoIterator<Item = R>,
    {
        let mut shared = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            record.validate().map_err(|err| match err {
                KernelError::InvalidRecord(message) => {
                    KernelError::InvalidRecord(format!("record {index}: {message}"))
                }
                other => other,
            })?;
            shared.push(Arc::new(record));
        }
        let collection = Self::from_shared(shared);
        tracing::debug!(records = collection.len(), "built interval collection");
        Ok(collection)
    }

    /// Index already validated records, keeping their relative order for ties.
    pub(crate) fn from_shared(mut slots: Vec<Arc<R>>) -> Self {
        slots.sort_by(|lhs, rhs| lhs.interval().cmp(rhs.interval()));
        Self::from_sorted(slots)
    }

    fn from_sorted(slots: Vec<Arc<R>>) -> Self {
        let mut max_stop = vec![Frequency::ZERO; slots.len()];
        fill_max_stop(&slots, &mut max_stop, 0, slots.len());

        let mut by_stop = (0..slots.len()).collect::<Vec<_>>();
        by_stop.sort_by(|&lhs, &rhs| {
            let lhs_interval = slots[lhs].interval();
            let rhs_interval = slots[rhs].interval();
            lhs_interval
                .stop()
                .cmp(&rhs_interval.stop())
                .then_with(|| lhs_interval.start().cmp(&rhs_interval.start()))
                .then_with(|| rhs.cmp(&lhs))
        });

        Self { slots, max_stop, by_stop }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Records in `(start, stop, insertion order)`.
    pub fn iter(&self) -> Records<'_, R> {
        Records { inner: self.slots.iter() }
    }

    pub(crate) fn shared(&self) -> &[Arc<R>] {
        &self.slots
    }

    /// Every record overlapping `range`, in iteration order.
    #[must_use]
    pub fn query_range(&self, range: &Interval) -> Vec<&R> {
        let mut hits = Vec::new();
        self.collect_overlapping(0, self.slots.len(), range, &mut hits);
        hits.into_iter().map(|slot| self.slots[slot].as_ref()).collect()
    }

    #[must_use]
    pub fn query_range_where<P>(&self, range: &Interval, predicate: &P) -> Vec<&R>
    where
        P: Predicate<R> + ?Sized,
    {
        let mut hits = self.query_range(range);
        hits.retain(|record| predicate.evaluate(record));
        hits
    }

    /// Matching records overlapping `range`, extended by `reach`.
    ///
    /// Each adjacency pass queries again over the hull of the current hits
    /// (or `range` when there are none), padded by the closeness tolerance.
    /// The hull is contiguous, so a pass also picks up matching records lying
    /// between two hits.
    #[must_use]
    pub fn query_range_with_reach<P>(
        &self,
        range: &Interval,
        predicate: &P,
        reach: Reach,
    ) -> Vec<&R>
    where
        P: Predicate<R> + ?Sized,
    {
        let matching = |range: &Interval| {
            let mut hits = Vec::new();
            self.collect_overlapping(0, self.slots.len(), range, &mut hits);
            hits.retain(|&slot| predicate.evaluate(self.slots[slot].as_ref()));
            hits
        };
        let mut hits = matching(range);
        let passes = match reach {
            Reach::Overlapping => 0,
            Reach::Adjacent => 1,
            Reach::RecursivelyAdjacent => self.slots.len(),
        };
        for _ in 0..passes {
            let covered = hits
                .iter()
                .map(|&slot| *self.slots[slot].interval())
                .reduce(|lhs, rhs| lhs.hull(&rhs))
                .unwrap_or(*range);
            let grown = matching(&covered.padded());
            let settled = grown.len() == hits.len();
            hits = grown;
            if settled {
                break;
            }
        }
        hits.into_iter().map(|slot| self.slots[slot].as_ref()).collect()
    }

    /// Records containing `frequency`, using the degenerate-interval widening.
    ///
    /// A frequency too large to widen has no representable neighbourhood and
    /// yields no records.
    #[must_use]
    pub fn query_point(&self, frequency: Frequency) -> Vec<&R> {
        match Interval::point(frequency) {
            Ok(range) => self.query_range(&range),
            Err(_) => Vec::new(),
        }
    }

    fn collect_overlapping(&self, lo: usize, hi: usize, range: &Interval, hits: &mut Vec<usize>) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        if self.max_stop[mid] <= range.start() {
            return;
        }
        self.collect_overlapping(lo, mid, range, hits);
        let interval = self.slots[mid].interval();
        if interval.start() >= range.stop() {
            return;
        }
        if interval.overlaps(range) {
            hits.push(mid);
        }
        self.collect_overlapping(mid + 1, hi, range, hits);
    }

    /// Nearest record in `direction` from `from` that satisfies `predicate`.
    ///
    /// Searching [`Direction::Above`] considers records starting at or above
    /// `from` and prefers the lowest start, then the lowest stop. Searching
    /// [`Direction::Below`] considers records ending at or below `from` and
    /// prefers the highest stop, then the highest start. Remaining ties go to
    /// the earliest inserted record. `None` means no record qualifies.
    #[must_use]
    pub fn find_closest<P>(
        &self,
        from: Frequency,
        direction: Direction,
        predicate: &P,
    ) -> Option<&R>
    where
        P: Predicate<R> + ?Sized,
    {
        match direction {
            Direction::Above => {
                let first = self.slots.partition_point(|record| record.interval().start() < from);
                self.slots[first..]
                    .iter()
                    .map(Arc::as_ref)
                    .find(|record| predicate.evaluate(record))
            }
            Direction::Below => {
                let end = self
                    .by_stop
                    .partition_point(|&slot| self.slots[slot].interval().stop() <= from);
                self.by_stop[..end]
                    .iter()
                    .rev()
                    .map(|&slot| self.slots[slot].as_ref())
                    .find(|record| predicate.evaluate(record))
            }
        }
    }

    /// A matching record containing `from`, otherwise the nearest one in
    /// `direction` as [`Collection::find_closest`] finds it.
    #[must_use]
    pub fn find_closest_or_containing<P>(
        &self,
        from: Frequency,
        direction: Direction,
        predicate: &P,
    ) -> Option<&R>
    where
        P: Predicate<R> + ?Sized,
    {
        self.query_point(from)
            .into_iter()
            .find(|record| predicate.evaluate(record))
            .or_else(|| self.find_closest(from, direction, predicate))
    }

    /// Multiset union of both collections.
    ///
    /// Nothing is deduplicated or coalesced. Records comparing equal keep the
    /// left operand's records first, so insertion order is `self` then `other`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut slots = Vec::with_capacity(self.len() + other.len());
        let mut left = self.slots.iter().peekable();
        let mut right = other.slots.iter().peekable();
        loop {
            let take_left = match (left.peek(), right.peek()) {
                (Some(lhs), Some(rhs)) => lhs.interval().cmp(rhs.interval()) != Ordering::Greater,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_left { left.next() } else { right.next() };
            if let Some(record) = next {
                slots.push(Arc::clone(record));
            }
        }
        Self::from_sorted(slots)
    }

    /// Sub-collection of the records satisfying `predicate`, sharing them.
    #[must_use]
    pub fn filter<P>(&self, predicate: &P) -> Self
    where
        P: Predicate<R> + ?Sized,
    {
        let slots = self
            .slots
            .iter()
            .filter(|record| predicate.evaluate(record.as_ref()))
            .cloned()
            .collect();
        Self::from_sorted(slots)
    }

    /// Lowest start to highest stop, `None` when empty.
    #[must_use]
    pub fn span(&self) -> Option<Interval> {
        self.slots.iter().map(|record| *record.interval()).reduce(|lhs, rhs| lhs.hull(&rhs))
    }

    /// Sorted distinct band edges across all records.
    #[must_use]
    pub fn boundaries(&self) -> Vec<Frequency> {
        let mut edges = self
            .slots
            .iter()
            .flat_map(|record| [record.interval().start(), record.interval().stop()])
            .collect::<Vec<_>>();
        edges.sort_unstable();
        edges.dedup();
        edges
    }
}

impl<R: Coalesce> Collection<R> {
    /// Matching records with each run of overlapping or adjacent records
    /// coalesced into one. Records failing `predicate` are left out.
    #[must_use]
    pub fn stitch<P>(&self, predicate: &P) -> Self
    where
        P: Predicate<R> + ?Sized,
    {
        let mut slots = Vec::new();
        let mut open: Option<Arc<R>> = None;
        for record in self.slots.iter().filter(|record| predicate.evaluate(record.as_ref())) {
            open = Some(match open.take() {
                None => Arc::clone(record),
                Some(run) => {
                    let touches = record.interval().start() <= run.interval().stop()
                        || run.interval().is_adjacent(record.interval());
                    if touches {
                        Arc::new(run.coalesce(record))
                    } else {
                        slots.push(run);
                        Arc::clone(record)
                    }
                }
            });
        }
        slots.extend(open);
        let stitched = Self::from_shared(slots);
        tracing::debug!(records = self.len(), runs = stitched.len(), "stitched collection");
        stitched
    }

    /// Split at every band edge and coalesce the records covering each piece,
    /// leaving no two records overlapping. Gaps stay gaps.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] when two distinct band edges are
    /// less than 10 Hz apart, which includes any widened single-frequency
    /// record.
    pub fn flatten(&self) -> Result<Self, KernelError> {
        let edges = self.boundaries();
        let mut slots = Vec::with_capacity(edges.len());
        for pair in edges.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if hi.hz() - lo.hz() < FREQUENCY_ATOL_HZ {
                return Err(KernelError::InvalidRecord(format!(
                    "band edges {lo} and {hi} are too close to split between"
                )));
            }
            let piece = Interval::new(lo, hi)?;
            let mut covering = self.query_range(&piece).into_iter();
            let Some(first) = covering.next() else {
                continue;
            };
            let pooled = covering.fold(first.with_interval(piece), |pooled, record| {
                pooled.coalesce(&record.with_interval(piece))
            });
            slots.push(Arc::new(pooled));
        }
        let flattened = Self::from_sorted(slots);
        tracing::debug!(records = self.len(), pieces = flattened.len(), "flattened collection");
        Ok(flattened)
    }
}

fn fill_max_stop<R: Record>(
    slots: &[Arc<R>],
    max_stop: &mut [Frequency],
    lo: usize,
    hi: usize,
) -> Frequency {
    if lo >= hi {
        return Frequency::ZERO;
    }
    let mid = lo + (hi - lo) / 2;
    let left = fill_max_stop(slots, max_stop, lo, mid);
    let right = fill_max_stop(slots, max_stop, mid + 1, hi);
    let subtree = slots[mid].interval().stop().max(left).max(right);
    max_stop[mid] = subtree;
    subtree
}

pub struct Records<'a, R> {
    inner: std::slice::Iter<'a, Arc<R>>,
}

impl<'a, R> Iterator for Records<'a, R> {
    type Item = &'a R;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Arc::as_ref)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<R> DoubleEndedIterator for Records<'_, R> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(Arc::as_ref)
    }
}

impl<R> ExactSizeIterator for Records<'_, R> {}

impl<'a, R: Record> IntoIterator for &'a Collection<R> {
    type Item = &'a R;
    type IntoIter = Records<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
