use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::KernelError;

/// Absolute tolerance used when comparing band edges.
pub const FREQUENCY_ATOL_HZ: f64 = 10.0;
/// Relative tolerance used when comparing band edges.
pub const FREQUENCY_RTOL: f64 = 1e-6;
/// Widest declared range still treated as a single point (100 kHz).
pub const TRIVIAL_WIDTH_HZ: f64 = 1e5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FrequencyUnit {
    #[serde(rename = "Hz")]
    Hz,
    #[serde(rename = "kHz")]
    KHz,
    #[serde(rename = "MHz")]
    MHz,
    #[serde(rename = "GHz")]
    GHz,
    #[serde(rename = "THz")]
    THz,
}

impl FrequencyUnit {
    #[must_use]
    pub fn hz_per_unit(self) -> f64 {
        match self {
            Self::Hz => 1.0,
            Self::KHz => 1e3,
            Self::MHz => 1e6,
            Self::GHz => 1e9,
            Self::THz => 1e12,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hz => "Hz",
            Self::KHz => "kHz",
            Self::MHz => "MHz",
            Self::GHz => "GHz",
            Self::THz => "THz",
        }
    }

    /// Unit symbols are matched without regard to ASCII case ("mhz", "MHz").
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hz" => Some(Self::Hz),
            "khz" => Some(Self::KHz),
            "mhz" => Some(Self::MHz),
            "ghz" => Some(Self::GHz),
            "thz" => Some(Self::THz),
            _ => None,
        }
    }

    fn for_display(hz: f64) -> Self {
        [Self::THz, Self::GHz, Self::MHz, Self::KHz]
            .into_iter()
            .find(|unit| hz >= unit.hz_per_unit())
            .unwrap_or(Self::Hz)
    }
}

impl Display for FrequencyUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-negative, finite frequency held as a magnitude in hertz.
///
/// Values from other units enter only through [`Frequency::new`], so every
/// comparison inside a collection happens on one normalized scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Frequency {
    hz: f64,
}

impl Frequency {
    pub const ZERO: Self = Self { hz: 0.0 };

    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for NaN, infinite or negative values.
    pub fn new(value: f64, unit: FrequencyUnit) -> Result<Self, KernelError> {
        Self::from_hz(value * unit.hz_per_unit())
    }

    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for NaN, infinite or negative values.
    pub fn from_hz(hz: f64) -> Result<Self, KernelError> {
        if !hz.is_finite() {
            return Err(KernelError::InvalidRecord(format!(
                "frequency MUST be finite, got {hz}"
            )));
        }
        if hz < 0.0 {
            return Err(KernelError::InvalidRecord(format!(
                "frequency MUST be non-negative, got {hz} Hz"
            )));
        }
        // Folds -0.0 into +0.0 so equality and hashing agree.
        Ok(Self { hz: hz + 0.0 })
    }

    #[must_use]
    pub fn hz(self) -> f64 {
        self.hz
    }

    #[must_use]
    pub fn value_in(self, unit: FrequencyUnit) -> f64 {
        self.hz / unit.hz_per_unit()
    }

    /// Gap between this magnitude and the next representable one above it.
    #[must_use]
    pub fn ulp(self) -> f64 {
        f64::from_bits(self.hz.to_bits() + 1) - self.hz
    }

    /// Closeness test mirroring `|a - b| <= atol + rtol * |b|`.
    #[must_use]
    pub fn is_close_to(self, other: Self) -> bool {
        (self.hz - other.hz).abs() <= other.tolerance()
    }

    fn midpoint(self, other: Self) -> Self {
        Self {
            hz: 0.5 * (self.hz + other.hz),
        }
    }

    fn tolerance(self) -> f64 {
        FREQUENCY_ATOL_HZ + FREQUENCY_RTOL * self.hz.abs()
    }
}

impl PartialEq for Frequency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frequency {}

impl PartialOrd for Frequency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frequency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hz.total_cmp(&other.hz)
    }
}

impl Hash for Frequency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hz.to_bits().hash(state);
    }
}

impl TryFrom<f64> for Frequency {
    type Error = KernelError;

    fn try_from(hz: f64) -> Result<Self, Self::Error> {
        Self::from_hz(hz)
    }
}

impl From<Frequency> for f64 {
    fn from(value: Frequency) -> Self {
        value.hz
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let unit = FrequencyUnit::for_display(self.hz);
        let scaled = (self.value_in(unit) * 1e6).round() / 1e6;
        write!(f, "{scaled} {unit}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct IntervalBounds {
    start: Frequency,
    stop: Frequency,
}

/// Half-open frequency range `[start, stop)` with `start < stop`.
///
/// Field order gives the derived total order by `(start, stop)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(try_from = "IntervalBounds", into = "IntervalBounds")]
pub struct Interval {
    start: Frequency,
    stop: Frequency,
}

impl Interval {
    /// Build an interval, widening a zero-width range so it stays queryable.
    ///
    /// A degenerate range `[f, f)` becomes `[f, f + delta)` where `delta` is
    /// `sqrt(ulp(f))` (never less than `ulp(f)`). The delta depends only on
    /// `f`, so identical inputs always widen identically.
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] when `start > stop`, or when a
    /// degenerate range cannot be widened without overflowing.
    pub fn new(start: Frequency, stop: Frequency) -> Result<Self, KernelError> {
        match start.cmp(&stop) {
            Ordering::Less => Ok(Self { start, stop }),
            Ordering::Greater => Err(KernelError::InvalidRecord(format!(
                "interval start MUST NOT exceed stop ({start} > {stop})"
            ))),
            Ordering::Equal => {
                let ulp = stop.ulp();
                let delta = ulp.sqrt().max(ulp);
                let widened = Frequency::from_hz(stop.hz + delta).map_err(|_| {
                    KernelError::InvalidRecord(format!(
                        "degenerate interval at {stop} cannot be widened"
                    ))
                })?;
                if widened <= start {
                    return Err(KernelError::InvalidRecord(format!(
                        "degenerate interval at {stop} cannot be widened"
                    )));
                }
                Ok(Self { start, stop: widened })
            }
        }
    }

    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for invalid bounds, see [`Interval::new`].
    pub fn from_values(start: f64, stop: f64, unit: FrequencyUnit) -> Result<Self, KernelError> {
        Self::new(Frequency::new(start, unit)?, Frequency::new(stop, unit)?)
    }

    /// Single-frequency interval, widened as described on [`Interval::new`].
    ///
    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] when the point cannot be widened.
    pub fn point(frequency: Frequency) -> Result<Self, KernelError> {
        Self::new(frequency, frequency)
    }

    #[must_use]
    pub fn start(&self) -> Frequency {
        self.start
    }

    #[must_use]
    pub fn stop(&self) -> Frequency {
        self.stop
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    #[must_use]
    pub fn contains_point(&self, frequency: Frequency) -> bool {
        self.start <= frequency && frequency < self.stop
    }

    #[must_use]
    pub fn center(&self) -> Frequency {
        self.start.midpoint(self.stop)
    }

    #[must_use]
    pub fn width(&self) -> Frequency {
        Frequency {
            hz: self.stop.hz - self.start.hz,
        }
    }

    /// True when one interval ends where the other begins, within tolerance.
    #[must_use]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        other.stop.is_close_to(self.start) || other.start.is_close_to(self.stop)
    }

    /// At most [`TRIVIAL_WIDTH_HZ`] wide.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.width().hz <= TRIVIAL_WIDTH_HZ
    }

    /// Smallest interval covering both operands.
    #[must_use]
    pub fn hull(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    /// Grown at each end by the closeness tolerance, so that it overlaps
    /// every interval adjacent to `self`.
    #[must_use]
    pub fn padded(&self) -> Self {
        let start = (self.start.hz - self.start.tolerance()).max(0.0);
        let stop = (self.stop.hz + self.stop.tolerance()).min(f64::MAX);
        Self {
            start: Frequency { hz: start },
            stop: Frequency { hz: stop },
        }
    }
}

impl TryFrom<IntervalBounds> for Interval {
    type Error = KernelError;

    fn try_from(bounds: IntervalBounds) -> Result<Self, Self::Error> {
        Self::new(bounds.start, bounds.stop)
    }
}

impl From<Interval> for IntervalBounds {
    fn from(interval: Interval) -> Self {
        Self {
            start: interval.start,
            stop: interval.stop,
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ghz(value: f64) -> Frequency {
        match Frequency::new(value, FrequencyUnit::GHz) {
            Ok(frequency) => frequency,
            Err(err) => panic!("fixture frequency {value} GHz should be valid: {err}"),
        }
    }

    fn interval(start: f64, stop: f64) -> Interval {
        match Interval::from_values(start, stop, FrequencyUnit::GHz) {
            Ok(interval) => interval,
            Err(err) => panic!("fixture interval should be valid: {err}"),
        }
    }

    #[test]
    fn units_normalize_to_hertz() {
        assert_eq!(ghz(1.4).hz(), 1.4e9);
        assert_eq!(Frequency::new(1400.0, FrequencyUnit::MHz), Ok(ghz(1.4)));
        assert!((ghz(10.6).value_in(FrequencyUnit::MHz) - 10_600.0).abs() < 1e-9);
        assert_eq!(FrequencyUnit::parse("mhz"), Some(FrequencyUnit::MHz));
        assert_eq!(FrequencyUnit::parse("furlongs"), None);
    }

    #[test]
    fn rejects_non_finite_and_negative_values() {
        assert!(Frequency::from_hz(f64::NAN).is_err());
        assert!(Frequency::from_hz(f64::INFINITY).is_err());
        assert!(Frequency::new(-1.0, FrequencyUnit::MHz).is_err());
        assert_eq!(Frequency::from_hz(-0.0), Ok(Frequency::ZERO));
    }

    #[test]
    fn overlap_is_half_open() {
        let a = interval(10.60, 10.68);
        let b = interval(10.65, 10.70);
        let c = interval(10.68, 10.70);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(a.contains_point(ghz(10.60)));
        assert!(!a.contains_point(ghz(10.68)));
    }

    #[test]
    fn inverted_interval_is_rejected() {
        let err = Interval::from_values(2.0, 1.0, FrequencyUnit::GHz);
        assert!(matches!(
            err,
            Err(KernelError::InvalidRecord(message)) if message.contains("start")
        ));
    }

    #[test]
    fn degenerate_interval_widens_deterministically() {
        let first = interval(23.8, 23.8);
        let second = interval(23.8, 23.8);
        assert_eq!(first, second);
        assert!(first.start() < first.stop());
        assert_eq!(first.width(), second.width());
        assert!(first.width().hz() > 0.0);
        assert!(first.contains_point(ghz(23.8)));
    }

    #[test]
    fn degenerate_interval_at_zero_still_widens() {
        let at_zero = match Interval::point(Frequency::ZERO) {
            Ok(interval) => interval,
            Err(err) => panic!("zero point should widen: {err}"),
        };
        assert!(at_zero.stop() > Frequency::ZERO);
    }

    #[test]
    fn ordering_is_by_start_then_stop() {
        let mut intervals = vec![interval(2.0, 3.0), interval(1.0, 5.0), interval(1.0, 2.0)];
        intervals.sort();
        assert_eq!(intervals, vec![interval(1.0, 2.0), interval(1.0, 5.0), interval(2.0, 3.0)]);
    }

    #[test]
    fn adjacency_and_hull() {
        let low = interval(1.0, 2.0);
        let high = interval(2.0, 3.0);
        assert!(low.is_adjacent(&high));
        assert!(!low.overlaps(&high));
        assert_eq!(low.hull(&high), interval(1.0, 3.0));
        assert_eq!(low.hull(&high).center(), ghz(2.0));
        assert!(low.padded().overlaps(&high));
        assert!(!low.padded().overlaps(&interval(2.1, 3.0)));
    }

    #[test]
    fn ranges_up_to_100_khz_are_trivial() {
        assert!(interval(23.8, 23.800_000_001).is_trivial());
        assert!(interval(23.8, 23.800_05).is_trivial());
        assert!(!interval(23.8, 23.8002).is_trivial());
        match Interval::from_values(0.0, 0.0, FrequencyUnit::Hz) {
            Ok(origin) => assert_eq!(origin.padded().start(), Frequency::ZERO),
            Err(err) => panic!("fixture should be valid: {err}"),
        }
    }

    #[test]
    fn display_picks_a_readable_unit() {
        assert_eq!(ghz(10.6).to_string(), "10.6 GHz");
        assert_eq!(interval(1.4, 1.427).to_string(), "1.4 GHz-1.427 GHz");
        match Frequency::new(8.3, FrequencyUnit::KHz) {
            Ok(frequency) => assert_eq!(frequency.to_string(), "8.3 kHz"),
            Err(err) => panic!("fixture should be valid: {err}"),
        }
    }

    #[test]
    fn serde_rejects_inverted_bounds() {
        let raw = r#"{"start":2000000000.0,"stop":1000000000.0}"#;
        assert!(serde_json::from_str::<Interval>(raw).is_err());
        let ok = r#"{"start":1000000000.0,"stop":2000000000.0}"#;
        match serde_json::from_str::<Interval>(ok) {
            Ok(parsed) => assert_eq!(parsed, interval(1.0, 2.0)),
            Err(err) => panic!("valid interval should deserialize: {err}"),
        }
    }
}
