use serde::{Deserialize, Serialize};
use spectrum_kernel_core::{Frequency, FrequencyUnit, KernelError};

/// Units assumed for numbers that arrive without one.
///
/// Table rows usually state bounds as bare numbers with the unit given once
/// in a section heading, and catalog exports put units in column headers.
/// Callers say which units apply; nothing is guessed from magnitudes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct UnitContext {
    pub bounds: FrequencyUnit,
    pub catalog_frequency: FrequencyUnit,
    pub catalog_bandwidth: FrequencyUnit,
}

impl Default for UnitContext {
    /// kHz table bounds; GHz frequencies with MHz bandwidths as in the
    /// Earth-observation catalog export.
    fn default() -> Self {
        Self {
            bounds: FrequencyUnit::KHz,
            catalog_frequency: FrequencyUnit::GHz,
            catalog_bandwidth: FrequencyUnit::MHz,
        }
    }
}

impl UnitContext {
    #[must_use]
    pub fn with_bounds(mut self, unit: FrequencyUnit) -> Self {
        self.bounds = unit;
        self
    }

    /// Units of the satellite-communications catalog export (MHz, kHz).
    #[must_use]
    pub fn communications_catalog() -> Self {
        Self {
            catalog_frequency: FrequencyUnit::MHz,
            catalog_bandwidth: FrequencyUnit::KHz,
            ..Self::default()
        }
    }

    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for negative or non-finite values.
    pub fn bound(&self, value: f64, unit: Option<FrequencyUnit>) -> Result<Frequency, KernelError> {
        Frequency::new(value, unit.unwrap_or(self.bounds))
    }

    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for negative or non-finite values.
    pub fn catalog_frequency(
        &self,
        value: f64,
        unit: Option<FrequencyUnit>,
    ) -> Result<Frequency, KernelError> {
        Frequency::new(value, unit.unwrap_or(self.catalog_frequency))
    }

    /// # Errors
    /// Returns [`KernelError::InvalidRecord`] for negative or non-finite values.
    pub fn catalog_bandwidth(
        &self,
        value: f64,
        unit: Option<FrequencyUnit>,
    ) -> Result<Frequency, KernelError> {
        Frequency::new(value, unit.unwrap_or(self.catalog_bandwidth))
    }
}
