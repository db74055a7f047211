//! Demographic rates and their parameter defaults.
//!
//! The reference components read their rates from the model's parameter
//! set. [`DemographyConfig`] bundles those tunables with their defaults so
//! callers can seed a [`ParameterSet`] before resolving file and
//! command-line overrides.

use metapop_core::{ParameterError, ParameterSet};

/// Default crude birth rate, births per 1000 people per year.
pub const DEFAULT_CBR: f64 = 35.0;

/// Default crude death rate, deaths per 1000 people per year.
pub const DEFAULT_CDR: f64 = 17.0;

/// Default duration of maternal antibody protection, in ticks.
pub const DEFAULT_MA_DURATION: i64 = 180;

/// Days per year used to turn annual rates into per-tick rates.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Rates used by the reference components.
#[derive(Debug, Clone, PartialEq)]
pub struct DemographyConfig {
    /// Crude birth rate (default: 35.0).
    pub cbr: f64,

    /// Crude death rate (default: 17.0).
    pub cdr: f64,

    /// Ticks of maternal antibody protection for newborns (default: 180).
    pub ma_duration: i64,
}

impl Default for DemographyConfig {
    fn default() -> Self {
        Self {
            cbr: DEFAULT_CBR,
            cdr: DEFAULT_CDR,
            ma_duration: DEFAULT_MA_DURATION,
        }
    }
}

impl DemographyConfig {
    /// Read every rate from `params`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] if a rate is missing or mistyped.
    pub fn from_params(params: &ParameterSet) -> Result<Self, ParameterError> {
        Ok(Self {
            cbr: params.float("cbr")?,
            cdr: params.float("cdr")?,
            ma_duration: params.int("ma_duration")?,
        })
    }

    /// The rates as parameters.
    pub fn to_params(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.set("cbr", self.cbr);
        params.set("cdr", self.cdr);
        params.set("ma_duration", self.ma_duration);
        params
    }
}

/// Core defaults plus the reference components' rates.
pub fn component_defaults() -> ParameterSet {
    let mut params = ParameterSet::defaults();
    params.merge(DemographyConfig::default().to_params());
    params
}

/// Convert an annual per-1000 rate into a per-person, per-tick probability.
pub fn daily_rate(per_thousand_per_year: f64) -> f64 {
    per_thousand_per_year / 1000.0 / DAYS_PER_YEAR
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_params() {
        let params = component_defaults();
        let config = DemographyConfig::from_params(&params).unwrap();
        assert_eq!(config, DemographyConfig::default());
        assert_eq!(params.nticks().unwrap(), 365);
    }

    #[test]
    fn overrides_reach_config() {
        let mut params = component_defaults();
        params.apply_override("cbr=40").unwrap();
        let config = DemographyConfig::from_params(&params).unwrap();
        assert_eq!(config.cbr, 40.0);
    }

    #[test]
    fn missing_rate_is_an_error() {
        let params = ParameterSet::defaults();
        assert!(matches!(
            DemographyConfig::from_params(&params),
            Err(ParameterError::Unknown { .. })
        ));
    }

    #[test]
    fn daily_rate_scales_annual_per_thousand() {
        assert!((daily_rate(365.0) - 0.001).abs() < 1e-12);
    }
}
