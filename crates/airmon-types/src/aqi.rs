//! Particulate air-quality categories.
//!
//! Categories follow the EPA 24-hour PM2.5 and PM10 breakpoint tables, applied
//! to instantaneous concentrations. When the two pollutants land in different
//! bands the worse band wins.
//!
//! # Example
//!
//! ```
//! use airmon_types::{AqiCategory, classify};
//!
//! assert_eq!(classify(10.0, 20.0), AqiCategory::Good);
//! assert_eq!(classify(10.0, 200.0), AqiCategory::UnhealthySensitive);
//! assert_eq!(classify(300.0, 0.0), AqiCategory::Hazardous);
//! ```

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bounds (inclusive, µg/m³) of the PM2.5 bands, Good through Very Unhealthy.
pub const PM25_BREAKPOINTS: [f64; 5] = [12.0, 35.4, 55.4, 150.4, 250.4];

/// Upper bounds (inclusive, µg/m³) of the PM10 bands, Good through Very Unhealthy.
pub const PM10_BREAKPOINTS: [f64; 5] = [54.0, 154.0, 254.0, 354.0, 424.0];

/// Air-quality category, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AqiCategory {
    Good,
    Moderate,
    /// Unhealthy for sensitive groups.
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// All categories in ascending severity.
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthySensitive,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    /// Human-readable label, as shown on the dashboard and written to the session log.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Stable machine-readable key.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            AqiCategory::Good => "good",
            AqiCategory::Moderate => "moderate",
            AqiCategory::UnhealthySensitive => "unhealthy_sensitive",
            AqiCategory::Unhealthy => "unhealthy",
            AqiCategory::VeryUnhealthy => "very_unhealthy",
            AqiCategory::Hazardous => "hazardous",
        }
    }

    /// Short health advisory for this category.
    #[must_use]
    pub fn advisory(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Air quality is satisfactory",
            AqiCategory::Moderate => "Unusually sensitive people should limit prolonged exertion",
            AqiCategory::UnhealthySensitive => {
                "Sensitive groups should reduce prolonged or heavy exertion"
            }
            AqiCategory::Unhealthy => "Everyone should reduce prolonged or heavy exertion",
            AqiCategory::VeryUnhealthy => "Avoid prolonged exertion; consider air filtration",
            AqiCategory::Hazardous => "Avoid all physical activity; stay indoors with filtered air",
        }
    }

    /// Severity rank, 0 (Good) through 5 (Hazardous).
    #[must_use]
    pub fn severity(&self) -> u8 {
        *self as u8
    }

    fn from_band(band: usize) -> Self {
        Self::ALL[band.min(Self::ALL.len() - 1)]
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Index of the first band whose upper bound contains `value`.
///
/// Negative and NaN inputs count as zero; values above every bound fall in
/// the final (Hazardous) band.
fn band(value: f64, breakpoints: &[f64; 5]) -> usize {
    let value = if value.is_nan() { 0.0 } else { value.max(0.0) };
    breakpoints
        .iter()
        .position(|&upper| value <= upper)
        .unwrap_or(breakpoints.len())
}

/// Category for a PM2.5 concentration alone.
#[must_use]
pub fn classify_pm25(pm2_5: f64) -> AqiCategory {
    AqiCategory::from_band(band(pm2_5, &PM25_BREAKPOINTS))
}

/// Category for a PM10 concentration alone.
#[must_use]
pub fn classify_pm10(pm10: f64) -> AqiCategory {
    AqiCategory::from_band(band(pm10, &PM10_BREAKPOINTS))
}

/// Category for a pair of concentrations: the worse of the two bands.
#[must_use]
pub fn classify(pm2_5: f64, pm10: f64) -> AqiCategory {
    classify_pm25(pm2_5).max(classify_pm10(pm10))
}


/// Property tests for the classifier.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Same inputs always give the same category.
        #[test]
        fn classify_is_deterministic(pm25 in any::<f64>(), pm10 in any::<f64>()) {
            prop_assert_eq!(classify(pm25, pm10), classify(pm25, pm10));
        }

        /// Raising PM2.5 never lowers the category.
        #[test]
        fn classify_monotonic_in_pm25(
            a in 0.0f64..1000.0,
            delta in 0.0f64..1000.0,
            pm10 in 0.0f64..1000.0,
        ) {
            prop_assert!(classify(a, pm10) <= classify(a + delta, pm10));
        }

        /// Raising PM10 never lowers the category.
        #[test]
        fn classify_monotonic_in_pm10(
            pm25 in 0.0f64..1000.0,
            a in 0.0f64..1000.0,
            delta in 0.0f64..1000.0,
        ) {
            prop_assert!(classify(pm25, a) <= classify(pm25, a + delta));
        }

        /// The combined category is the worse of the single-pollutant ones.
        #[test]
        fn classify_takes_worse_band(pm25 in 0.0f64..600.0, pm10 in 0.0f64..600.0) {
            let combined = classify(pm25, pm10);
            prop_assert!(combined >= classify_pm25(pm25));
            prop_assert!(combined >= classify_pm10(pm10));
            prop_assert!(combined == classify_pm25(pm25) || combined == classify_pm10(pm10));
        }
    }
}
