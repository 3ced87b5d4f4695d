//! Risk tiers derived from a default probability

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Label shown to the operator
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "Low Risk Customer",
            RiskTier::Medium => "Medium Risk Customer",
            RiskTier::High => "High Risk Customer",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("thresholds must lie in [0, 1] (medium={medium}, high={high})")]
    OutOfRange { medium: f64, high: f64 },

    #[error("medium threshold {medium} exceeds high threshold {high}")]
    Inverted { medium: f64, high: f64 },
}

/// Cut points between tiers
///
/// Both comparisons are strict: a probability exactly on a cut point falls
/// into the lower tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// `p > high` is HIGH
    pub high: f64,
    /// `p > medium` is MEDIUM
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: 0.5,
            medium: 0.3,
        }
    }
}

impl RiskThresholds {
    pub fn new(medium: f64, high: f64) -> Result<Self, ThresholdError> {
        let thresholds = Self { high, medium };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Requires `0 <= medium <= high <= 1`
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.medium) || !in_unit(self.high) {
            return Err(ThresholdError::OutOfRange {
                medium: self.medium,
                high: self.high,
            });
        }
        if self.medium > self.high {
            return Err(ThresholdError::Inverted {
                medium: self.medium,
                high: self.high,
            });
        }
        Ok(())
    }

    pub fn classify(&self, probability: f64) -> RiskTier {
        if probability > self.high {
            RiskTier::High
        } else if probability > self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Probability of default with its tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub tier: RiskTier,
}

impl PredictionResult {
    pub fn new(probability: f64, thresholds: &RiskThresholds) -> Self {
        Self {
            probability,
            tier: thresholds.classify(probability),
        }
    }

    /// Probability as a percentage with two decimals, e.g. `13.12%`
    pub fn percent(&self) -> String {
        format!("{:.2}%", self.probability * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_fall_to_lower_tier() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(0.5), RiskTier::Medium);
        assert_eq!(t.classify(0.50001), RiskTier::High);
        assert_eq!(t.classify(0.3), RiskTier::Low);
        assert_eq!(t.classify(0.30001), RiskTier::Medium);
        assert_eq!(t.classify(0.0), RiskTier::Low);
        assert_eq!(t.classify(1.0), RiskTier::High);
    }

    #[test]
    fn custom_thresholds() {
        let t = RiskThresholds::new(0.1, 0.2).unwrap();
        assert_eq!(t.classify(0.15), RiskTier::Medium);
        assert_eq!(t.classify(0.25), RiskTier::High);

        assert_eq!(
            RiskThresholds::new(0.6, 0.4).unwrap_err(),
            ThresholdError::Inverted { medium: 0.6, high: 0.4 }
        );
        assert!(matches!(
            RiskThresholds::new(-0.1, 0.4),
            Err(ThresholdError::OutOfRange { .. })
        ));
        assert!(matches!(
            RiskThresholds::new(0.1, f64::NAN),
            Err(ThresholdError::OutOfRange { .. })
        ));
    }

    #[test]
    fn labels_and_serde() {
        assert_eq!(RiskTier::High.label(), "High Risk Customer");
        assert_eq!(serde_json::to_string(&RiskTier::Medium).unwrap(), "\"MEDIUM\"");
        assert!(RiskTier::Low < RiskTier::High);
    }

    #[test]
    fn percent_formatting() {
        let r = PredictionResult::new(0.131_234, &RiskThresholds::default());
        assert_eq!(r.percent(), "13.12%");
        assert_eq!(r.tier, RiskTier::Low);
    }

    #[test]
    fn thresholds_partial_toml_uses_defaults() {
        let t: RiskThresholds = toml::from_str("high = 0.7").unwrap();
        assert_eq!(t.high, 0.7);
        assert_eq!(t.medium, 0.3);
    }
}
