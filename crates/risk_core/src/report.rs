//! Display payload for one assessment

use crate::service::Assessment;
use crate::tier::RiskTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rows shown in the text rendering
const TEXT_ROWS: usize = 10;

/// One feature's share of the prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationRow {
    pub feature: String,
    pub value: f64,
    /// Push on the log-odds of default; positive raises risk
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Expected log-odds before looking at this customer
    pub baseline: f64,
    /// Ordered by descending absolute contribution
    pub rows: Vec<ExplanationRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub probability: f64,
    /// `probability` as a percentage, two decimals
    pub percent: String,
    pub tier: RiskTier,
    pub label: String,
    pub model_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

impl Report {
    pub fn from_assessment(assessment: &Assessment) -> Self {
        let prediction = &assessment.prediction;
        let explanation = assessment.explanation.as_ref().map(|attribution| {
            let mut rows: Vec<ExplanationRow> = assessment
                .vector
                .iter()
                .zip(attribution.contributions.iter().copied())
                .map(|((feature, value), contribution)| ExplanationRow {
                    feature: feature.to_string(),
                    value,
                    contribution,
                })
                .collect();
            // stable: ties keep schema order
            rows.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
            Explanation {
                baseline: attribution.baseline,
                rows,
            }
        });

        Self {
            probability: prediction.probability,
            percent: prediction.percent(),
            tier: prediction.tier,
            label: prediction.tier.label().to_string(),
            model_hash: assessment.model_hash.clone(),
            explanation,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Probability of default: {}", self.percent)?;
        writeln!(f, "{}", self.label)?;

        if let Some(explanation) = &self.explanation {
            writeln!(f)?;
            writeln!(f, "Feature contributions (log-odds, baseline {:+.4}):", explanation.baseline)?;
            for row in explanation
                .rows
                .iter()
                .filter(|r| r.contribution != 0.0)
                .take(TEXT_ROWS)
            {
                writeln!(
                    f,
                    "  {:<10} {:>14.2} {:>+10.4}",
                    row.feature, row.value, row.contribution
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::Attribution;
    use crate::reconcile::reconcile;
    use crate::schema::{DefaultTable, FeatureSchema, PartialInput};
    use crate::tier::{PredictionResult, RiskThresholds};

    fn assessment(explanation: Option<Attribution>) -> Assessment {
        let schema = FeatureSchema::new(["LIMIT_BAL", "AGE", "PAY_0"]).unwrap();
        let defaults = DefaultTable::new()
            .with("LIMIT_BAL", 50_000.0)
            .with("AGE", 30.0)
            .with("PAY_0", 2.0);
        let vector = reconcile(&schema, &PartialInput::new(), &defaults).unwrap();
        Assessment {
            vector,
            prediction: PredictionResult::new(0.6234, &RiskThresholds::default()),
            explanation,
            model_hash: "ab".repeat(32),
        }
    }

    #[test]
    fn rows_are_sorted_by_magnitude() {
        let report = Report::from_assessment(&assessment(Some(Attribution {
            baseline: -1.0,
            contributions: vec![0.2, -0.05, 1.3],
        })));
        assert_eq!(report.percent, "62.34%");
        assert_eq!(report.tier, RiskTier::High);
        assert_eq!(report.label, "High Risk Customer");

        let rows = &report.explanation.as_ref().unwrap().rows;
        let order: Vec<&str> = rows.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(order, ["PAY_0", "LIMIT_BAL", "AGE"]);
        assert_eq!(rows[0].value, 2.0);
    }

    #[test]
    fn json_omits_missing_explanation() {
        let report = Report::from_assessment(&assessment(None));
        let json = report.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tier"], "HIGH");
        assert_eq!(value["percent"], "62.34%");
        assert!(value.get("explanation").is_none());
    }

    #[test]
    fn text_rendering_skips_zero_rows() {
        let report = Report::from_assessment(&assessment(Some(Attribution {
            baseline: -1.0,
            contributions: vec![0.0, -0.05, 1.3],
        })));
        let text = report.to_string();
        assert!(text.starts_with("Probability of default: 62.34%\nHigh Risk Customer\n"));
        assert!(text.contains("PAY_0"));
        assert!(text.contains("AGE"));
        assert!(!text.contains("LIMIT_BAL"));
    }
}
