//! Class-level statistics over a batch of predictions.

use serde::{Deserialize, Serialize};

use crate::explain::RiskLevel;
use crate::model::PredictionResult;

/// Aggregate counts for one batch of students
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassSummary {
    pub total_students: usize,
    pub at_risk_count: usize,
    /// Share of at-risk students in percent; 0 for an empty batch
    pub at_risk_percentage: f64,
    /// Mean risk probability; 0 for an empty batch
    pub average_risk: f64,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
}

impl ClassSummary {
    /// Reduce a batch of predictions
    ///
    /// Banding follows [`RiskLevel::from_probability`]. An empty batch gives
    /// all zeros.
    #[must_use]
    pub fn summarize(predictions: &[PredictionResult]) -> Self {
        let mut summary = Self {
            total_students: predictions.len(),
            ..Self::default()
        };
        if predictions.is_empty() {
            return summary;
        }

        let mut risk_sum = 0.0;
        for prediction in predictions {
            if prediction.is_at_risk {
                summary.at_risk_count += 1;
            }
            risk_sum += prediction.risk_probability;
            match RiskLevel::from_probability(prediction.risk_probability) {
                RiskLevel::High => summary.high_risk_count += 1,
                RiskLevel::Medium => summary.medium_risk_count += 1,
                RiskLevel::Low => summary.low_risk_count += 1,
            }
        }

        let total = predictions.len() as f64;
        summary.at_risk_percentage = summary.at_risk_count as f64 * 100.0 / total;
        summary.average_risk = risk_sum / total;
        summary
    }

    /// Short multi-line report
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "Students assessed: {}\nAt risk: {} ({:.1}%)\nAverage risk: {:.1}%\n\
             Risk levels: High {}, Medium {}, Low {}",
            self.total_students,
            self.at_risk_count,
            self.at_risk_percentage,
            self.average_risk * 100.0,
            self.high_risk_count,
            self.medium_risk_count,
            self.low_risk_count
        )
    }
}

/// Summarise a batch of predictions
#[must_use]
pub fn summarize(predictions: &[PredictionResult]) -> ClassSummary {
    ClassSummary::summarize(predictions)
}
