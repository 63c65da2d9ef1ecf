//! Rule-based explanation of a single prediction.
//!
//! A fixed table of signals is checked in order against the student's
//! record. Each breached signal contributes one risk factor and one matching
//! recommendation; absent or non-numeric signals are skipped.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::{StudentRecord, Value};
use crate::model::PredictionResult;

/// Probability above which the risk level is High
pub const HIGH_RISK_PROBABILITY: f64 = 0.7;
/// Probability above which the risk level is at least Medium
pub const MEDIUM_RISK_PROBABILITY: f64 = 0.4;
/// Number of risk factors cited in an at-risk explanation
pub const MAX_CITED_FACTORS: usize = 3;

/// Recommendations given to students predicted not at risk
pub const MAINTENANCE_RECOMMENDATIONS: [&str; 2] =
    ["Maintain current study habits", "Continue regular attendance"];

/// Three-band categorisation of the risk probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// High above 0.7, Medium above 0.4 up to 0.7, Low otherwise
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability > HIGH_RISK_PROBABILITY {
            Self::High
        } else if probability > MEDIUM_RISK_PROBABILITY {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable account of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// One-sentence summary
    pub explanation: String,
    /// Breached signals in check order
    pub risk_factors: Vec<String>,
    /// Advice, one per factor for at-risk students
    pub recommendations: Vec<String>,
    /// Band of the risk probability
    pub risk_level: RiskLevel,
}

#[derive(Clone, Copy)]
enum Breach {
    Below(f64),
    Above(f64),
}

impl Breach {
    fn is_breached(self, value: f64) -> bool {
        match self {
            Self::Below(limit) => value < limit,
            Self::Above(limit) => value > limit,
        }
    }
}

struct Signal {
    /// Column names after lowercasing and removing `_` and spaces
    aliases: &'static [&'static str],
    breach: Breach,
    factor: fn(f64) -> String,
    recommendation: &'static str,
}

static SIGNALS: [Signal; 6] = [
    Signal {
        aliases: &["attendance"],
        breach: Breach::Below(75.0),
        factor: |v| format!("Low attendance ({}%)", Value::Number(v)),
        recommendation: "Improve attendance to at least 75%",
    },
    Signal {
        aliases: &["studyhoursperweek", "studyhours"],
        breach: Breach::Below(10.0),
        factor: |v| format!("Insufficient study time ({} hours/week)", Value::Number(v)),
        recommendation: "Increase study hours to at least 10 hours per week",
    },
    Signal {
        aliases: &["previousgrade", "priorgrade"],
        breach: Breach::Below(60.0),
        factor: |v| format!("Low previous grades ({}%)", Value::Number(v)),
        recommendation: "Seek tutoring or extra help to improve grades",
    },
    Signal {
        aliases: &["averagescore"],
        breach: Breach::Below(60.0),
        factor: |v| format!("Low average score ({v:.1}%)"),
        recommendation: "Focus on understanding core concepts",
    },
    Signal {
        aliases: &["participationrate"],
        breach: Breach::Below(50.0),
        factor: |v| format!("Low class participation ({v:.1}%)"),
        recommendation: "Participate more actively in class discussions",
    },
    Signal {
        aliases: &["failurerate"],
        breach: Breach::Above(30.0),
        factor: |v| format!("High failure rate ({v:.1}%)"),
        recommendation: "Focus on improving performance in failing subjects",
    },
];

fn normalise_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}

/// First numeric value in `record` whose column matches one of `aliases`
fn signal_value(record: &StudentRecord, aliases: &[&str]) -> Option<f64> {
    record
        .iter()
        .find(|(name, _)| aliases.contains(&normalise_name(name).as_str()))
        .and_then(|(_, value)| value.as_f64())
        .filter(|v| v.is_finite())
}

/// Stateless explanation generator
#[derive(Debug, Clone, Copy, Default)]
pub struct Explainer;

impl Explainer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Explain one prediction from the student's feature values
    ///
    /// # Arguments
    /// * `record` - The student's values, matched to signals by column name
    /// * `prediction` - Label and risk probability for that student
    #[must_use]
    pub fn explain(&self, record: &StudentRecord, prediction: &PredictionResult) -> Explanation {
        let mut risk_factors = Vec::new();
        let mut recommendations = Vec::new();
        for signal in &SIGNALS {
            let Some(value) = signal_value(record, signal.aliases) else {
                continue;
            };
            if signal.breach.is_breached(value) {
                risk_factors.push((signal.factor)(value));
                recommendations.push(signal.recommendation.to_string());
            }
        }

        let percent = prediction.risk_probability * 100.0;
        let explanation = if prediction.is_at_risk {
            if risk_factors.is_empty() {
                format!(
                    "Student is at risk (confidence: {percent:.1}%) based on overall performance patterns."
                )
            } else {
                let cited = risk_factors
                    .iter()
                    .take(MAX_CITED_FACTORS)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Student is at risk (confidence: {percent:.1}%). Main concerns: {cited}")
            }
        } else {
            recommendations = MAINTENANCE_RECOMMENDATIONS
                .iter()
                .map(|r| (*r).to_string())
                .collect();
            format!(
                "Student is performing well (risk probability: {percent:.1}%). Keep up the good work!"
            )
        };

        Explanation {
            explanation,
            risk_factors,
            recommendations,
            risk_level: RiskLevel::from_probability(prediction.risk_probability),
        }
    }
}
