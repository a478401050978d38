use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

const AGGRESSIVE_THRESHOLD: i64 = 70;
const MODERATE_THRESHOLD: i64 = 45;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskCategory {
    /// Parses a category label; anything unrecognised yields `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "conservative" => Some(RiskCategory::Conservative),
            "moderate" => Some(RiskCategory::Moderate),
            "aggressive" => Some(RiskCategory::Aggressive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskCategory::Conservative => "conservative",
            RiskCategory::Moderate => "moderate",
            RiskCategory::Aggressive => "aggressive",
        }
    }

    fn from_score(score: i64) -> Self {
        if score >= AGGRESSIVE_THRESHOLD {
            RiskCategory::Aggressive
        } else if score >= MODERATE_THRESHOLD {
            RiskCategory::Moderate
        } else {
            RiskCategory::Conservative
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A low/medium/high questionnaire answer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Level::Low),
            "medium" => Some(Level::Medium),
            "high" => Some(Level::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskQuestionnaire {
    pub age: u32,
    #[serde(alias = "income_stability")]
    pub income_stability: String,
    #[serde(alias = "liquidity_needs")]
    pub liquidity_needs: String,
    #[serde(alias = "investment_knowledge")]
    pub investment_knowledge: String,
    /// Per-question scores; only their sum matters.
    #[serde(default)]
    pub answers: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskProfile {
    pub risk_category: RiskCategory,
    pub score: i64,
    pub explanation: String,
}

fn age_points(age: u32) -> i64 {
    match age {
        0..30 => 25,
        30..45 => 15,
        45..60 => 5,
        _ => -10,
    }
}

fn income_stability_points(level: Option<Level>) -> i64 {
    match level {
        Some(Level::Low) => -10,
        Some(Level::Medium) => 5,
        Some(Level::High) => 15,
        None => 0,
    }
}

// High liquidity needs push towards safer portfolios.
fn liquidity_points(level: Option<Level>) -> i64 {
    match level {
        Some(Level::Low) => 15,
        Some(Level::Medium) => 0,
        Some(Level::High) => -15,
        None => 0,
    }
}

fn knowledge_points(level: Option<Level>) -> i64 {
    match level {
        Some(Level::Low) => -5,
        Some(Level::Medium) => 5,
        Some(Level::High) => 10,
        None => 0,
    }
}

/// Linear weighted score of demographics plus questionnaire answers.
pub fn score_risk(questionnaire: &RiskQuestionnaire) -> RiskProfile {
    let profile_points = age_points(questionnaire.age)
        + income_stability_points(Level::parse(&questionnaire.income_stability))
        + liquidity_points(Level::parse(&questionnaire.liquidity_needs))
        + knowledge_points(Level::parse(&questionnaire.investment_knowledge));
    let score = questionnaire
        .answers
        .values()
        .fold(profile_points, |total, &points| total.saturating_add(points));
    let risk_category = RiskCategory::from_score(score);

    let explanation = format!(
        "Your risk score is {score}. Based on your age ({}), income stability ({}), \
         liquidity needs ({}), investment knowledge ({}), and questionnaire responses, \
         you are categorized as a '{risk_category}' investor.",
        questionnaire.age,
        questionnaire.income_stability,
        questionnaire.liquidity_needs,
        questionnaire.investment_knowledge,
    );

    RiskProfile {
        risk_category,
        score,
        explanation,
    }
}
