use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// PriceEstimate
///
/// Inclusive price range (in whole currency units) for a project quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq, Default)]
#[ts(export)]
pub struct PriceEstimate {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum EstimateError {
    #[error("invalid quote answers: {0}")]
    Malformed(String),
    #[error("pages must be at most 200")]
    TooManyPages,
}

const MAX_PAGES: u32 = 200;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Landing,
    Corporate,
    Ecommerce,
    WebApp,
    MobileApp,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DesignLevel {
    #[default]
    Template,
    Custom,
    Premium,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    #[default]
    Standard,
    Fast,
    Urgent,
}

/// QuoteAnswers
///
/// Typed view of the questionnaire. Unknown keys are ignored so the frontend
/// can add informational questions without breaking the estimate.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteAnswers {
    pub project_type: ProjectType,
    pub pages: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub design: DesignLevel,
    #[serde(default)]
    pub timeline: Timeline,
    pub has_content: Option<bool>,
}

impl ProjectType {
    fn base(self) -> (i64, i64) {
        match self {
            ProjectType::Landing => (300, 600),
            ProjectType::Corporate => (800, 1500),
            ProjectType::Ecommerce => (1500, 3000),
            ProjectType::WebApp => (2500, 6000),
            ProjectType::MobileApp => (4000, 9000),
        }
    }

    fn included_pages(self) -> u32 {
        match self {
            ProjectType::Landing => 1,
            ProjectType::Corporate => 5,
            ProjectType::Ecommerce => 10,
            ProjectType::WebApp | ProjectType::MobileApp => 8,
        }
    }
}

impl DesignLevel {
    fn percent(self) -> i64 {
        match self {
            DesignLevel::Template => 100,
            DesignLevel::Custom => 130,
            DesignLevel::Premium => 160,
        }
    }
}

impl Timeline {
    fn percent(self) -> i64 {
        match self {
            Timeline::Standard => 100,
            Timeline::Fast => 125,
            Timeline::Urgent => 150,
        }
    }
}

const EXTRA_PAGE: (i64, i64) = (60, 120);
const CONTENT_CREATION: (i64, i64) = (150, 400);

fn feature_cost(feature: &str) -> Option<(i64, i64)> {
    let cost = match feature {
        "auth" => (300, 600),
        "payments" => (400, 900),
        "admin_panel" => (600, 1400),
        "blog" => (200, 450),
        "i18n" => (250, 500),
        "integrations" => (350, 800),
        "analytics" => (150, 300),
        "chat" => (500, 1100),
        _ => return None,
    };
    Some(cost)
}

fn round_to_ten(value: i64) -> i64 {
    (value + 5) / 10 * 10
}

/// estimate
///
/// Deterministic price range for a questionnaire payload. The same answers
/// always produce the same range; there is no hidden state.
pub fn estimate(answers: &Value) -> Result<PriceEstimate, EstimateError> {
    let answers: QuoteAnswers = serde_json::from_value(answers.clone())
        .map_err(|e| EstimateError::Malformed(e.to_string()))?;
    estimate_answers(&answers)
}

pub fn estimate_answers(answers: &QuoteAnswers) -> Result<PriceEstimate, EstimateError> {
    let (mut min, mut max) = answers.project_type.base();

    let included = answers.project_type.included_pages();
    let pages = answers.pages.unwrap_or(included);
    if pages > MAX_PAGES {
        return Err(EstimateError::TooManyPages);
    }
    let extra = i64::from(pages.saturating_sub(included));
    min += extra * EXTRA_PAGE.0;
    max += extra * EXTRA_PAGE.1;

    // BTreeSet dedupes and keeps the summation order stable.
    let features: BTreeSet<&str> = answers.features.iter().map(String::as_str).collect();
    for (fmin, fmax) in features.into_iter().filter_map(feature_cost) {
        min += fmin;
        max += fmax;
    }

    let factor = answers.design.percent() * answers.timeline.percent();
    min = min * factor / 10_000;
    max = max * factor / 10_000;

    if answers.has_content == Some(false) {
        min += CONTENT_CREATION.0;
        max += CONTENT_CREATION.1;
    }

    Ok(PriceEstimate {
        min: round_to_ten(min),
        max: round_to_ten(max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn landing_page_defaults_to_base_range() {
        let est = estimate(&json!({ "project_type": "landing" })).unwrap();
        assert_eq!(est, PriceEstimate { min: 300, max: 600 });
    }

    #[test]
    fn extra_pages_features_and_multipliers_compose() {
        let est = estimate(&json!({
            "project_type": "corporate",
            "pages": 7,
            "features": ["blog", "auth", "blog", "teleport"],
            "design": "custom",
            "timeline": "standard",
            "has_content": true
        }))
        .unwrap();
        // base 800-1500, +2 pages 120-240, blog 200-450, auth 300-600 => 1420-2790, x1.3
        assert_eq!(est, PriceEstimate { min: 1850, max: 3630 });
    }

    #[test]
    fn missing_content_is_added_after_multipliers() {
        let est = estimate(&json!({
            "project_type": "landing",
            "timeline": "urgent",
            "has_content": false
        }))
        .unwrap();
        assert_eq!(est, PriceEstimate { min: 600, max: 1300 });
    }

    #[test]
    fn same_answers_same_estimate() {
        let answers = json!({ "project_type": "web_app", "features": ["chat", "i18n"] });
        assert_eq!(estimate(&answers).unwrap(), estimate(&answers).unwrap());
    }

    #[test]
    fn rejects_unknown_project_type_and_page_overflow() {
        assert!(matches!(
            estimate(&json!({ "project_type": "spaceship" })),
            Err(EstimateError::Malformed(_))
        ));
        assert_eq!(
            estimate(&json!({ "project_type": "landing", "pages": 500 })),
            Err(EstimateError::TooManyPages)
        );
    }
}
