use bytes::Bytes;
use serde::{Deserialize, Serialize};

// One line of the cost breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostItem {
    pub description: String,
    pub estimated_cost: f64,
    #[serde(default)]
    pub category: String,
}

// One phase of the schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPhase {
    pub phase_name: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub estimated_cost: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Cost estimate and schedule produced by the analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub project_name: String,
    #[serde(default)]
    pub summary: String,
    pub total_estimated_cost_min: f64,
    pub total_estimated_cost_max: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub breakdown: Vec<CostItem>,
    pub timeline: Vec<ProjectPhase>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub design_style_suggestions: Vec<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualInputItem {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub quantity: String,
}

// What the user asked for alongside the upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInputs {
    pub prompt: String,
    pub style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labor_hours: Option<String>,
    #[serde(default)]
    pub manual_materials: Vec<ManualInputItem>,
}

impl ProjectInputs {
    pub fn new(prompt: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: style.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

// Result of a recorded walkthrough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationAnalysis {
    pub transcription: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub suggested_materials: Vec<String>,
    pub estimated_complexity: Complexity,
}

// One image of a multi-angle upload
#[derive(Debug, Clone)]
pub struct BatchImage {
    pub data: Bytes,
    pub mime_type: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInsight {
    pub label: String,
    pub insights: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysis {
    pub combined_analysis: Quote,
    pub image_insights: Vec<ImageInsight>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_defaults_optional_fields() {
        let quote: Quote = serde_json::from_str(
            r#"{
                "projectName": "Kitchen",
                "totalEstimatedCostMin": 12000,
                "totalEstimatedCostMax": 18000,
                "breakdown": [{"description": "Cabinets", "estimatedCost": 6000}],
                "timeline": [{"phaseName": "Demolition"}]
            }"#,
        )
        .unwrap();
        assert_eq!(quote.currency, "USD");
        assert!(quote.materials.is_empty());
        assert_eq!(quote.breakdown[0].category, "");
        assert!(quote.timeline[0].tasks.is_empty());
    }

    #[test]
    fn quote_requires_totals() {
        let parsed = serde_json::from_str::<Quote>(
            r#"{"projectName": "Kitchen", "breakdown": [], "timeline": []}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn image_size_uses_short_labels() {
        let size: ImageSize = serde_json::from_str("\"4K\"").unwrap();
        assert_eq!(size, ImageSize::FourK);
        assert_eq!(serde_json::to_string(&ImageSize::TwoK).unwrap(), "\"2K\"");
    }
}
