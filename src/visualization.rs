//! Chart-type hints inferred from question phrasing.

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationType {
    Line,
    Bar,
    GroupedBar,
    Pie,
    Map,
}

impl VisualizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationType::Line => "line",
            VisualizationType::Bar => "bar",
            VisualizationType::GroupedBar => "grouped_bar",
            VisualizationType::Pie => "pie",
            VisualizationType::Map => "map",
        }
    }
}

impl fmt::Display for VisualizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VisualizationType {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "line" => Ok(VisualizationType::Line),
            "bar" => Ok(VisualizationType::Bar),
            "grouped_bar" | "grouped bar" => Ok(VisualizationType::GroupedBar),
            "pie" => Ok(VisualizationType::Pie),
            "map" => Ok(VisualizationType::Map),
            other => Err(AssistantError::InvalidFilter(format!(
                "Unknown visualization type '{}'",
                other
            ))),
        }
    }
}

/// Ordered phrase rules; the first rule with a matching phrase decides.
const VISUALIZATION_RULES: &[(VisualizationType, &[&str])] = &[
    (
        VisualizationType::Line,
        &[
            "trend", "over time", "monthly", "per month", "timeline", "growth", "اتجاه",
            "على مدار", "الشهرية", "شهري", "نمو",
        ],
    ),
    (
        VisualizationType::Map,
        &[
            "by emirate", "per emirate", "by region", "across emirates", "by location", "map",
            "حسب الإمارة", "حسب المنطقة", "خريطة",
        ],
    ),
    (
        VisualizationType::GroupedBar,
        &["compare", "comparison", "versus", " vs ", "قارن", "مقارنة"],
    ),
    (
        VisualizationType::Pie,
        &["distribution", "breakdown", "share", "proportion", "percentage", "توزيع", "نسبة", "تفصيل"],
    ),
    (
        VisualizationType::Bar,
        &["most common", "top", "highest", "ranking", "الأكثر", "أعلى"],
    ),
];

/// Infer a chart hint from the question. `None` means no chart.
pub fn infer_visualization(text: &str) -> Option<VisualizationType> {
    let text_lower = text.to_lowercase();
    VISUALIZATION_RULES
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| text_lower.contains(p)))
        .map(|(viz, _)| *viz)
}
