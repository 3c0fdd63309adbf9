use serde::{Deserialize, Serialize};

/// The optimization priority a caller states for a selection.
///
/// Labels other than the three known ones decode to `Unspecified` and add no bonus.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Reliability,
    Performance,
    Cost,
    #[default]
    #[serde(other)]
    Unspecified,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Reliability => "reliability",
            Priority::Performance => "performance",
            Priority::Cost => "cost",
            Priority::Unspecified => "unspecified",
        }
    }

    /// Parse a free-form label. Unknown labels are inert rather than an error.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "reliability" => Priority::Reliability,
            "performance" => Priority::Performance,
            "cost" => Priority::Cost,
            _ => Priority::Unspecified,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-factor weights. Not normalized: the combined score is their literal
/// weighted sum, so calibration is up to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Weights {
    pub price: f64,
    pub reliability: f64,
    pub performance: f64,
    pub geographic: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            price: 0.3,
            reliability: 0.3,
            performance: 0.25,
            geographic: 0.15,
        }
    }
}

impl Weights {
    /// Returns the name of the first weight that is negative or not finite.
    pub fn first_invalid(&self) -> Option<&'static str> {
        [
            ("price", self.price),
            ("reliability", self.reliability),
            ("performance", self.performance),
            ("geographic", self.geographic),
        ]
        .into_iter()
        .find(|(_, w)| !w.is_finite() || *w < 0.0)
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectionCriteria {
    #[serde(default)]
    pub priority: Priority,
    /// Reserved. Not used by scoring.
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub weights: Weights,
}

/// Component scores behind a provider's combined score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub health: f64,
    pub performance: f64,
    pub geographic: f64,
    pub price: f64,
    pub priority_bonus: f64,
}
