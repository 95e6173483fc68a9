//! Caller-chosen inputs: optimization goal and scheduling window.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Invalid optimization goal '{0}'. Must be one of: engagement, reach, clicks, general")]
    Goal(String),
    #[error(
        "Invalid date range '{0}'. Must be one of: next_24h, next_48h, next_7_days, next_14_days"
    )]
    DateRange(String),
    #[error("Unknown timezone '{0}'")]
    Timezone(String),
}

/// What the caller wants to maximize. Only changes how historical engagement is weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationGoal {
    #[default]
    Engagement,
    Reach,
    Clicks,
    General,
}

impl OptimizationGoal {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationGoal::Engagement => "engagement",
            OptimizationGoal::Reach => "reach",
            OptimizationGoal::Clicks => "clicks",
            OptimizationGoal::General => "general",
        }
    }
}

impl std::fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationGoal {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "engagement" => Ok(OptimizationGoal::Engagement),
            "reach" => Ok(OptimizationGoal::Reach),
            "clicks" => Ok(OptimizationGoal::Clicks),
            "general" => Ok(OptimizationGoal::General),
            other => Err(InputError::Goal(other.to_string())),
        }
    }
}

/// Window in which candidate slots are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "next_24h")]
    Next24h,
    #[serde(rename = "next_48h")]
    Next48h,
    #[default]
    #[serde(rename = "next_7_days")]
    Next7Days,
    #[serde(rename = "next_14_days")]
    Next14Days,
}

impl DateRange {
    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::Next24h => "next_24h",
            DateRange::Next48h => "next_48h",
            DateRange::Next7Days => "next_7_days",
            DateRange::Next14Days => "next_14_days",
        }
    }

    /// Unrecognized names fall back to the 7-day window.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    pub fn span_days(self) -> i64 {
        match self {
            DateRange::Next24h => 1,
            DateRange::Next48h => 2,
            DateRange::Next7Days => 7,
            DateRange::Next14Days => 14,
        }
    }

    /// Spacing between candidate slots.
    pub fn step_hours(self) -> i64 {
        match self {
            DateRange::Next24h => 2,
            DateRange::Next48h => 3,
            DateRange::Next7Days => 6,
            DateRange::Next14Days => 12,
        }
    }
}

impl FromStr for DateRange {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next_24h" => Ok(DateRange::Next24h),
            "next_48h" => Ok(DateRange::Next48h),
            "next_7_days" => Ok(DateRange::Next7Days),
            "next_14_days" => Ok(DateRange::Next14Days),
            other => Err(InputError::DateRange(other.to_string())),
        }
    }
}
