//! Optimal posting time recommendations.
//!
//! Candidates are generated over a date window, scored by historical engagement, platform
//! best-practice times, time of day, and day of week, then ranked.

mod goal;
mod history;
mod optimizer;
mod platform;

pub use chrono_tz::Tz;
pub use goal::{DateRange, InputError, OptimizationGoal};
pub use history::{DayBucket, Engagement, HistoricalInsights, HourBucket};
pub use optimizer::{
    select_schedule_time, AlternativeTime, AnalysisFactors, ComponentScores, OptimizeError,
    Recommendation, ScoredSlot, TimeOptimizer, DEFAULT_ENGAGEMENT_NORMALIZATION,
};
pub use platform::{best_times, BestTime};

/// Parse an IANA timezone name (e.g. `America/New_York`).
pub fn parse_timezone(name: &str) -> Result<Tz, InputError> {
    name.parse::<Tz>().map_err(|_| InputError::Timezone(name.to_string()))
}
