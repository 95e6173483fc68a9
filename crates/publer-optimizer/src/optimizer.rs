use crate::goal::{DateRange, OptimizationGoal};
use crate::history::HistoricalInsights;
use crate::platform::{
    best_practice_score, best_times, day_of_week_score, localize, localize_one, time_of_day_score,
    weekday_name, LocalBestTime,
};
use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

/// Divisor applied to a bucket's mean engagement before clamping it to `[0, 1]`.
pub const DEFAULT_ENGAGEMENT_NORMALIZATION: f64 = 100.0;

const DEFAULT_SCORE: f64 = 0.3;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;
const FALLBACK_CONFIDENCE: f64 = 0.6;
const MAX_ALTERNATIVES: usize = 3;
const MAX_REASONS: usize = 3;
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptimizeError {
    #[error("candidate window '{0}' runs past the supported date range")]
    OutOfRange(String),
}

/// Per-factor sub-scores. `historical` is `None` without usable history and is then left out
/// of the mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScores {
    pub historical: Option<f64>,
    pub platform_best_practices: f64,
    pub time_of_day: f64,
    pub day_of_week: f64,
}

impl ComponentScores {
    fn total(&self) -> f64 {
        let applicable: Vec<f64> = [
            self.historical,
            Some(self.platform_best_practices),
            Some(self.time_of_day),
            Some(self.day_of_week),
        ]
        .into_iter()
        .flatten()
        .collect();
        if applicable.is_empty() {
            DEFAULT_SCORE
        } else {
            applicable.iter().sum::<f64>() / applicable.len() as f64
        }
    }
}

/// One scored candidate slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSlot {
    pub instant: DateTime<FixedOffset>,
    pub total_score: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub component_scores: ComponentScores,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeTime {
    pub datetime: DateTime<FixedOffset>,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFactors {
    pub historical_data_available: bool,
    pub platform_best_practices: bool,
    pub timezone_optimization: bool,
    pub goal_optimization: OptimizationGoal,
}

/// Recommended posting time for one platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub platform: String,
    pub optimal_time: DateTime<FixedOffset>,
    pub confidence: f64,
    pub expected_engagement: &'static str,
    pub reasoning: String,
    pub alternative_times: Vec<AlternativeTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_scores: Option<ComponentScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_factors: Option<AnalysisFactors>,
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ranks candidate posting slots in one target timezone for one optimization goal.
#[derive(Debug, Clone)]
pub struct TimeOptimizer {
    timezone: Tz,
    goal: OptimizationGoal,
    normalization: f64,
}

impl TimeOptimizer {
    pub fn new(timezone: Tz, goal: OptimizationGoal) -> Self {
        Self {
            timezone,
            goal,
            normalization: DEFAULT_ENGAGEMENT_NORMALIZATION,
        }
    }

    /// Override the historical normalization divisor. Non-positive values are ignored.
    pub fn with_normalization(mut self, normalization: f64) -> Self {
        if normalization > 0.0 && normalization.is_finite() {
            self.normalization = normalization;
        }
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn goal(&self) -> OptimizationGoal {
        self.goal
    }

    pub fn find_optimal_time(
        &self,
        platform: &str,
        analytics: Option<&Value>,
        range: DateRange,
    ) -> Recommendation {
        let now = Utc::now().with_timezone(&self.timezone);
        self.find_optimal_time_at(now, platform, analytics, range)
    }

    /// Recommend a slot relative to an explicit `now`. Never fails: any scoring problem
    /// produces a fallback recommendation instead.
    pub fn find_optimal_time_at(
        &self,
        now: DateTime<Tz>,
        platform: &str,
        analytics: Option<&Value>,
        range: DateRange,
    ) -> Recommendation {
        let insights = HistoricalInsights::analyze(analytics, self.goal, &self.timezone);
        let slots = match self.score_with(now, platform, &insights, range) {
            Ok(slots) => slots,
            Err(e) => {
                tracing::warn!(platform, error = %e, "time optimization failed, using fallback");
                return self.fallback(now, platform, Some(format!("Optimization error: {}", e)));
            }
        };
        if slots.is_empty() {
            tracing::warn!(platform, range = %range.as_str(), "no candidate slots, using fallback");
            return self.fallback(now, platform, None);
        }

        let chosen = self.select(&slots);
        let best = &slots[chosen];
        let alternative_times = slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != chosen)
            .take(MAX_ALTERNATIVES)
            .map(|(_, s)| AlternativeTime {
                datetime: s.instant,
                confidence: s.confidence,
                reasoning: s.reasoning.clone(),
            })
            .collect();

        tracing::debug!(
            platform,
            goal = %self.goal,
            optimal_time = %best.instant,
            score = best.total_score,
            candidates = slots.len(),
            "optimal time selected"
        );

        Recommendation {
            platform: platform.to_string(),
            optimal_time: best.instant,
            confidence: best.confidence,
            expected_engagement: expected_engagement(best.total_score),
            reasoning: best.reasoning.clone(),
            alternative_times,
            component_scores: Some(best.component_scores),
            analysis_factors: Some(AnalysisFactors {
                historical_data_available: insights.has_data(),
                platform_best_practices: true,
                timezone_optimization: true,
                goal_optimization: self.goal,
            }),
            is_fallback: false,
            error: None,
        }
    }

    /// Every candidate in the window, scored and sorted by descending total score.
    /// Equal scores keep chronological order.
    pub fn score_candidates(
        &self,
        now: DateTime<Tz>,
        platform: &str,
        analytics: Option<&Value>,
        range: DateRange,
    ) -> Result<Vec<ScoredSlot>, OptimizeError> {
        let insights = HistoricalInsights::analyze(analytics, self.goal, &self.timezone);
        self.score_with(now, platform, &insights, range)
    }

    fn score_with(
        &self,
        now: DateTime<Tz>,
        platform: &str,
        insights: &HistoricalInsights,
        range: DateRange,
    ) -> Result<Vec<ScoredSlot>, OptimizeError> {
        let table = best_times(platform);
        let mut slots: Vec<ScoredSlot> = candidates(now, range)?
            .iter()
            .map(|slot| {
                let local_table = localize(table, slot.date_naive(), &self.timezone);
                self.score_slot(slot, platform, insights, &local_table)
            })
            .collect();
        slots.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        Ok(slots)
    }

    fn score_slot(
        &self,
        slot: &DateTime<Tz>,
        platform: &str,
        insights: &HistoricalInsights,
        table: &[LocalBestTime],
    ) -> ScoredSlot {
        let mut reasons = Vec::new();

        let historical = insights.score(slot, self.normalization).map(|(score, reason)| {
            reasons.push(reason);
            score
        });
        let (platform_best_practices, practice_reason) =
            best_practice_score(slot.hour() * 60 + slot.minute(), table);
        reasons.push(practice_reason);
        let (time_of_day, tod_reason) = time_of_day_score(platform, slot.hour());
        reasons.push(tod_reason.to_string());
        let (day_of_week, day_reason) = day_of_week_score(platform, slot.weekday());
        reasons.push(day_reason);

        let component_scores = ComponentScores {
            historical,
            platform_best_practices,
            time_of_day,
            day_of_week,
        };
        let total_score = component_scores.total();

        ScoredSlot {
            instant: slot.with_timezone(&slot.offset().fix()),
            total_score,
            confidence: total_score.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
            reasoning: reasoning_text(slot, &reasons),
            component_scores,
        }
    }

    /// Index of the chosen slot in a descending-sorted list.
    ///
    /// Reach takes the latest instant among the slots tied for the top score; every other goal
    /// takes the first.
    fn select(&self, slots: &[ScoredSlot]) -> usize {
        if self.goal != OptimizationGoal::Reach {
            return 0;
        }
        let top = slots[0].total_score;
        slots
            .iter()
            .enumerate()
            .take_while(|(_, s)| (top - s.total_score).abs() < SCORE_EPSILON)
            .max_by_key(|(_, s)| s.instant)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn fallback(&self, now: DateTime<Tz>, platform: &str, error: Option<String>) -> Recommendation {
        let peak = best_times(platform)
            .first()
            .and_then(|t| localize_one(t, now.with_timezone(&Utc).date_naive(), &self.timezone))
            .unwrap_or(LocalBestTime {
                hour: 9,
                minute: 0,
                reason: "morning activity",
            });

        let one_day = Duration::days(1);
        let optimal = now
            .date_naive()
            .and_hms_opt(peak.hour, peak.minute, 0)
            .and_then(|naive| self.timezone.from_local_datetime(&naive).earliest())
            .and_then(|t| if t > now { Some(t) } else { t.checked_add_signed(one_day) })
            .or_else(|| now.checked_add_signed(one_day))
            .unwrap_or(now);

        Recommendation {
            platform: platform.to_string(),
            optimal_time: optimal.with_timezone(&optimal.offset().fix()),
            confidence: FALLBACK_CONFIDENCE,
            expected_engagement: "medium",
            reasoning: format!(
                "Fallback to {} based on {} best practices",
                peak.reason, platform
            ),
            alternative_times: Vec::new(),
            component_scores: None,
            analysis_factors: None,
            is_fallback: true,
            error,
        }
    }
}

/// Evenly spaced instants from `now + 1h` through `now + span`, inclusive.
fn candidates(now: DateTime<Tz>, range: DateRange) -> Result<Vec<DateTime<Tz>>, OptimizeError> {
    let out_of_range = || OptimizeError::OutOfRange(range.as_str().to_string());
    let step = Duration::hours(range.step_hours());
    let end = now
        .checked_add_signed(Duration::days(range.span_days()))
        .ok_or_else(out_of_range)?;
    let mut current = now
        .checked_add_signed(Duration::hours(1))
        .ok_or_else(out_of_range)?;

    let mut slots = Vec::new();
    while current <= end {
        slots.push(current);
        current = current.checked_add_signed(step).ok_or_else(out_of_range)?;
    }
    Ok(slots)
}

fn reasoning_text(slot: &DateTime<Tz>, reasons: &[String]) -> String {
    let day = weekday_name(slot.weekday());
    let time = slot.format("%I:%M %p");
    let parts: Vec<&str> = reasons
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .take(MAX_REASONS)
        .collect();
    if parts.is_empty() {
        format!("Scheduled for {} at {} based on general best practices", day, time)
    } else {
        format!("Optimal time on {} at {}: {}", day, time, parts.join(", "))
    }
}

fn expected_engagement(score: f64) -> &'static str {
    if score >= 0.8 {
        "high"
    } else if score >= 0.6 {
        "medium-high"
    } else if score >= 0.4 {
        "medium"
    } else {
        "low-medium"
    }
}

/// Pick one schedule time across per-platform recommendations: the latest for reach, the
/// earliest otherwise.
pub fn select_schedule_time(
    recommendations: &[Recommendation],
    goal: OptimizationGoal,
) -> Option<DateTime<FixedOffset>> {
    let times = recommendations.iter().map(|r| r.optimal_time);
    if goal == OptimizationGoal::Reach {
        times.max()
    } else {
        times.min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use serde_json::json;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn fixed(t: DateTime<Tz>) -> DateTime<FixedOffset> {
        t.with_timezone(&t.offset().fix())
    }

    fn monday_midnight() -> DateTime<Tz> {
        utc(2024, 1, 15, 0, 0)
    }

    fn optimizer(goal: OptimizationGoal) -> TimeOptimizer {
        TimeOptimizer::new(Tz::UTC, goal)
    }

    #[test]
    fn candidate_counts_per_range() {
        let now = monday_midnight();
        let counts: Vec<usize> = [
            DateRange::Next24h,
            DateRange::Next48h,
            DateRange::Next7Days,
            DateRange::Next14Days,
        ]
        .iter()
        .map(|r| candidates(now, *r).unwrap().len())
        .collect();
        assert_eq!(counts, vec![12, 16, 28, 28]);
    }

    #[test]
    fn optimal_time_is_always_in_the_future() {
        let now = utc(2024, 3, 6, 15, 42);
        let ny: Tz = "America/New_York".parse().unwrap();
        for tz in [Tz::UTC, ny] {
            let local_now = now.with_timezone(&tz);
            for range in [
                DateRange::Next24h,
                DateRange::Next48h,
                DateRange::Next7Days,
                DateRange::Next14Days,
            ] {
                for platform in ["twitter", "linkedin", "tiktok", "myspace"] {
                    let rec = TimeOptimizer::new(tz, OptimizationGoal::Engagement)
                        .find_optimal_time_at(local_now, platform, None, range);
                    assert!(rec.optimal_time > local_now, "{platform} {range:?}");
                    assert!((0.1..=0.95).contains(&rec.confidence));
                    assert!(!rec.is_fallback);
                    for alt in &rec.alternative_times {
                        assert!(alt.datetime > local_now);
                        assert!((0.1..=0.95).contains(&alt.confidence));
                    }
                }
            }
        }
    }

    #[test]
    fn historical_component_absent_without_analytics() {
        let slots = optimizer(OptimizationGoal::Engagement)
            .score_candidates(monday_midnight(), "facebook", None, DateRange::Next7Days)
            .unwrap();
        assert!(slots.iter().all(|s| s.component_scores.historical.is_none()));

        let empty = json!({ "recent_posts": [] });
        let rec = optimizer(OptimizationGoal::Engagement).find_optimal_time_at(
            monday_midnight(),
            "facebook",
            Some(&empty),
            DateRange::Next7Days,
        );
        assert_eq!(rec.component_scores.unwrap().historical, None);
        assert!(!rec.analysis_factors.unwrap().historical_data_available);
    }

    #[test]
    fn reach_takes_latest_of_the_top_ranked() {
        let now = monday_midnight();
        let engagement = optimizer(OptimizationGoal::Engagement).find_optimal_time_at(
            now,
            "linkedin",
            None,
            DateRange::Next7Days,
        );
        let reach = optimizer(OptimizationGoal::Reach).find_optimal_time_at(
            now,
            "linkedin",
            None,
            DateRange::Next7Days,
        );
        // Weekday 07:00 slots tie at the top; the week runs Mon 15th to Fri 19th.
        assert_eq!(engagement.optimal_time, fixed(utc(2024, 1, 15, 7, 0)));
        assert_eq!(reach.optimal_time, fixed(utc(2024, 1, 19, 7, 0)));
        assert_eq!(engagement.confidence, reach.confidence);
        assert_eq!(reach.alternative_times.len(), 3);
        assert!(reach
            .alternative_times
            .iter()
            .all(|a| a.datetime != reach.optimal_time));
    }

    #[test]
    fn reach_spreads_later_across_platforms() {
        let now = monday_midnight();
        let pick = |goal, platform: &str| {
            optimizer(goal)
                .find_optimal_time_at(now, platform, None, DateRange::Next24h)
                .optimal_time
                .hour()
        };
        assert_eq!(pick(OptimizationGoal::Engagement, "linkedin"), 7);
        assert_eq!(pick(OptimizationGoal::Reach, "linkedin"), 17);
        assert_eq!(pick(OptimizationGoal::Engagement, "tiktok"), 9);
        assert_eq!(pick(OptimizationGoal::Reach, "tiktok"), 21);

        let recs = |goal| {
            ["linkedin", "tiktok"]
                .iter()
                .map(|p| optimizer(goal).find_optimal_time_at(now, p, None, DateRange::Next24h))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            select_schedule_time(&recs(OptimizationGoal::Engagement), OptimizationGoal::Engagement),
            Some(fixed(utc(2024, 1, 15, 7, 0)))
        );
        assert_eq!(
            select_schedule_time(&recs(OptimizationGoal::Reach), OptimizationGoal::Reach),
            Some(fixed(utc(2024, 1, 15, 21, 0)))
        );
        assert_eq!(select_schedule_time(&[], OptimizationGoal::Reach), None);
    }

    #[test]
    fn linkedin_friday_evening_avoids_saturday() {
        let friday_evening = utc(2024, 1, 19, 18, 0);
        let opt = optimizer(OptimizationGoal::Engagement);
        let slots = opt
            .score_candidates(friday_evening, "linkedin", None, DateRange::Next24h)
            .unwrap();

        let best_friday = slots
            .iter()
            .filter(|s| s.instant.weekday() == Weekday::Fri)
            .map(|s| s.total_score)
            .fold(f64::MIN, f64::max);
        for sat in slots.iter().filter(|s| s.instant.weekday() == Weekday::Sat) {
            assert!(sat.component_scores.day_of_week <= 0.3);
            assert!(sat.total_score < best_friday);
        }

        let rec = opt.find_optimal_time_at(friday_evening, "linkedin", None, DateRange::Next24h);
        assert_eq!(rec.optimal_time.weekday(), Weekday::Fri);
        assert!(rec.reasoning.starts_with("Optimal time on Friday at 07:00 PM: "));
    }

    #[test]
    fn history_lifts_matching_hours() {
        let analytics = json!({
            "recent_posts": [
                {
                    "published_at": "2024-01-09T13:00:00Z",
                    "engagement": { "likes": 150, "comments": 20 }
                },
                {
                    "published_at": "2024-01-02T13:20:00Z",
                    "engagement": { "likes": 90, "shares": 5 }
                }
            ]
        });
        let now = monday_midnight();
        let slots = optimizer(OptimizationGoal::Engagement)
            .score_candidates(now, "linkedin", Some(&analytics), DateRange::Next24h)
            .unwrap();
        let historical_at = |slots: &[ScoredSlot], hour: u32| {
            slots
                .iter()
                .find(|s| s.instant.hour() == hour)
                .and_then(|s| s.component_scores.historical)
                .unwrap()
        };
        assert!(slots.iter().all(|s| s.component_scores.historical.is_some()));
        assert_eq!(historical_at(&slots, 13), 0.75);
        assert_eq!(historical_at(&slots, 7), 0.5);

        // A larger divisor dampens the same history.
        let damped = optimizer(OptimizationGoal::Engagement)
            .with_normalization(1000.0)
            .score_candidates(now, "linkedin", Some(&analytics), DateRange::Next24h)
            .unwrap();
        assert!(historical_at(&damped, 13) < 0.75);

        let rec = optimizer(OptimizationGoal::Engagement).find_optimal_time_at(
            now,
            "linkedin",
            Some(&analytics),
            DateRange::Next24h,
        );
        assert!(rec.analysis_factors.unwrap().historical_data_available);
    }

    #[test]
    fn unknown_platform_scores_zero_for_best_practices() {
        let slots = optimizer(OptimizationGoal::General)
            .score_candidates(monday_midnight(), "myspace", None, DateRange::Next24h)
            .unwrap();
        assert!(slots
            .iter()
            .all(|s| s.component_scores.platform_best_practices == 0.0));
        // 09:00 Monday: best practices 0, general band 0.8, Monday 0.7.
        let nine = slots.iter().find(|s| s.instant.hour() == 9).unwrap();
        assert!((nine.total_score - 0.5).abs() < 1e-9);
        assert!(nine
            .reasoning
            .starts_with("Optimal time on Monday at 09:00 AM: high social media activity"));

        // A known platform outranks an unknown one at the same slot.
        let twitter = optimizer(OptimizationGoal::General)
            .score_candidates(monday_midnight(), "twitter", None, DateRange::Next24h)
            .unwrap();
        let twitter_nine = twitter.iter().find(|s| s.instant.hour() == 9).unwrap();
        assert!(twitter_nine.total_score > nine.total_score);
    }

    #[test]
    fn reasoning_keeps_three_reasons() {
        let slot = utc(2024, 1, 16, 14, 5);
        let text = reasoning_text(
            &slot,
            &[
                "a".to_string(),
                " ".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ],
        );
        assert_eq!(text, "Optimal time on Tuesday at 02:05 PM: a, b, c");
        assert_eq!(
            reasoning_text(&slot, &[]),
            "Scheduled for Tuesday at 02:05 PM based on general best practices"
        );
    }

    #[test]
    fn engagement_labels() {
        assert_eq!(expected_engagement(0.85), "high");
        assert_eq!(expected_engagement(0.6), "medium-high");
        assert_eq!(expected_engagement(0.45), "medium");
        assert_eq!(expected_engagement(0.2), "low-medium");
    }

    #[test]
    fn fallback_uses_next_occurrence_of_first_peak() {
        let opt = optimizer(OptimizationGoal::Engagement);
        // LinkedIn's first peak is 07:00; already passed at 10:00 so it moves to tomorrow.
        let rec = opt.fallback(utc(2024, 1, 15, 10, 0), "linkedin", Some("boom".to_string()));
        assert!(rec.is_fallback);
        assert_eq!(rec.optimal_time, fixed(utc(2024, 1, 16, 7, 0)));
        assert_eq!(rec.confidence, 0.6);
        assert_eq!(rec.expected_engagement, "medium");
        assert_eq!(rec.reasoning, "Fallback to Pre-work check based on linkedin best practices");
        assert_eq!(rec.error.as_deref(), Some("boom"));
        assert!(rec.alternative_times.is_empty());

        let rec = opt.fallback(utc(2024, 1, 15, 6, 0), "myspace", None);
        assert_eq!(rec.optimal_time, fixed(utc(2024, 1, 15, 9, 0)));
        assert_eq!(rec.reasoning, "Fallback to morning activity based on myspace best practices");
    }

    #[test]
    fn window_past_the_calendar_falls_back() {
        let edge = NaiveDate::MAX.and_hms_opt(12, 0, 0).unwrap();
        let now = Tz::UTC.from_utc_datetime(&edge);
        let rec = optimizer(OptimizationGoal::Engagement).find_optimal_time_at(
            now,
            "twitter",
            None,
            DateRange::Next7Days,
        );
        assert!(rec.is_fallback);
        assert!(rec.error.unwrap().starts_with("Optimization error: "));
    }
}
