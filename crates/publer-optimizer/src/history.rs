//! Historical engagement analysis: mean goal-weighted engagement by local hour and weekday.

use crate::goal::OptimizationGoal;
use crate::platform::weekday_name;
use chrono::{DateTime, Datelike, Timelike, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const TOP_BUCKETS: usize = 3;
/// Neutral score blended with a bucket's normalized mean.
const BASELINE: f64 = 0.5;

/// Engagement breakdown of a past post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default)]
    pub likes: f64,
    #[serde(default)]
    pub comments: f64,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub clicks: f64,
}

impl Engagement {
    /// Collapse the breakdown into one scalar weighted for `goal`.
    pub fn score(&self, goal: OptimizationGoal) -> f64 {
        match goal {
            OptimizationGoal::Clicks => {
                3.0 * self.clicks + 0.5 * self.likes + 2.0 * self.comments + 2.0 * self.shares
            }
            OptimizationGoal::Reach => {
                3.0 * self.shares + self.likes + 1.5 * self.comments + self.clicks
            }
            OptimizationGoal::Engagement | OptimizationGoal::General => {
                self.likes + 2.5 * self.comments + 2.0 * self.shares + 1.5 * self.clicks
            }
        }
    }

    fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object().filter(|o| !o.is_empty())?;
        let metric = |key: &str| obj.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        Some(Self {
            likes: metric("likes"),
            comments: metric("comments"),
            shares: metric("shares"),
            clicks: metric("clicks"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourBucket {
    pub hour: u32,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayBucket {
    pub day: Weekday,
    pub mean: f64,
    pub count: usize,
}

/// Top hours and weekdays by mean engagement, in the target timezone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoricalInsights {
    /// Posts that carried a parseable timestamp and a non-empty engagement breakdown.
    pub data_points: usize,
    pub best_hours: Vec<HourBucket>,
    pub best_days: Vec<DayBucket>,
}

impl HistoricalInsights {
    /// Analyze `{"recent_posts": [{"published_at": rfc3339, "engagement": {...}}, ...]}`.
    ///
    /// Posts missing either field, or with an unparseable timestamp, are skipped.
    pub fn analyze(analytics: Option<&Value>, goal: OptimizationGoal, tz: &Tz) -> Self {
        let posts = analytics
            .and_then(|a| a.get("recent_posts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut hourly: HashMap<u32, Vec<f64>> = HashMap::new();
        let mut daily: HashMap<Weekday, Vec<f64>> = HashMap::new();
        let mut data_points = 0;

        for post in posts {
            let Some(published) = post
                .get("published_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            else {
                continue;
            };
            let Some(engagement) = post.get("engagement").and_then(Engagement::from_value) else {
                continue;
            };
            let local = published.with_timezone(tz);
            let score = engagement.score(goal);
            hourly.entry(local.hour()).or_default().push(score);
            daily.entry(local.weekday()).or_default().push(score);
            data_points += 1;
        }

        let mut best_hours: Vec<HourBucket> = hourly
            .into_iter()
            .map(|(hour, scores)| HourBucket {
                hour,
                mean: mean(&scores),
                count: scores.len(),
            })
            .collect();
        best_hours.sort_by(|a, b| b.mean.total_cmp(&a.mean).then(a.hour.cmp(&b.hour)));
        best_hours.truncate(TOP_BUCKETS);

        let mut best_days: Vec<DayBucket> = daily
            .into_iter()
            .map(|(day, scores)| DayBucket {
                day,
                mean: mean(&scores),
                count: scores.len(),
            })
            .collect();
        best_days.sort_by(|a, b| {
            b.mean
                .total_cmp(&a.mean)
                .then(a.day.num_days_from_monday().cmp(&b.day.num_days_from_monday()))
        });
        best_days.truncate(TOP_BUCKETS);

        Self {
            data_points,
            best_hours,
            best_days,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data_points > 0
    }

    /// Historical sub-score for a local instant; `None` when there is no usable history.
    ///
    /// Each matching bucket contributes `(BASELINE + min(mean / normalization, 1)) / 2`; hour and
    /// day contributions are averaged. With history but no matching bucket the score is the
    /// baseline.
    pub(crate) fn score(&self, slot: &DateTime<Tz>, normalization: f64) -> Option<(f64, String)> {
        if !self.has_data() {
            return None;
        }
        let blend = |mean: f64| (BASELINE + (mean / normalization).clamp(0.0, 1.0)) / 2.0;

        let hour = slot.hour();
        let day = slot.weekday();
        let hour_part = self.best_hours.iter().find(|b| b.hour == hour).map(|b| blend(b.mean));
        let day_part = self.best_days.iter().find(|b| b.day == day).map(|b| blend(b.mean));

        let mut reasons = Vec::new();
        if hour_part.is_some() {
            reasons.push(format!("hour {}:00 historically performs well", hour));
        }
        if day_part.is_some() {
            reasons.push(format!("{}s show good engagement", weekday_name(day)));
        }
        let score = match (hour_part, day_part) {
            (Some(h), Some(d)) => (h + d) / 2.0,
            (Some(h), None) => h,
            (None, Some(d)) => d,
            (None, None) => BASELINE,
        };
        Some((score, reasons.join(" and ")))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn goal_weights() {
        let e = Engagement {
            likes: 10.0,
            comments: 2.0,
            shares: 1.0,
            clicks: 4.0,
        };
        assert_eq!(e.score(OptimizationGoal::Clicks), 23.0);
        assert_eq!(e.score(OptimizationGoal::Reach), 20.0);
        assert_eq!(e.score(OptimizationGoal::Engagement), 23.0);
        assert_eq!(e.score(OptimizationGoal::General), 23.0);
    }

    #[test]
    fn missing_analytics_means_no_history() {
        let insights = HistoricalInsights::analyze(None, OptimizationGoal::Engagement, &Tz::UTC);
        assert!(!insights.has_data());
        let slot = Tz::UTC.with_ymd_and_hms(2024, 1, 16, 14, 0, 0).unwrap();
        assert!(insights.score(&slot, 100.0).is_none());

        let empty = json!({ "recent_posts": [] });
        let insights =
            HistoricalInsights::analyze(Some(&empty), OptimizationGoal::Engagement, &Tz::UTC);
        assert!(!insights.has_data());
    }

    #[test]
    fn buckets_by_local_hour_and_keeps_top_three() {
        let analytics = json!({
            "recent_posts": [
                { "published_at": "2024-01-09T14:00:00Z", "engagement": { "likes": 80 } },
                { "published_at": "2024-01-16T14:10:00Z", "engagement": { "likes": 120 } },
                { "published_at": "2024-01-10T09:00:00Z", "engagement": { "likes": 10 } },
                { "published_at": "2024-01-11T10:00:00Z", "engagement": { "likes": 5 } },
                { "published_at": "2024-01-12T11:00:00Z", "engagement": { "likes": 1 } },
                { "published_at": "not a date", "engagement": { "likes": 1000 } },
                { "published_at": "2024-01-12T11:00:00Z" }
            ]
        });
        let insights =
            HistoricalInsights::analyze(Some(&analytics), OptimizationGoal::Engagement, &Tz::UTC);
        assert_eq!(insights.data_points, 5);
        let hours: Vec<u32> = insights.best_hours.iter().map(|b| b.hour).collect();
        assert_eq!(hours, vec![14, 9, 10]);
        assert_eq!(insights.best_hours[0].mean, 100.0);
        assert_eq!(insights.best_days[0].day, Weekday::Tue);

        let ny: Tz = "America/New_York".parse().unwrap();
        let local =
            HistoricalInsights::analyze(Some(&analytics), OptimizationGoal::Engagement, &ny);
        assert_eq!(local.best_hours[0].hour, 9);
    }

    #[test]
    fn matching_buckets_blend_with_baseline() {
        let analytics = json!({
            "recent_posts": [
                { "published_at": "2024-01-09T14:00:00Z", "engagement": { "likes": 100 } },
                { "published_at": "2024-01-10T08:00:00Z", "engagement": { "likes": 20 } }
            ]
        });
        let insights =
            HistoricalInsights::analyze(Some(&analytics), OptimizationGoal::Engagement, &Tz::UTC);

        // Tuesday 14:00: both buckets have mean 100 -> (0.5 + 1.0) / 2 each.
        let tue = Tz::UTC.with_ymd_and_hms(2024, 1, 16, 14, 0, 0).unwrap();
        let (score, reason) = insights.score(&tue, 100.0).unwrap();
        assert!((score - 0.75).abs() < 1e-9);
        assert_eq!(
            reason,
            "hour 14:00 historically performs well and Tuesdays show good engagement"
        );

        // Larger normalization shrinks the historical signal.
        let (scaled, _) = insights.score(&tue, 1000.0).unwrap();
        assert!((scaled - 0.3).abs() < 1e-9);

        // No bucket matches Sunday 03:00: baseline only.
        let sun = Tz::UTC.with_ymd_and_hms(2024, 1, 21, 3, 0, 0).unwrap();
        let (score, reason) = insights.score(&sun, 100.0).unwrap();
        assert_eq!(score, 0.5);
        assert!(reason.is_empty());
    }
}
