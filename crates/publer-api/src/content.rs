//! Per-platform content tweaks and human-readable scheduling summaries.

use chrono::{DateTime, FixedOffset};
use publer_optimizer::OptimizationGoal;

const TWITTER_LIMIT: usize = 280;

/// Adjust post text for a platform: truncate for twitter, close sentences for linkedin, add
/// hashtags for instagram posts that have none.
pub fn adapt_for_platform(platform: &str, content: &str) -> String {
    match platform.to_ascii_lowercase().as_str() {
        "twitter" if content.chars().count() > TWITTER_LIMIT => {
            let mut cut: String = content.chars().take(TWITTER_LIMIT - 3).collect();
            cut.push_str("...");
            cut
        }
        "linkedin" if !content.ends_with('.') => format!("{}.", content),
        "instagram" if !content.split_whitespace().any(|w| w.starts_with('#')) => {
            format!("{} #engagement #content", content)
        }
        _ => content.to_string(),
    }
}

pub fn strategy_description(goal: OptimizationGoal, at: &DateTime<FixedOffset>) -> String {
    let when = at.format("%A at %I:%M %p");
    match goal {
        OptimizationGoal::Engagement => {
            format!("Scheduled for {} to maximize likes, comments, and shares", when)
        }
        OptimizationGoal::Reach => {
            format!("Scheduled for {} to reach the largest audience across time zones", when)
        }
        OptimizationGoal::Clicks => {
            format!("Scheduled for {} when audiences are most likely to click through", when)
        }
        OptimizationGoal::General => {
            format!("Scheduled for {} based on overall best practices", when)
        }
    }
}

pub fn performance_estimate(confidence: f64, goal: OptimizationGoal) -> &'static str {
    use OptimizationGoal::*;
    if confidence >= 0.8 {
        match goal {
            Engagement => "20-40% higher engagement expected",
            Reach => "15-30% more impressions expected",
            Clicks => "25-45% higher click-through rate expected",
            General => "15-25% better overall performance expected",
        }
    } else if confidence >= 0.6 {
        match goal {
            Engagement => "10-25% higher engagement expected",
            Reach => "8-20% more impressions expected",
            Clicks => "15-30% higher click-through rate expected",
            General => "8-15% better overall performance expected",
        }
    } else {
        match goal {
            Engagement => "Moderate improvement expected",
            Reach => "Some increase in reach expected",
            Clicks => "Potential for better click rates",
            General => "Better timing than random posting",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twitter_truncates_on_char_boundaries() {
        let long = "é".repeat(300);
        let adapted = adapt_for_platform("twitter", &long);
        assert_eq!(adapted.chars().count(), 280);
        assert!(adapted.ends_with("..."));
        assert_eq!(adapt_for_platform("twitter", "short"), "short");
    }

    #[test]
    fn linkedin_and_instagram_tweaks() {
        assert_eq!(adapt_for_platform("linkedin", "Hiring now"), "Hiring now.");
        assert_eq!(adapt_for_platform("LinkedIn", "Done."), "Done.");
        assert_eq!(
            adapt_for_platform("instagram", "Sunset"),
            "Sunset #engagement #content"
        );
        assert_eq!(adapt_for_platform("instagram", "Sunset #beach"), "Sunset #beach");
        assert_eq!(adapt_for_platform("facebook", "As is"), "As is");
    }

    #[test]
    fn strategy_mentions_day_and_time() {
        let at = DateTime::parse_from_rfc3339("2024-01-19T07:00:00+00:00").unwrap();
        assert_eq!(
            strategy_description(OptimizationGoal::Reach, &at),
            "Scheduled for Friday at 07:00 AM to reach the largest audience across time zones"
        );
        assert_eq!(
            performance_estimate(0.9, OptimizationGoal::Clicks),
            "25-45% higher click-through rate expected"
        );
        assert_eq!(
            performance_estimate(0.5, OptimizationGoal::General),
            "Better timing than random posting"
        );
    }
}
