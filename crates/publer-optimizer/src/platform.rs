//! Platform heuristics: best-practice posting times, time-of-day bands, day-of-week bias.

use chrono::{NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// A canonical daily peak, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestTime {
    pub hour: u32,
    pub minute: u32,
    pub reason: &'static str,
}

const fn at(hour: u32, reason: &'static str) -> BestTime {
    BestTime {
        hour,
        minute: 0,
        reason,
    }
}

const FACEBOOK: &[BestTime] = &[
    at(9, "Morning commute engagement"),
    at(13, "Lunch break activity"),
    at(15, "Afternoon social browsing"),
    at(20, "Evening leisure time"),
];

const INSTAGRAM: &[BestTime] = &[
    at(8, "Morning coffee scroll"),
    at(12, "Lunch break browsing"),
    at(17, "After work relaxation"),
    at(19, "Evening prime time"),
];

const TWITTER: &[BestTime] = &[
    at(8, "Morning news cycle"),
    at(12, "Lunch hour activity"),
    at(17, "Commute time"),
    at(21, "Evening discussion"),
];

const LINKEDIN: &[BestTime] = &[
    at(7, "Pre-work check"),
    at(12, "Professional lunch break"),
    at(17, "End of workday"),
    at(20, "Evening networking"),
];

const PINTEREST: &[BestTime] = &[
    at(8, "Morning inspiration"),
    at(13, "Afternoon planning"),
    at(20, "Evening browsing"),
    at(22, "Night planning"),
];

const TIKTOK: &[BestTime] = &[
    at(6, "Early morning scroll"),
    at(9, "Mid-morning break"),
    at(19, "Evening entertainment"),
    at(21, "Prime time viewing"),
];

/// Best-practice table for a platform (case-insensitive). Unknown platforms have no rows.
pub fn best_times(platform: &str) -> &'static [BestTime] {
    match platform.to_ascii_lowercase().as_str() {
        "facebook" => FACEBOOK,
        "instagram" => INSTAGRAM,
        "twitter" => TWITTER,
        "linkedin" => LINKEDIN,
        "pinterest" => PINTEREST,
        "tiktok" => TIKTOK,
        _ => &[],
    }
}

/// A best time projected into the target timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LocalBestTime {
    pub hour: u32,
    pub minute: u32,
    pub reason: &'static str,
}

impl LocalBestTime {
    fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

/// Project a UTC best time onto `date` in `tz`.
pub(crate) fn localize_one(time: &BestTime, date: NaiveDate, tz: &Tz) -> Option<LocalBestTime> {
    let naive = date.and_hms_opt(time.hour, time.minute, 0)?;
    let local = Utc.from_utc_datetime(&naive).with_timezone(tz);
    Some(LocalBestTime {
        hour: local.hour(),
        minute: local.minute(),
        reason: time.reason,
    })
}

pub(crate) fn localize(times: &[BestTime], date: NaiveDate, tz: &Tz) -> Vec<LocalBestTime> {
    times
        .iter()
        .filter_map(|t| localize_one(t, date, tz))
        .collect()
}

fn distance_score(minutes: u32) -> f64 {
    match minutes {
        0..=30 => 1.0,
        31..=60 => 0.8,
        61..=120 => 0.6,
        _ => 0.3,
    }
}

/// Best banded score across the table and the winning entry's reason. Distance is measured
/// within the day, so 00:00 and 23:30 are 23.5 hours apart. An empty table scores 0 with no
/// reason.
pub(crate) fn best_practice_score(minute_of_day: u32, table: &[LocalBestTime]) -> (f64, String) {
    let mut best: Option<(f64, &'static str)> = None;
    for entry in table {
        let score = distance_score(minute_of_day.abs_diff(entry.minute_of_day()));
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, entry.reason));
        }
    }
    match best {
        Some((score, reason)) => (score, format!("aligns with {}", reason.to_lowercase())),
        None => (0.0, String::new()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Professional,
    Visual,
    General,
}

fn family(platform: &str) -> Family {
    match platform.to_ascii_lowercase().as_str() {
        "linkedin" => Family::Professional,
        "instagram" | "tiktok" => Family::Visual,
        _ => Family::General,
    }
}

pub(crate) fn time_of_day_score(platform: &str, hour: u32) -> (f64, &'static str) {
    match family(platform) {
        Family::Professional => match hour {
            7..=9 | 17..=19 => (0.9, "professional networking hours"),
            10..=16 => (0.7, "business hours"),
            _ => (0.4, "outside professional hours"),
        },
        Family::Visual => match hour {
            8..=9 | 19..=21 => (0.9, "prime visual content consumption"),
            12..=13 => (0.8, "lunch break browsing"),
            _ => (0.6, "moderate activity period"),
        },
        Family::General => match hour {
            8..=10 | 12..=13 | 17..=21 => (0.8, "high social media activity"),
            6..=7 | 14..=16 => (0.6, "moderate activity"),
            _ => (0.4, "low activity period"),
        },
    }
}

pub(crate) fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub(crate) fn day_of_week_score(platform: &str, day: Weekday) -> (f64, String) {
    let name = weekday_name(day);
    let weekend = matches!(day, Weekday::Sat | Weekday::Sun);
    if family(platform) == Family::Professional {
        return if weekend {
            (0.3, format!("{} has low professional engagement", name))
        } else {
            (0.9, format!("{} is ideal for professional content", name))
        };
    }
    match day {
        Weekday::Tue | Weekday::Wed | Weekday::Thu => {
            (0.9, format!("{} shows peak engagement", name))
        }
        Weekday::Mon | Weekday::Fri => (0.7, format!("{} has good engagement", name)),
        _ => (0.6, format!("{} has moderate weekend activity", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(hour: u32, minute: u32) -> LocalBestTime {
        LocalBestTime {
            hour,
            minute,
            reason: "Test peak",
        }
    }

    #[test]
    fn unknown_platform_has_no_table() {
        assert!(best_times("myspace").is_empty());
        assert_eq!(best_times("LinkedIn").len(), 4);
    }

    #[test]
    fn distance_bands() {
        let table = [local(12, 0)];
        assert_eq!(best_practice_score(12 * 60 + 30, &table).0, 1.0);
        assert_eq!(best_practice_score(13 * 60, &table).0, 0.8);
        assert_eq!(best_practice_score(14 * 60, &table).0, 0.6);
        assert_eq!(best_practice_score(15 * 60, &table).0, 0.3);
    }

    #[test]
    fn empty_table_scores_zero() {
        assert_eq!(best_practice_score(12 * 60, &[]), (0.0, String::new()));
    }

    #[test]
    fn distance_does_not_wrap_midnight() {
        let (score, reason) = best_practice_score(0, &[local(22, 0)]);
        assert_eq!(score, 0.3);
        assert_eq!(reason, "aligns with test peak");
        assert_eq!(best_practice_score(0, &[local(23, 30)]).0, 0.3);
        assert_eq!(best_practice_score(23 * 60 + 59, &[local(23, 30)]).0, 1.0);
    }

    #[test]
    fn best_times_move_into_target_timezone() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let ny: Tz = "America/New_York".parse().unwrap();
        let projected = localize(best_times("linkedin"), date, &ny);
        // 07:00 UTC is 02:00 EST in January.
        assert_eq!((projected[0].hour, projected[0].minute), (2, 0));
        let india: Tz = "Asia/Kolkata".parse().unwrap();
        let projected = localize(best_times("linkedin"), date, &india);
        assert_eq!((projected[0].hour, projected[0].minute), (12, 30));
    }

    #[test]
    fn linkedin_prefers_weekdays() {
        assert_eq!(day_of_week_score("linkedin", Weekday::Fri).0, 0.9);
        assert_eq!(day_of_week_score("linkedin", Weekday::Sat).0, 0.3);
        assert_eq!(day_of_week_score("twitter", Weekday::Wed).0, 0.9);
        assert_eq!(day_of_week_score("twitter", Weekday::Mon).0, 0.7);
        assert_eq!(day_of_week_score("twitter", Weekday::Sun).0, 0.6);
    }

    #[test]
    fn time_of_day_families() {
        assert_eq!(time_of_day_score("linkedin", 8).0, 0.9);
        assert_eq!(time_of_day_score("linkedin", 23).0, 0.4);
        assert_eq!(time_of_day_score("tiktok", 20).0, 0.9);
        assert_eq!(time_of_day_score("instagram", 12).0, 0.8);
        assert_eq!(time_of_day_score("facebook", 15).0, 0.6);
        assert_eq!(time_of_day_score("facebook", 3).0, 0.4);
    }
}
