use chrono::{DateTime, Duration, Timelike, Utc};

use crate::constants::DEFAULT_LOOKBACK_HOURS;

/// Named time range selecting which slice of the inbox a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    /// Rolling lookback of the last 24 hours.
    #[default]
    Daily,
    /// Yesterday 14:00 through today 09:00 (the 9am cron run).
    Morning,
    /// Today 09:00 through 14:00 (the 2pm cron run).
    Afternoon,
}

impl TimeRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            _ => None,
        }
    }

    /// Period label used in the digest subject line.
    pub fn period_label(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
        }
    }

    /// Resolve the range to concrete bounds at `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> WindowBounds {
        match self {
            Self::Daily => WindowBounds {
                start: now - Duration::hours(DEFAULT_LOOKBACK_HOURS),
                end: None,
            },
            Self::Morning => WindowBounds {
                start: at_hour(now - Duration::days(1), 14),
                end: Some(at_hour(now, 9)),
            },
            Self::Afternoon => WindowBounds {
                start: at_hour(now, 9),
                end: Some(at_hour(now, 14)),
            },
        }
    }
}

/// Concrete lookback window. `end` of `None` means "up to now".
#[derive(Debug, Clone, Copy)]
pub struct WindowBounds {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl WindowBounds {
    /// Whether a timestamp falls inside the window. The start is inclusive
    /// and the end exclusive, matching the provider-side filter.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && self.end.is_none_or(|end| ts < end)
    }
}

fn at_hour(ts: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    ts.with_hour(hour)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    #[test]
    fn test_daily_bounds() {
        let now = at(9, 0);
        let bounds = TimeRange::Daily.bounds(now);
        assert_eq!(bounds.start, Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap());
        assert!(bounds.end.is_none());
    }

    #[test]
    fn test_morning_bounds() {
        let bounds = TimeRange::Morning.bounds(at(9, 5));
        assert_eq!(bounds.start, Utc.with_ymd_and_hms(2024, 3, 14, 14, 0, 0).unwrap());
        assert_eq!(bounds.end, Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()));
    }

    #[test]
    fn test_afternoon_bounds() {
        let bounds = TimeRange::Afternoon.bounds(at(14, 10));
        assert_eq!(bounds.start, at(9, 0));
        assert_eq!(bounds.end, Some(at(14, 0)));
    }

    #[test]
    fn test_contains_is_start_inclusive_end_exclusive() {
        let bounds = TimeRange::Afternoon.bounds(at(14, 10));
        assert!(bounds.contains(at(9, 0)));
        assert!(bounds.contains(at(13, 59)));
        assert!(!bounds.contains(at(14, 0)));
        assert!(!bounds.contains(at(8, 59)));
    }

    #[test]
    fn test_parse() {
        assert_eq!(TimeRange::parse("morning"), Some(TimeRange::Morning));
        assert_eq!(TimeRange::parse("AFTERNOON"), Some(TimeRange::Afternoon));
        assert_eq!(TimeRange::parse("weekly"), None);
    }
}
