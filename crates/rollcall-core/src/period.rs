//! Attendance period derivation.
//!
//! A period is the deduplication scope: at most one attendance record per
//! identity per period. Granularity is configuration, never a constant.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Canonical identifier for one attendance period.
///
/// Calendar-day ids render as `YYYY-MM-DD`; window ids as zero-padded
/// epoch-window ordinals. Both order lexicographically by time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodId(String);

impl PeriodId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeriodId {
    fn from(s: String) -> Self {
        PeriodId(s)
    }
}

impl From<&str> for PeriodId {
    fn from(s: &str) -> Self {
        PeriodId(s.to_string())
    }
}

/// How event timestamps map to periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodPolicy {
    /// One period per calendar day, rendered in the given UTC offset.
    CalendarDay { utc_offset_minutes: i32 },
    /// Fixed-length windows measured from the Unix epoch.
    FixedWindow { seconds: u64 },
}

impl PeriodPolicy {
    /// Parse a policy spec: `"daily"` or `"window:<seconds>"`.
    pub fn parse(spec: &str, utc_offset_minutes: i32) -> Option<Self> {
        if spec == "daily" {
            return Some(PeriodPolicy::CalendarDay { utc_offset_minutes });
        }
        let seconds = spec.strip_prefix("window:")?.parse::<u64>().ok()?;
        if seconds == 0 {
            return None;
        }
        Some(PeriodPolicy::FixedWindow { seconds })
    }

    /// Deterministically derive the period id for a timestamp.
    pub fn period_for(&self, ts: DateTime<Utc>) -> PeriodId {
        match *self {
            PeriodPolicy::CalendarDay { utc_offset_minutes } => {
                let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
                    .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero UTC offset"));
                PeriodId(ts.with_timezone(&offset).format("%Y-%m-%d").to_string())
            }
            PeriodPolicy::FixedWindow { seconds } => {
                let window = ts.timestamp().div_euclid(seconds.max(1) as i64);
                PeriodId(format!("w{window:012}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_same_day_same_period() {
        let policy = PeriodPolicy::CalendarDay {
            utc_offset_minutes: 0,
        };
        let a = policy.period_for(utc(2025, 6, 1, 8, 0, 0));
        let b = policy.period_for(utc(2025, 6, 1, 17, 30, 0));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "2025-06-01");
    }

    #[test]
    fn test_midnight_straddle_different_periods() {
        let policy = PeriodPolicy::CalendarDay {
            utc_offset_minutes: 0,
        };
        let before = policy.period_for(utc(2025, 6, 1, 23, 59, 59));
        let after = policy.period_for(utc(2025, 6, 2, 0, 0, 1));
        assert_ne!(before, after);
    }

    #[test]
    fn test_offset_shifts_day_boundary() {
        // 23:30 UTC is already the next local day at UTC+1.
        let ts = utc(2025, 6, 1, 23, 30, 0);
        let utc_day = PeriodPolicy::CalendarDay {
            utc_offset_minutes: 0,
        }
        .period_for(ts);
        let plus_one = PeriodPolicy::CalendarDay {
            utc_offset_minutes: 60,
        }
        .period_for(ts);
        assert_eq!(utc_day.as_str(), "2025-06-01");
        assert_eq!(plus_one.as_str(), "2025-06-02");
    }

    #[test]
    fn test_negative_offset() {
        // 00:30 UTC is still the previous local day at UTC-1.
        let ts = utc(2025, 6, 2, 0, 30, 0);
        let minus_one = PeriodPolicy::CalendarDay {
            utc_offset_minutes: -60,
        }
        .period_for(ts);
        assert_eq!(minus_one.as_str(), "2025-06-01");
    }

    #[test]
    fn test_window_boundaries() {
        let policy = PeriodPolicy::FixedWindow { seconds: 300 };
        let a = policy.period_for(utc(2025, 6, 1, 8, 0, 0));
        let b = policy.period_for(utc(2025, 6, 1, 8, 4, 59));
        let c = policy.period_for(utc(2025, 6, 1, 8, 5, 0));
        assert_eq!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_window_ids_order_lexicographically() {
        let policy = PeriodPolicy::FixedWindow { seconds: 300 };
        let earlier = policy.period_for(utc(2025, 6, 1, 8, 0, 0));
        let later = policy.period_for(utc(2025, 6, 1, 9, 0, 0));
        assert!(earlier.as_str() < later.as_str());
    }

    #[test]
    fn test_determinism() {
        let policy = PeriodPolicy::CalendarDay {
            utc_offset_minutes: 330,
        };
        let ts = utc(2025, 6, 1, 20, 0, 0);
        assert_eq!(policy.period_for(ts), policy.period_for(ts));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            PeriodPolicy::parse("daily", 60),
            Some(PeriodPolicy::CalendarDay {
                utc_offset_minutes: 60
            })
        );
        assert_eq!(
            PeriodPolicy::parse("window:300", 0),
            Some(PeriodPolicy::FixedWindow { seconds: 300 })
        );
        assert_eq!(PeriodPolicy::parse("window:0", 0), None);
        assert_eq!(PeriodPolicy::parse("hourly", 0), None);
        assert_eq!(PeriodPolicy::parse("window:abc", 0), None);
    }
}
