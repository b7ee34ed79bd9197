//! Registration counts by period.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::registration::record::TIMESTAMP_FORMAT;

/// Number of registrations overall and in the current day, week and month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStats {
    pub total: u64,
    pub today: u64,
    pub this_week: u64,
    pub this_month: u64,
}

impl RegistrationStats {
    /// Count registration timestamps relative to `today`. Weeks start on
    /// Monday. Timestamps that fail to parse are skipped.
    pub fn from_timestamps<'a, I>(timestamps: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let week_start = today
            .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
            .unwrap_or(today);
        let month_start = today.with_day(1).unwrap_or(today);

        let mut stats = Self::default();
        for raw in timestamps {
            let Ok(registered) = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT) else {
                continue;
            };
            let date = registered.date();
            stats.total += 1;
            if date == today {
                stats.today += 1;
            }
            if date >= week_start {
                stats.this_week += 1;
            }
            if date >= month_start {
                stats.this_month += 1;
            }
        }
        stats
    }
}
