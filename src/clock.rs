// ===============================
// src/clock.rs
// ===============================
//
// Calendar bucket keys untuk agregasi harian / mingguan / bulanan.
// Semua kunci diturunkan dari tanggal lokal host, tanpa koreksi timezone.
//
use chrono::{Datelike, Duration, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketKeys {
    pub day: String,
    pub week: String,
    pub month: String,
}

impl BucketKeys {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            day: date.format("%Y-%m-%d").to_string(),
            week: week_start(date).format("%Y-%m-%d").to_string(),
            month: date.format("%Y-%m").to_string(),
        }
    }
}

/// Most recent Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn week_key_is_stable_sunday_through_saturday() {
        let tuesday = BucketKeys::for_date(d(2024, 6, 11));
        let saturday = BucketKeys::for_date(d(2024, 6, 15));
        let next_monday = BucketKeys::for_date(d(2024, 6, 17));

        assert_eq!(tuesday.week, "2024-06-09");
        assert_eq!(tuesday.week, saturday.week);
        assert_ne!(saturday.week, next_monday.week);
        assert_eq!(next_monday.week, "2024-06-16");
    }

    #[test]
    fn sunday_is_its_own_week_start() {
        assert_eq!(week_start(d(2024, 6, 9)), d(2024, 6, 9));
    }

    #[test]
    fn week_start_can_fall_in_previous_month() {
        let keys = BucketKeys::for_date(d(2024, 3, 2));
        assert_eq!(keys.day, "2024-03-02");
        assert_eq!(keys.week, "2024-02-25");
        assert_eq!(keys.month, "2024-03");
    }
}
