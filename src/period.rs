use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

/// A calendar-month-aligned date range, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// The period as a half-open range of UTC instants, for comparing
    /// against transaction timestamps.
    pub fn utc_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.start.and_time(NaiveTime::MIN).and_utc();
        let until = self
            .end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(NaiveTime::MIN)
            .and_utc();
        (from, until)
    }
}

/// The calendar month containing `today` shifted by `offset_months`, in
/// either direction. Returns `None` when the shift leaves the representable
/// calendar range.
pub fn month_period(today: NaiveDate, offset_months: i32) -> Option<Period> {
    let months = today
        .year()
        .checked_mul(12)?
        .checked_add(today.month0() as i32)?
        .checked_add(offset_months)?;
    let start = NaiveDate::from_ymd_opt(months.div_euclid(12), months.rem_euclid(12) as u32 + 1, 1)?;
    let end = start
        .checked_add_months(Months::new(1))?
        .checked_sub_days(Days::new(1))?;
    Some(Period { start, end })
}

pub fn current_period(offset_months: i32) -> Option<Period> {
    month_period(Utc::now().date_naive(), offset_months)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn zero_offset_is_current_month() {
        let period = month_period(date(2025, 8, 7), 0).unwrap();
        assert_eq!(period.start, date(2025, 8, 1));
        assert_eq!(period.end, date(2025, 8, 31));
    }

    #[test]
    fn negative_offset_crosses_year_backwards() {
        let period = month_period(date(2025, 1, 15), -1).unwrap();
        assert_eq!(period.start, date(2024, 12, 1));
        assert_eq!(period.end, date(2024, 12, 31));
    }

    #[test]
    fn positive_offset_crosses_year_forwards() {
        let period = month_period(date(2025, 12, 3), 1).unwrap();
        assert_eq!(period.start, date(2026, 1, 1));
        assert_eq!(period.end, date(2026, 1, 31));
    }

    #[test]
    fn february_length_follows_leap_years() {
        let leap = month_period(date(2024, 1, 10), 1).unwrap();
        assert_eq!(leap.end, date(2024, 2, 29));

        let common = month_period(date(2023, 1, 10), 1).unwrap();
        assert_eq!(common.end, date(2023, 2, 28));
    }

    #[test]
    fn offsets_beyond_a_year_land_on_the_right_month() {
        let forward = month_period(date(2025, 8, 7), 13).unwrap();
        assert_eq!(forward.start, date(2026, 9, 1));

        let backward = month_period(date(2025, 8, 7), -20).unwrap();
        assert_eq!(backward.start, date(2023, 12, 1));
        assert_eq!(backward.end, date(2023, 12, 31));
    }

    #[test]
    fn absurd_offsets_are_rejected() {
        assert!(month_period(date(2025, 8, 7), i32::MAX).is_none());
        assert!(month_period(date(2025, 8, 7), i32::MIN).is_none());
    }

    #[test]
    fn utc_range_covers_the_whole_last_day() {
        let period = month_period(date(2025, 8, 7), 0).unwrap();
        let (from, until) = period.utc_range();
        assert_eq!(from, date(2025, 8, 1).and_time(NaiveTime::MIN).and_utc());
        assert_eq!(until, date(2025, 9, 1).and_time(NaiveTime::MIN).and_utc());
    }
}
