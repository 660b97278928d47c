use chrono::{Datelike, Duration, NaiveDate};

pub fn get_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        if let Some(next) = current.succ_opt() {
            current = next;
        } else {
            // Should not happen for typical date ranges
            break;
        }
    }
    days
}

/// Calendar days from `start` to `end`; zero when `end` is not after `start`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(0)
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

/// Monday of the week containing `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn start_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}

/// The day after the same date `years` years earlier (Feb 29 falls back to Feb 28).
pub fn years_before(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() - years;
    let anchor = NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date);
    anchor.succ_opt().unwrap_or(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_get_days_between_inclusive() {
        let days = get_days_between(d(2024, 2, 27), d(2024, 3, 1));
        assert_eq!(days.len(), 4); // leap year
        assert_eq!(days[0], d(2024, 2, 27));
        assert_eq!(days[3], d(2024, 3, 1));
        assert!(get_days_between(d(2024, 3, 2), d(2024, 3, 1)).is_empty());
    }

    #[test]
    fn test_calendar_anchors() {
        // 2024-05-16 is a Thursday
        assert_eq!(start_of_week(d(2024, 5, 16)), d(2024, 5, 13));
        assert_eq!(start_of_week(d(2024, 5, 13)), d(2024, 5, 13));
        assert_eq!(start_of_month(d(2024, 5, 16)), d(2024, 5, 1));
        assert_eq!(start_of_year(d(2024, 5, 16)), d(2024, 1, 1));
    }

    #[test]
    fn test_years_before_handles_leap_day() {
        assert_eq!(years_before(d(2024, 5, 16), 1), d(2023, 5, 17));
        assert_eq!(years_before(d(2024, 2, 29), 1), d(2023, 3, 1));
    }
}
