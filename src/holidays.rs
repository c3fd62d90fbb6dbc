//! Static holiday calendar: a pre-populated set of non-workable civil dates
//! for one jurisdiction. Pure lookup, no timezone conversion, no lifecycle —
//! dates outside the loaded range simply return false.

use std::collections::HashSet;

use chrono::NaiveDate;

#[derive(Debug)]
pub struct HolidayCalendar {
    jurisdiction: String,
    dates: HashSet<NaiveDate>,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date in static holiday table")
}

impl HolidayCalendar {
    pub fn new(jurisdiction: impl Into<String>, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            dates: dates.into_iter().collect(),
        }
    }

    /// A calendar with no holidays at all.
    pub fn none() -> Self {
        Self::new("none", [])
    }

    /// England and Wales bank holidays, 2024–2026.
    ///
    /// Substitute days are included where the holiday falls on a weekend
    /// (e.g. 28 Dec 2026 for Boxing Day).
    pub fn england_and_wales() -> Self {
        Self::new(
            "england-and-wales",
            [
                // 2024
                date(2024, 1, 1),   // New Year's Day
                date(2024, 3, 29),  // Good Friday
                date(2024, 4, 1),   // Easter Monday
                date(2024, 5, 6),   // Early May bank holiday
                date(2024, 5, 27),  // Spring bank holiday
                date(2024, 8, 26),  // Summer bank holiday
                date(2024, 12, 25), // Christmas Day
                date(2024, 12, 26), // Boxing Day
                // 2025
                date(2025, 1, 1),
                date(2025, 4, 18),
                date(2025, 4, 21),
                date(2025, 5, 5),
                date(2025, 5, 26),
                date(2025, 8, 25),
                date(2025, 12, 25),
                date(2025, 12, 26),
                // 2026
                date(2026, 1, 1),
                date(2026, 4, 3),
                date(2026, 4, 6),
                date(2026, 5, 4),
                date(2026, 5, 25),
                date(2026, 8, 31),
                date(2026, 12, 25),
                date(2026, 12, 28), // Boxing Day substitute
            ],
        )
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn is_holiday(&self, day: NaiveDate) -> bool {
        self.dates.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_bank_holidays() {
        let cal = HolidayCalendar::england_and_wales();
        assert!(cal.is_holiday(date(2025, 1, 1))); // New Year's Day
        assert!(cal.is_holiday(date(2025, 4, 18))); // Good Friday
        assert!(cal.is_holiday(date(2025, 12, 26))); // Boxing Day
        assert!(cal.is_holiday(date(2026, 12, 28))); // Boxing Day substitute
    }

    #[test]
    fn ordinary_days_are_workable() {
        let cal = HolidayCalendar::england_and_wales();
        assert!(!cal.is_holiday(date(2025, 6, 11)));
        // A plain weekend day is not a bank holiday
        assert!(!cal.is_holiday(date(2025, 6, 14)));
    }

    #[test]
    fn out_of_range_dates_return_false() {
        let cal = HolidayCalendar::england_and_wales();
        assert!(!cal.is_holiday(date(1999, 12, 25)));
        assert!(!cal.is_holiday(date(2099, 1, 1)));
    }

    #[test]
    fn empty_calendar_never_matches() {
        let cal = HolidayCalendar::none();
        assert!(cal.is_empty());
        assert!(!cal.is_holiday(date(2025, 12, 25)));
    }

    #[test]
    fn custom_jurisdiction() {
        let cal = HolidayCalendar::new("test", [date(2025, 7, 4)]);
        assert_eq!(cal.jurisdiction(), "test");
        assert_eq!(cal.len(), 1);
        assert!(cal.is_holiday(date(2025, 7, 4)));
        assert!(!cal.is_holiday(date(2025, 7, 5)));
    }
}
