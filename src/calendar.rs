use chrono::{Datelike, Duration, NaiveDate};

/// A month grid is always 6 full weeks: enough to cover any month layout.
pub const GRID_DAYS: usize = 42;

/// Build the 42-day, Monday-first grid for the month containing `reference`.
///
/// Walks back from the 1st of the month to the most recent Monday on or
/// before it, then emits 42 consecutive civil dates. The grid therefore
/// always contains the whole reference month, padded with up to 6 leading
/// and trailing days from adjacent months. Out-of-month cells are not
/// filtered out — every cell is a valid placement target; visual
/// de-emphasis is the UI's job.
pub fn month_grid(reference: NaiveDate) -> [NaiveDate; GRID_DAYS] {
    let first = reference
        .with_day(1)
        .expect("day 1 exists in every month");
    let monday = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));
    std::array::from_fn(|i| monday + Duration::days(i as i64))
}
