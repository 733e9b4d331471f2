use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

/// Business days in a full calendar week.
pub const BUSINESS_DAYS_PER_WEEK: i64 = 5;

/// Business days (Mon-Fri) from `start` to `end`.
///
/// The span is split into full weeks, each worth five business days, and a
/// remainder of fewer than seven days. Only the remainder is walked, counting
/// the weekdays in `(start, end]`, so a remainder that crosses a weekend folds
/// the weekend out: Friday to the following Monday is one business day.
///
/// A weekday-agnostic fold, which keeps a remainder under five days as is and
/// counts five or six days as three or four, only agrees when the remainder
/// misses the weekend. Friday to Monday gives 1 here instead of 3, Monday to
/// Saturday gives 4 instead of 3, and Saturday to Monday gives 1 instead of 2.
///
/// Negative when `end` precedes `start`; the function is antisymmetric.
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return -business_days_between(end, start);
    }

    let delta = (end - start).num_days();
    let weeks = delta / 7;
    let remainder = delta % 7;

    let tail_start = start + Duration::days(weeks * 7);
    let tail = (1..=remainder)
        .filter(|offset| is_business_day(tail_start + Duration::days(*offset)))
        .count() as i64;

    weeks * BUSINESS_DAYS_PER_WEEK + tail
}

/// Business days between the calendar dates of two instants.
pub fn business_days_since(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    business_days_between(start.date_naive(), now.date_naive())
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
