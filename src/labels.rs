//! Categorical labels for derived columns and the month selector.

/// Month selector labels. Index 0 selects every month.
pub const MONTHS: [&str; 13] = [
    "All", "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const DAYS_OF_WEEK: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Number of hour-of-day categories.
pub const HOURS: usize = 24;

/// Hour-of-day labels, `"0"` to `"23"`.
pub fn hours() -> Vec<String> {
    (0..HOURS).map(|hour| hour.to_string()).collect()
}

/// Label for a month selector value, if it is one of the known options.
pub fn month(value: u8) -> Option<&'static str> {
    MONTHS.get(usize::from(value)).copied()
}

/// Label for a zero-based day of week, Monday first.
pub fn day_of_week(day: u8) -> Option<&'static str> {
    DAYS_OF_WEEK.get(usize::from(day)).copied()
}
