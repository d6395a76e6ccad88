use crate::column::Column;
use crate::dataset::{Columns, ColumnsVisitor, Coordinate, Dataset};
use crate::models::MonthFilter;

use std::path::PathBuf;
use tempfile::TempDir;
use time::{Date, Month, PrimitiveDateTime, Time};

/// Write a file into a temporary directory, returning its path.
pub(crate) fn write(dir: &TempDir, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Seconds since the Unix epoch of a UTC date and hour.
pub(crate) fn timestamp(year: i32, month: u8, day: u8, hour: u8) -> i64 {
    let date = Date::from_calendar_date(year, Month::try_from(month).unwrap(), day).unwrap();
    let time = Time::from_hms(hour, 0, 0).unwrap();
    PrimitiveDateTime::new(date, time)
        .assume_utc()
        .unix_timestamp()
}

/// Build a float64 dataset from `(x, y, timestamp)` rows.
pub(crate) fn dataset(rows: &[(f64, f64, i64)]) -> Dataset {
    Dataset::from_columns(
        "x",
        "y",
        "t",
        Column::Float64(rows.iter().map(|row| row.0).collect()),
        Column::Float64(rows.iter().map(|row| row.1).collect()),
        Column::Int64(rows.iter().map(|row| row.2).collect()),
    )
    .unwrap()
}

/// Three float32 records:
///
/// * A: (0.1, 0.1) at 05:00 in January
/// * B: (0.1, 0.1) at 05:00 in February
/// * C: (9.9, 9.9) at 20:00 in January
pub(crate) fn three_record_dataset() -> Dataset {
    Dataset::from_columns(
        "x",
        "y",
        "t",
        Column::Float32(vec![0.1, 0.1, 9.9]),
        Column::Float32(vec![0.1, 0.1, 9.9]),
        Column::Int64(vec![
            timestamp(2015, 1, 10, 5),
            timestamp(2015, 2, 10, 5),
            timestamp(2015, 1, 20, 20),
        ]),
    )
    .unwrap()
}

/// `n` deterministic pseudo-random float64 records with coordinates in `[-1, 1)` and times
/// spread over 2015.
pub(crate) fn synthetic_dataset(n: usize) -> Dataset {
    let start = timestamp(2015, 1, 1, 0);
    let year = timestamp(2016, 1, 1, 0) - start;
    let mut state = 0x2545_f491_4f6c_dd1d_u64;
    let mut next = move || {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let unit = |bits: u64| (bits >> 11) as f64 / (1_u64 << 53) as f64;
    let rows: Vec<_> = (0..n)
        .map(|_| {
            let x = unit(next()) * 2.0 - 1.0;
            let y = unit(next()) * 2.0 - 1.0;
            let t = start + (next() % year as u64) as i64;
            (x, y, t)
        })
        .collect();
    dataset(&rows)
}

/// Number of records passing a filter, counted row by row.
pub(crate) fn matching_records(dataset: &Dataset, filter: MonthFilter) -> u64 {
    struct Matching(MonthFilter);
    impl ColumnsVisitor for Matching {
        type Output = u64;
        fn visit<T: Coordinate>(self, columns: Columns<'_, T>) -> u64 {
            columns
                .timestamps
                .iter()
                .filter(|&&timestamp| self.0.matches(timestamp))
                .count() as u64
        }
    }
    dataset.scan(Matching(filter))
}
