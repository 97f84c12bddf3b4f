pub mod attendance;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod payslip;
pub mod role;
pub mod salary;
pub mod tax_table;
pub mod time_correction;

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};

/// Closed calendar range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[display(fmt = "{}..{}", start, end)]
pub struct DateRange {
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-01-15")]
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> HrResult<Self> {
        if start > end {
            return Err(HrError::validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DateRange { start, end })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    /// Calendar days in the range that are not the weekly rest day.
    pub fn working_days(&self, rest_day: Weekday) -> u32 {
        self.days().filter(|d| d.weekday() != rest_day).count() as u32
    }
}

/// Parses an enum stored as text, treating garbage as a corrupt row.
pub fn parse_column<T: FromStr>(column: &'static str, value: &str) -> HrResult<T> {
    value
        .parse()
        .map_err(|_| HrError::Corrupt(format!("unexpected {column} value '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(DateRange::new(date(2026, 1, 10), date(2026, 1, 1)).is_err());
    }

    #[test]
    fn working_days_skip_the_rest_day() {
        // 2026-02-01 is a Sunday; the week through Saturday has six working days
        let week = DateRange::new(date(2026, 2, 1), date(2026, 2, 7)).unwrap();
        assert_eq!(week.working_days(Weekday::Sun), 6);
        assert_eq!(week.days().count(), 7);
    }

    #[test]
    fn overlap_includes_shared_edges() {
        let a = DateRange::new(date(2026, 1, 1), date(2026, 1, 15)).unwrap();
        let b = DateRange::new(date(2026, 1, 15), date(2026, 1, 31)).unwrap();
        let c = DateRange::new(date(2026, 1, 16), date(2026, 1, 31)).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.intersect(&b).map(|r| r.start), Some(date(2026, 1, 15)));
        assert_eq!(a.intersect(&c), None);
        assert_eq!(a.to_string(), "2026-01-01..2026-01-15");
    }
}
