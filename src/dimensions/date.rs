// 📅 Date dimension - calendar attributes per distinct sales date
// The date itself is the key; there is no surrogate.

use crate::sanitize::{default_date, parse_date_value};
use crate::table::Table;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRecord {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    /// English month name ("January")
    pub month_name: String,
    /// ISO 8601 week number
    pub week: u32,
    /// English weekday name ("Monday")
    pub weekday: String,
}

impl DateRecord {
    pub fn new(date: NaiveDate) -> Self {
        DateRecord {
            date,
            year: date.year(),
            month: date.month(),
            month_name: date.format("%B").to_string(),
            week: date.iso_week().week(),
            weekday: date.format("%A").to_string(),
        }
    }
}

/// Distinct dates of `date_column`, in order of first appearance.
/// Values that do not parse count as the default date, same as in the fact table.
pub fn build_date_dimension(sales: &Table, date_column: &str) -> Vec<DateRecord> {
    let Some(idx) = sales.column_index(date_column) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let records: Vec<DateRecord> = sales
        .column_values(idx)
        .map(|value| parse_date_value(value).unwrap_or_else(default_date))
        .filter(|date| seen.insert(*date))
        .map(DateRecord::new)
        .collect();

    info!(rows = records.len(), column = date_column, "dim_date built");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    #[test]
    fn test_calendar_attributes() {
        let record = DateRecord::new(NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());

        assert_eq!(record.year, 2024);
        assert_eq!(record.month, 12);
        assert_eq!(record.month_name, "December");
        // 2024-12-30 belongs to ISO week 1 of 2025
        assert_eq!(record.week, 1);
        assert_eq!(record.weekday, "Monday");
    }

    #[test]
    fn test_distinct_dates() {
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let sales = Table::new("sales", vec!["DATE".to_string()]).with_rows(vec![
            vec![Value::Date(d1)],
            vec![Value::Date(d2)],
            vec![Value::Date(d1)],
            vec![Value::text("2024-02-01")],
            vec![Value::text("bogus")],
        ]);

        let dim = build_date_dimension(&sales, "DATE");

        let dates: Vec<NaiveDate> = dim.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d1, d2, default_date()]);
    }

    #[test]
    fn test_missing_column_is_empty() {
        let sales = Table::new("sales", vec!["OTHER".to_string()]);
        assert!(build_date_dimension(&sales, "DATE").is_empty());
    }
}
