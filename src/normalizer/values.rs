//! Column coercion helpers shared by the cleaning rules.
//!
//! Rules pull the columns they need out of the frame as plain typed vectors,
//! work on those, and write whole columns back. Everything here treats blank
//! text, unparsable text and NaN as missing.

use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;

lazy_static! {
    static ref CURRENCY_NOISE: Regex =
        Regex::new(r"[₹$£€¥,]").expect("currency pattern compiles");
}

const MILLIS_PER_DAY: i64 = 86_400_000;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Read a column as text. Blank or whitespace-only cells come back as
/// `None`; every other value is returned as stored.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()).map(str::to_string))
        .collect();
    Ok(values)
}

/// Read a column as floats. Text is parsed leniently; anything that does not
/// parse becomes `None`.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?;
    match series.dtype() {
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_number))
            .collect()),
        _ => {
            let floats = series.cast(&DataType::Float64)?;
            Ok(floats
                .f64()?
                .into_iter()
                .map(|v| v.filter(|f| !f.is_nan()))
                .collect())
        }
    }
}

/// Read a currency column. Text has currency symbols and thousands
/// separators stripped before parsing; numeric columns pass through.
pub fn currency_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?;
    if !matches!(series.dtype(), DataType::String) {
        return numeric_values(df, name);
    }
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_currency))
        .collect())
}

/// Read a timestamp column as epoch milliseconds.
pub fn timestamp_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df.column(name)?;
    let values = match series.dtype() {
        DataType::Datetime(unit, _) => {
            let factor_down = match unit {
                TimeUnit::Nanoseconds => 1_000_000,
                TimeUnit::Microseconds => 1_000,
                TimeUnit::Milliseconds => 1,
            };
            series
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|v| v.map(|raw| raw.div_euclid(factor_down)))
                .collect()
        }
        DataType::Date => series
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .map(|v| v.map(|days| days as i64 * MILLIS_PER_DAY))
            .collect(),
        _ => text_values(df, name)?
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_timestamp))
            .map(|v| v.map(|dt| dt.and_utc().timestamp_millis()))
            .collect(),
    };
    Ok(values)
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| !f.is_nan())
}

/// "₹1,500" -> 1500.0
pub fn parse_currency(raw: &str) -> Option<f64> {
    let stripped = CURRENCY_NOISE.replace_all(raw, "");
    parse_number(&stripped)
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Median of the present values, `None` when nothing is present.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Series::new("median", present).median()
}

/// Right-closed bucketing over ascending edges, the way `pd.cut` labels
/// values: `edges[i] < v <= edges[i + 1]` gets `labels[i]`.
pub fn bucket(value: f64, edges: &[f64], labels: &[&'static str]) -> Option<&'static str> {
    edges
        .windows(2)
        .zip(labels)
        .find(|(w, _)| value > w[0] && value <= w[1])
        .map(|(_, label)| *label)
}

pub fn datetime_series(name: &str, millis: Vec<Option<i64>>) -> Result<Series> {
    Ok(Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("₹1,500"), Some(1500.0));
        assert_eq!(parse_currency("$12,345.50"), Some(12345.5));
        assert_eq!(parse_currency("€ 20"), Some(20.0));
        assert_eq!(parse_currency("n/a"), None);
        assert_eq!(parse_currency(""), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-09 14:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-09T14:05:00.000"), Some(expected));
        assert_eq!(parse_timestamp("03/09/2024 14:05"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-09"),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_bucket_is_right_closed() {
        let edges = [0.0, 500.0, 2000.0];
        let labels = ["Small", "Medium"];
        assert_eq!(bucket(500.0, &edges, &labels), Some("Small"));
        assert_eq!(bucket(500.01, &edges, &labels), Some("Medium"));
        assert_eq!(bucket(0.0, &edges, &labels), None);
        assert_eq!(bucket(2500.0, &edges, &labels), None);
    }

    #[test]
    fn test_median_ignores_missing() {
        assert_eq!(median(&[Some(30.0), None, Some(40.0), Some(50.0)]), Some(40.0));
        assert_eq!(median(&[Some(30.0), Some(40.0)]), Some(35.0));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_numeric_values_from_text() {
        let df = df! [
            "age" => [Some("34"), Some("abc"), None, Some(" 41.5 ")]
        ]
        .unwrap();
        let values = numeric_values(&df, "age").unwrap();
        assert_eq!(values, vec![Some(34.0), None, None, Some(41.5)]);
    }

    #[test]
    fn test_text_values_keep_stored_text() {
        let df = df! [
            "store_name" => [Some("Mall "), Some("   "), None, Some(" Kiosk")]
        ]
        .unwrap();
        let values = text_values(&df, "store_name").unwrap();
        assert_eq!(
            values,
            vec![Some("Mall ".to_string()), None, None, Some(" Kiosk".to_string())]
        );
    }
}
