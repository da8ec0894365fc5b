//! All-numeric export of a table for model training.

use crate::error::Result;
use crate::normalizer::values::{numeric_values, timestamp_values};
use polars::prelude::*;
use tracing::info;

/// Convert every column to `Float64` and fill every gap with 0.
///
/// Text is parsed as a number where possible (labels such as "Gold" become
/// 0), booleans become 0/1 and timestamps become epoch milliseconds.
pub fn to_ml_ready(df: &DataFrame) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(df.width());
    for series in df.get_columns() {
        let name = series.name();
        let values: Vec<f64> = match series.dtype() {
            DataType::Datetime(_, _) | DataType::Date => timestamp_values(df, name)?
                .into_iter()
                .map(|v| v.map(|ms| ms as f64).unwrap_or(0.0))
                .collect(),
            _ => numeric_values(df, name)?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect(),
        };
        columns.push(Series::new(name, values));
    }

    let ready = DataFrame::new(columns)?;
    info!("All columns converted to Float64: {:?}", ready.shape());
    Ok(ready)
}
