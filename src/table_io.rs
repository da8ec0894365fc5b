//! Delimited-text load and save for transaction and summary tables.

use crate::error::{PrepError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Load a CSV file with every column read as text.
///
/// Coercion is left to the cleaning rules, so a column that mixes numbers
/// and currency text never fails schema inference.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PrepError::InputNotFound(path.to_path_buf()));
    }

    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .map_err(|e| PrepError::Load(format!("Failed to scan {}: {}", path.display(), e)))?
        .collect()
        .map_err(|e| PrepError::Load(format!("Failed to read {}: {}", path.display(), e)))?;

    info!("Data loaded from {}: {:?}", path.display(), df.shape());
    info!("Columns: {:?}", df.get_column_names());
    Ok(df)
}

/// Write a table as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;

    info!("Saved {} ({:?})", path.display(), df.shape());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_fatal() {
        let err = load_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, PrepError::InputNotFound(_)));
    }

    #[test]
    fn test_columns_load_as_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(
            &path,
            "user_id,bill_amount,age\nU1,250,34\nU2,\"₹1,500\",\n",
        )
        .unwrap();

        let df = load_csv(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("bill_amount").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("bill_amount").unwrap().str().unwrap().get(1), Some("₹1,500"));
        let ages = crate::normalizer::values::text_values(&df, "age").unwrap();
        assert_eq!(ages, vec![Some("34".to_string()), None]);
    }

    #[test]
    fn test_write_then_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("table.csv");
        let mut df = df! [
            "user_id" => ["U1", "U2"],
            "total_spend" => [400.0, 50.5]
        ]
        .unwrap();

        write_csv(&mut df, &path).unwrap();
        let reloaded = load_csv(&path).unwrap();
        assert_eq!(reloaded.shape(), (2, 2));
        assert_eq!(reloaded.column("total_spend").unwrap().str().unwrap().get(1), Some("50.5"));
    }
}
