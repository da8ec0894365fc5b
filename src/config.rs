use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output settings for a pipeline run. Every field has a default, so a
/// config file only needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory receiving the cleaned table and the customer summary
    pub output_dir: PathBuf,

    pub cleaned_file: String,

    pub summary_file: String,

    /// Write the output tables to disk
    pub save_results: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            cleaned_file: "cleaned_loyalty_data.csv".to_string(),
            summary_file: "customer_summary.csv".to_string(),
            save_results: true,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PrepError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cleaned_file.trim().is_empty() || self.summary_file.trim().is_empty() {
            return Err(PrepError::Config("output file names must not be empty".to_string()));
        }
        if self.cleaned_file == self.summary_file {
            return Err(PrepError::Config(format!(
                "cleaned and summary outputs share the file name '{}'",
                self.cleaned_file
            )));
        }
        Ok(())
    }

    pub fn cleaned_path(&self) -> PathBuf {
        self.output_dir.join(&self.cleaned_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.summary_file)
    }
}
