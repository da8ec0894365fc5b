//! Loyalty data processing pipeline
//!
//! load -> normalize -> summarize -> (optionally) save, followed by a short
//! report of what the cleaned data contains.

use crate::aggregator::create_customer_summary;
use crate::columns::*;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::normalizer::values::{numeric_values, text_values};
use crate::normalizer::{CleaningReport, Normalizer};
use crate::table_io::{load_csv, write_csv};
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Headline numbers of a cleaned transaction table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineReport {
    pub total_customers: Option<usize>,
    pub total_transactions: usize,
    pub total_revenue: Option<f64>,
    pub average_transaction: Option<f64>,
    /// (tier, rows), most common tier first
    pub tier_distribution: Vec<(String, usize)>,
}

impl PipelineReport {
    pub fn from_cleaned(df: &DataFrame) -> Result<Self> {
        let mut report = PipelineReport {
            total_transactions: df.height(),
            ..Default::default()
        };

        if df.column(USER_ID).is_ok() {
            report.total_customers = Some(df.column(USER_ID)?.n_unique()?);
        }

        if df.column(BILL_AMOUNT).is_ok() {
            let amounts: Vec<f64> =
                numeric_values(df, BILL_AMOUNT)?.into_iter().flatten().collect();
            let total: f64 = amounts.iter().sum();
            report.total_revenue = Some(total);
            if !amounts.is_empty() {
                report.average_transaction = Some(total / amounts.len() as f64);
            }
        }

        if df.column(LOYALTY_TIER).is_ok() {
            report.tier_distribution = text_values(df, LOYALTY_TIER)?
                .into_iter()
                .flatten()
                .counts()
                .into_iter()
                .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
                .collect();
        }

        Ok(report)
    }
}

/// Format with thousands separators and two decimals: 1234567.5 -> "1,234,567.50"
fn with_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let grouped = int_part
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .join(",");
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FINAL SUMMARY:")?;
        match self.total_customers {
            Some(n) => writeln!(f, "  Total customers: {}", n)?,
            None => writeln!(f, "  Total customers: N/A")?,
        }
        writeln!(f, "  Total transactions: {}", self.total_transactions)?;
        if let Some(revenue) = self.total_revenue {
            writeln!(f, "  Total revenue: ₹{}", with_thousands(revenue))?;
        }
        if let Some(avg) = self.average_transaction {
            writeln!(f, "  Average transaction: ₹{:.2}", avg)?;
        }
        if !self.tier_distribution.is_empty() {
            writeln!(f, "  Loyalty tier distribution:")?;
            for (tier, count) in &self.tier_distribution {
                writeln!(f, "    {}: {} customers", tier, count)?;
            }
        }
        Ok(())
    }
}

/// Everything a run produces.
pub struct PipelineOutput {
    pub cleaned: DataFrame,
    pub summary: Option<DataFrame>,
    pub cleaning: CleaningReport,
    pub report: PipelineReport,
}

pub struct LoyaltyPipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
}

impl LoyaltyPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            normalizer: Normalizer::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline on a CSV file.
    pub fn run(&self, input: impl AsRef<Path>) -> Result<PipelineOutput> {
        info!("LOYALTY DATA PROCESSING PIPELINE");
        let raw = load_csv(input)?;
        let mut output = self.process(raw)?;

        if self.config.save_results {
            self.save(&mut output)?;
        }
        Ok(output)
    }

    /// Clean and summarize an already loaded table. Nothing is written.
    pub fn process(&self, raw: DataFrame) -> Result<PipelineOutput> {
        let (cleaned, cleaning) = self.normalizer.clean(raw)?;
        let summary = create_customer_summary(&cleaned)?;
        let report = PipelineReport::from_cleaned(&cleaned)?;

        Ok(PipelineOutput {
            cleaned,
            summary,
            cleaning,
            report,
        })
    }

    fn save(&self, output: &mut PipelineOutput) -> Result<()> {
        write_csv(&mut output.cleaned, self.config.cleaned_path())?;
        match output.summary.as_mut() {
            Some(summary) => write_csv(summary, self.config.summary_path())?,
            None => warn!("No customer summary to save"),
        }
        Ok(())
    }
}

/// Run with default settings.
pub fn process_loyalty_data(input: impl AsRef<Path>, save_results: bool) -> Result<PipelineOutput> {
    let config = PipelineConfig {
        save_results,
        ..Default::default()
    };
    LoyaltyPipeline::new(config).run(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_thousands() {
        assert_eq!(with_thousands(1234567.5), "1,234,567.50");
        assert_eq!(with_thousands(999.0), "999.00");
        assert_eq!(with_thousands(-1500.0), "-1,500.00");
        assert_eq!(with_thousands(0.0), "0.00");
    }

    #[test]
    fn test_report_from_cleaned() {
        let df = df! [
            "user_id" => ["U1", "U2", "U1", "U3"],
            "bill_amount" => [100.0, 300.0, 200.0, 400.0],
            "loyalty_tier" => ["Gold", "Bronze", "Gold", "Bronze"]
        ]
        .unwrap();
        let report = PipelineReport::from_cleaned(&df).unwrap();

        assert_eq!(report.total_customers, Some(3));
        assert_eq!(report.total_transactions, 4);
        assert_eq!(report.total_revenue, Some(1000.0));
        assert_eq!(report.average_transaction, Some(250.0));
        assert_eq!(
            report.tier_distribution,
            vec![("Bronze".to_string(), 2), ("Gold".to_string(), 2)]
        );

        let rendered = report.to_string();
        assert!(rendered.contains("Total revenue: ₹1,000.00"));
        assert!(rendered.contains("Bronze: 2 customers"));
    }

    #[test]
    fn test_process_without_user_id_keeps_cleaned_output() {
        let df = df! [
            "bill_amount" => [Some("100"), None]
        ]
        .unwrap();
        let output = LoyaltyPipeline::new(PipelineConfig::default()).process(df).unwrap();
        assert!(output.summary.is_none());
        assert_eq!(output.cleaned.height(), 2);
        assert_eq!(output.report.total_customers, None);
    }
}
