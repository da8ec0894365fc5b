//! Record Normalizer
//!
//! Turns the raw transaction table into the cleaned one: drops rows without
//! a user_id, coerces every known column, imputes missing values and adds
//! the derived feature columns. Columns that are absent are skipped, never
//! reported as errors.

pub mod rules;
pub mod values;

use crate::columns::*;
use crate::error::Result;
use polars::prelude::*;
use rules::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What the normalizer fixed, removed and skipped during one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningReport {
    pub initial_rows: usize,
    pub final_rows: usize,
    pub removed_missing_user_id: usize,

    pub invalid_ages: usize,
    pub imputed_ages: usize,
    pub age_median: Option<f64>,

    pub unparsable_bill_amounts: usize,
    pub imputed_bill_amounts: usize,
    pub bill_amount_median: Option<f64>,

    /// Missing cells replaced by a default, per column
    pub filled_defaults: BTreeMap<String, usize>,
    pub clamped_negative_counts: BTreeMap<String, usize>,
    pub unparsable_dates: BTreeMap<String, usize>,
    pub clamped_negative_recency: usize,

    pub rules_applied: Vec<String>,
    pub rules_skipped: Vec<String>,
}

impl CleaningReport {
    pub fn record_filled(&mut self, column: &str, count: usize) {
        if count > 0 {
            self.filled_defaults.insert(column.to_string(), count);
        }
    }

    /// Number of cells still missing in the cleaned frame.
    pub fn remaining_missing(df: &DataFrame) -> usize {
        df.get_columns().iter().map(|s| s.null_count()).sum()
    }
}

/// Runs the cleaning rule table in order.
pub struct Normalizer {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        let rules: Vec<Box<dyn Rule>> = vec![
            Box::new(DropMissingUserId),
            Box::new(FillText {
                column: FIRST_NAME,
                default: UNKNOWN,
            }),
            Box::new(AgeRule),
            Box::new(TierRule),
            Box::new(BillAmountRule),
            Box::new(CounterRule {
                column: POINTS_EARNED,
                integerize: Integerize::Round,
            }),
            Box::new(CounterRule {
                column: POINTS_REDEEMED,
                integerize: Integerize::Round,
            }),
            Box::new(CounterRule {
                column: TOTAL_COUPONS_ISSUED,
                integerize: Integerize::Truncate,
            }),
            Box::new(CounterRule {
                column: COUPONS_REDEEMED_IN_BILL,
                integerize: Integerize::Truncate,
            }),
            Box::new(DateRule {
                column: TRANSACTION_DATE,
            }),
            Box::new(DateRule {
                column: LAST_TRANSACTION_DATE,
            }),
            Box::new(DateRule {
                column: DATE_OF_BIRTH,
            }),
            Box::new(TimeFeatures),
            // Popularity is counted after user_id filtering.
            Box::new(StoreRule),
            Box::new(FillText {
                column: ZONE,
                default: UNKNOWN,
            }),
            Box::new(PointsEngagement),
            Box::new(CouponEngagement),
            Box::new(Recency),
        ];
        Self { rules }
    }

    /// Build a normalizer around a custom rule table.
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Clean a raw transaction table.
    pub fn clean(&self, df: DataFrame) -> Result<(DataFrame, CleaningReport)> {
        let mut report = CleaningReport {
            initial_rows: df.height(),
            ..Default::default()
        };
        info!("Starting loyalty data cleaning: {:?}", df.shape());

        let mut df = df;
        for rule in &self.rules {
            let missing: Vec<&str> = rule
                .requires()
                .into_iter()
                .filter(|c| df.column(c).is_err())
                .collect();
            if !missing.is_empty() {
                debug!("Skipping rule '{}': missing columns {:?}", rule.name(), missing);
                report.rules_skipped.push(rule.name().to_string());
                continue;
            }
            df = rule.apply(df, &mut report)?;
            report.rules_applied.push(rule.name().to_string());
        }

        report.final_rows = df.height();
        info!(
            "Data cleaning completed: {:?}, {} missing values remaining",
            df.shape(),
            CleaningReport::remaining_missing(&df)
        );
        Ok((df, report))
    }
}

/// Clean with the default rule table.
pub fn clean_loyalty_data(df: DataFrame) -> Result<(DataFrame, CleaningReport)> {
    Normalizer::new().clean(df)
}
