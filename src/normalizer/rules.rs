//! Cleaning rules applied by the [`Normalizer`](super::Normalizer).
//!
//! Each rule names the columns it needs and turns one frame into the next.
//! Rules never fail on bad cell values: they count what they fixed in the
//! [`CleaningReport`] and move on.

use super::values::{
    bucket, currency_values, datetime_series, from_millis, median, numeric_values,
    text_values, timestamp_values,
};
use super::CleaningReport;
use crate::columns::*;
use crate::error::Result;
use chrono::{Datelike, Timelike};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::info;

pub const MIN_VALID_AGE: f64 = 13.0;
pub const MAX_VALID_AGE: f64 = 100.0;
pub const HIGH_VALUE_THRESHOLD: f64 = 10_000.0;

const AGE_EDGES: [f64; 6] = [0.0, 25.0, 35.0, 50.0, 65.0, 100.0];
const AGE_LABELS: [&str; 5] = ["18-25", "26-35", "36-50", "51-65", "65+"];

const SIZE_EDGES: [f64; 5] = [0.0, 500.0, 2_000.0, 10_000.0, f64::INFINITY];
const SIZE_LABELS: [&str; 4] = ["Small", "Medium", "Large", "VIP"];

const HOUR_EDGES: [f64; 5] = [-1.0, 6.0, 12.0, 18.0, 24.0];
const HOUR_LABELS: [&str; 4] = ["Night", "Morning", "Afternoon", "Evening"];

/// Canonical tier names, ordered by tier level.
pub const TIERS: [&str; 4] = ["Bronze", "Silver", "Gold", "Platinum"];

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A single cleaning step.
pub trait Rule {
    fn name(&self) -> &'static str;

    /// Columns that must all be present for the rule to run.
    fn requires(&self) -> Vec<&'static str>;

    fn apply(&self, df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame>;
}

/// Map case variants of a tier name to its canonical spelling. Unknown
/// names are returned unchanged.
pub fn canonical_tier(raw: &str) -> String {
    let trimmed = raw.trim();
    TIERS
        .iter()
        .find(|tier| tier.eq_ignore_ascii_case(trimmed))
        .map(|tier| tier.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Bronze = 1 .. Platinum = 4; anything else counts as Bronze.
pub fn tier_level(tier: &str) -> i64 {
    TIERS
        .iter()
        .position(|t| *t == tier)
        .map(|i| i as i64 + 1)
        .unwrap_or(1)
}

pub fn age_group(age: f64) -> Option<&'static str> {
    bucket(age, &AGE_EDGES, &AGE_LABELS)
}

pub fn transaction_size(amount: f64) -> Option<&'static str> {
    bucket(amount, &SIZE_EDGES, &SIZE_LABELS)
}

pub fn time_of_day(hour: u32) -> Option<&'static str> {
    bucket(hour as f64, &HOUR_EDGES, &HOUR_LABELS)
}

fn fill_text(values: Vec<Option<String>>, default: &str) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| default.to_string()))
        .collect()
}

/// Ratio of `part / whole` when `whole > 0`, else 0. Clamped into [0, 1].
fn utilization(part: Option<f64>, whole: Option<f64>) -> Option<f64> {
    match whole {
        Some(w) if w > 0.0 => part.map(|p| (p / w).clamp(0.0, 1.0)),
        _ => Some(0.0),
    }
}

pub struct DropMissingUserId;

impl Rule for DropMissingUserId {
    fn name(&self) -> &'static str {
        "drop_missing_user_id"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![USER_ID]
    }

    fn apply(&self, df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let keep: Vec<bool> = text_values(&df, USER_ID)?
            .iter()
            .map(Option::is_some)
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return Ok(df);
        }

        let mask = Series::new("keep", keep);
        let df = df.filter(mask.bool()?)?;
        report.removed_missing_user_id = removed;
        info!("Removed {} records with missing user_id", removed);
        Ok(df)
    }
}

/// Replace missing text with a fixed label.
pub struct FillText {
    pub column: &'static str,
    pub default: &'static str,
}

impl Rule for FillText {
    fn name(&self) -> &'static str {
        self.column
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![self.column]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let values = text_values(&df, self.column)?;
        let filled = values.iter().filter(|v| v.is_none()).count();
        df.with_column(Series::new(self.column, fill_text(values, self.default)))?;
        report.record_filled(self.column, filled);
        info!("Cleaned {} ({} filled with '{}')", self.column, filled, self.default);
        Ok(df)
    }
}

/// Invalidate out-of-range ages, impute the median, derive `age_group`.
pub struct AgeRule;

impl Rule for AgeRule {
    fn name(&self) -> &'static str {
        "age"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![AGE]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let mut invalid = 0;
        let valid: Vec<Option<f64>> = numeric_values(&df, AGE)?
            .into_iter()
            .map(|v| match v {
                Some(age) if (MIN_VALID_AGE..=MAX_VALID_AGE).contains(&age) => Some(age),
                Some(_) => {
                    invalid += 1;
                    None
                }
                None => None,
            })
            .collect();

        // The fill value comes from the ages that survived invalidation.
        let fill = median(&valid);
        let missing = valid.iter().filter(|v| v.is_none()).count();
        let ages: Vec<Option<f64>> = valid.into_iter().map(|v| v.or(fill)).collect();
        let groups: Vec<Option<&str>> = ages.iter().map(|a| a.and_then(age_group)).collect();

        df.with_column(Series::new(AGE, ages))?;
        df.with_column(Series::new(AGE_GROUP, groups))?;

        report.invalid_ages = invalid;
        report.age_median = fill;
        if fill.is_some() {
            report.imputed_ages = missing;
        }
        info!(
            "Cleaned age ({} out of range, {} imputed with median {:?}) and created age groups",
            invalid, report.imputed_ages, fill
        );
        Ok(df)
    }
}

/// Default and canonicalize tier names, derive `tier_level`.
pub struct TierRule;

impl Rule for TierRule {
    fn name(&self) -> &'static str {
        "loyalty_tier"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![LOYALTY_TIER]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let values = text_values(&df, LOYALTY_TIER)?;
        let filled = values.iter().filter(|v| v.is_none()).count();
        let tiers: Vec<String> = fill_text(values, TIERS[0])
            .iter()
            .map(|t| canonical_tier(t))
            .collect();
        let levels: Vec<i64> = tiers.iter().map(|t| tier_level(t)).collect();

        df.with_column(Series::new(LOYALTY_TIER, tiers))?;
        df.with_column(Series::new(TIER_LEVEL, levels))?;
        report.record_filled(LOYALTY_TIER, filled);
        info!("Standardized loyalty tiers ({} defaulted to Bronze)", filled);
        Ok(df)
    }
}

/// Parse currency text, impute the median, derive size bucket and the
/// high-value flag.
pub struct BillAmountRule;

impl Rule for BillAmountRule {
    fn name(&self) -> &'static str {
        "bill_amount"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![BILL_AMOUNT]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let raw = text_values(&df, BILL_AMOUNT)?;
        let parsed = currency_values(&df, BILL_AMOUNT)?;
        let unparsable = raw
            .iter()
            .zip(&parsed)
            .filter(|(r, p)| r.is_some() && p.is_none())
            .count();

        let fill = median(&parsed);
        let missing = parsed.iter().filter(|v| v.is_none()).count();
        let amounts: Vec<Option<f64>> = parsed.into_iter().map(|v| v.or(fill)).collect();
        let sizes: Vec<Option<&str>> = amounts
            .iter()
            .map(|a| a.and_then(transaction_size))
            .collect();
        let high_value: Vec<i64> = amounts
            .iter()
            .map(|a| matches!(a, Some(v) if *v > HIGH_VALUE_THRESHOLD) as i64)
            .collect();

        df.with_column(Series::new(BILL_AMOUNT, amounts))?;
        df.with_column(Series::new(TRANSACTION_SIZE, sizes))?;
        df.with_column(Series::new(HIGH_VALUE_TRANSACTION, high_value))?;

        report.unparsable_bill_amounts = unparsable;
        report.bill_amount_median = fill;
        if fill.is_some() {
            report.imputed_bill_amounts = missing;
        }
        info!(
            "Cleaned transaction amounts ({} unparsable, {} imputed with median {:?})",
            unparsable, report.imputed_bill_amounts, fill
        );
        Ok(df)
    }
}

#[derive(Clone, Copy)]
pub enum Integerize {
    Round,
    Truncate,
}

/// Non-negative integer counter: missing -> 0, negative -> 0.
pub struct CounterRule {
    pub column: &'static str,
    pub integerize: Integerize,
}

impl Rule for CounterRule {
    fn name(&self) -> &'static str {
        self.column
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![self.column]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let mut filled = 0;
        let mut clamped = 0;
        let counts: Vec<i64> = numeric_values(&df, self.column)?
            .into_iter()
            .map(|v| match v {
                None => {
                    filled += 1;
                    0
                }
                Some(n) if n < 0.0 => {
                    clamped += 1;
                    0
                }
                Some(n) => match self.integerize {
                    Integerize::Round => n.round() as i64,
                    Integerize::Truncate => n.trunc() as i64,
                },
            })
            .collect();

        df.with_column(Series::new(self.column, counts))?;
        report.record_filled(self.column, filled);
        if clamped > 0 {
            report.clamped_negative_counts.insert(self.column.to_string(), clamped);
        }
        info!("Cleaned {} ({} filled, {} negative clamped to 0)", self.column, filled, clamped);
        Ok(df)
    }
}

/// Parse a timestamp column; unparsable cells become missing.
pub struct DateRule {
    pub column: &'static str,
}

impl Rule for DateRule {
    fn name(&self) -> &'static str {
        self.column
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![self.column]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let raw = text_values(&df, self.column)?;
        let millis = timestamp_values(&df, self.column)?;
        let unparsable = raw
            .iter()
            .zip(&millis)
            .filter(|(r, m)| r.is_some() && m.is_none())
            .count();

        df.with_column(datetime_series(self.column, millis)?)?;
        if unparsable > 0 {
            report.unparsable_dates.insert(self.column.to_string(), unparsable);
        }
        info!("Cleaned {} ({} unparsable)", self.column, unparsable);
        Ok(df)
    }
}

/// Calendar and time-of-day features from `transaction_date`.
pub struct TimeFeatures;

impl Rule for TimeFeatures {
    fn name(&self) -> &'static str {
        "time_features"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![TRANSACTION_DATE]
    }

    fn apply(&self, mut df: DataFrame, _report: &mut CleaningReport) -> Result<DataFrame> {
        let stamps: Vec<_> = timestamp_values(&df, TRANSACTION_DATE)?
            .into_iter()
            .map(|ms| ms.and_then(from_millis))
            .collect();

        let year: Vec<Option<i64>> = stamps.iter().map(|t| t.map(|t| t.year() as i64)).collect();
        let month: Vec<Option<i64>> = stamps.iter().map(|t| t.map(|t| t.month() as i64)).collect();
        let day_of_week: Vec<Option<i64>> = stamps
            .iter()
            .map(|t| t.map(|t| t.weekday().num_days_from_monday() as i64))
            .collect();
        let weekend: Vec<i64> = day_of_week
            .iter()
            .map(|d| matches!(d, Some(d) if *d >= 5) as i64)
            .collect();
        let hour: Vec<Option<i64>> = stamps.iter().map(|t| t.map(|t| t.hour() as i64)).collect();
        let part_of_day: Vec<Option<&str>> = stamps
            .iter()
            .map(|t| t.and_then(|t| time_of_day(t.hour())))
            .collect();

        df.with_column(Series::new(TRANSACTION_YEAR, year))?;
        df.with_column(Series::new(TRANSACTION_MONTH, month))?;
        df.with_column(Series::new(TRANSACTION_DAY_OF_WEEK, day_of_week))?;
        df.with_column(Series::new(WEEKEND, weekend))?;
        df.with_column(Series::new(TRANSACTION_HOUR, hour))?;
        df.with_column(Series::new(TIME_OF_DAY, part_of_day))?;
        info!("Created time-based features");
        Ok(df)
    }
}

/// Default store names and count how often each store occurs in the table.
pub struct StoreRule;

impl Rule for StoreRule {
    fn name(&self) -> &'static str {
        "store_name"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![STORE_NAME]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let values = text_values(&df, STORE_NAME)?;
        let filled = values.iter().filter(|v| v.is_none()).count();
        let stores = fill_text(values, UNKNOWN_STORE);

        // Full pass over the table before any per-row lookup.
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for store in &stores {
            *counts.entry(store.as_str()).or_insert(0) += 1;
        }
        let popularity: Vec<i64> = stores.iter().map(|s| counts[s.as_str()]).collect();
        let distinct = counts.len();

        df.with_column(Series::new(STORE_POPULARITY, popularity))?;
        df.with_column(Series::new(STORE_NAME, stores))?;
        report.record_filled(STORE_NAME, filled);
        info!("Cleaned store data ({} distinct stores)", distinct);
        Ok(df)
    }
}

pub struct PointsEngagement;

impl Rule for PointsEngagement {
    fn name(&self) -> &'static str {
        "points_engagement"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![POINTS_EARNED, POINTS_REDEEMED]
    }

    fn apply(&self, mut df: DataFrame, _report: &mut CleaningReport) -> Result<DataFrame> {
        let earned = numeric_values(&df, POINTS_EARNED)?;
        let redeemed = numeric_values(&df, POINTS_REDEEMED)?;

        let rate: Vec<Option<f64>> = earned
            .iter()
            .zip(&redeemed)
            .map(|(e, r)| utilization(*r, *e))
            .collect();
        let balance: Vec<Option<i64>> = earned
            .iter()
            .zip(&redeemed)
            .map(|(e, r)| match (e, r) {
                (Some(e), Some(r)) => Some((e - r) as i64),
                _ => None,
            })
            .collect();

        df.with_column(Series::new(POINTS_UTILIZATION_RATE, rate))?;
        df.with_column(Series::new(NET_POINTS_BALANCE, balance))?;
        info!("Created points engagement metrics");
        Ok(df)
    }
}

pub struct CouponEngagement;

impl Rule for CouponEngagement {
    fn name(&self) -> &'static str {
        "coupon_engagement"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![TOTAL_COUPONS_ISSUED, COUPONS_REDEEMED_IN_BILL]
    }

    fn apply(&self, mut df: DataFrame, _report: &mut CleaningReport) -> Result<DataFrame> {
        let issued = numeric_values(&df, TOTAL_COUPONS_ISSUED)?;
        let redeemed = numeric_values(&df, COUPONS_REDEEMED_IN_BILL)?;
        let rate: Vec<Option<f64>> = issued
            .iter()
            .zip(&redeemed)
            .map(|(i, r)| utilization(*r, *i))
            .collect();

        df.with_column(Series::new(COUPON_UTILIZATION_RATE, rate))?;
        info!("Created coupon engagement metrics");
        Ok(df)
    }
}

/// Whole days between the transaction and the previous one, never negative.
pub struct Recency;

impl Rule for Recency {
    fn name(&self) -> &'static str {
        "recency"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![TRANSACTION_DATE, LAST_TRANSACTION_DATE]
    }

    fn apply(&self, mut df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let current = timestamp_values(&df, TRANSACTION_DATE)?;
        let previous = timestamp_values(&df, LAST_TRANSACTION_DATE)?;

        let mut clamped = 0;
        let days: Vec<Option<i64>> = current
            .iter()
            .zip(&previous)
            .map(|(c, p)| match (c, p) {
                (Some(c), Some(p)) => {
                    let d = (c - p).div_euclid(MILLIS_PER_DAY);
                    if d < 0 {
                        clamped += 1;
                        Some(0)
                    } else {
                        Some(d)
                    }
                }
                _ => None,
            })
            .collect();

        df.with_column(Series::new(DAYS_SINCE_LAST_TRANSACTION, days))?;
        report.clamped_negative_recency = clamped;
        info!("Calculated customer recency ({} negative values clamped)", clamped);
        Ok(df)
    }
}
