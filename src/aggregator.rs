//! Customer Aggregator
//!
//! Collapses the cleaned transaction table into one row per user_id with
//! spend and points statistics plus a snapshot of the customer's last row.

use crate::columns::*;
use crate::error::Result;
use polars::prelude::*;
use tracing::{info, warn};

const BILL_COUNT: &str = "bill_amount_count";
const BILL_SUM: &str = "bill_amount_sum";
const BILL_MEAN: &str = "bill_amount_mean";
const BILL_STD: &str = "bill_amount_std";

/// Columns carried over from the customer's most recent rows.
const SNAPSHOT_COLUMNS: [&str; 3] = [LOYALTY_TIER, AGE, ZONE];

/// Build the customer summary.
///
/// Snapshot columns take the last non-missing value of each group in input
/// order; a group with no value at all reports "Unknown".
///
/// Returns `Ok(None)` when the table has no `user_id` column: the summary
/// cannot be built, but that does not fail the run.
pub fn create_customer_summary(df: &DataFrame) -> Result<Option<DataFrame>> {
    if df.column(USER_ID).is_err() {
        warn!("Cannot create customer summary - user_id missing");
        return Ok(None);
    }
    let has = |name: &str| df.column(name).is_ok();

    let mut aggs: Vec<Expr> = Vec::new();
    let mut rounded: Vec<String> = Vec::new();
    let mut order: Vec<String> = vec![USER_ID.to_string()];

    if has(BILL_AMOUNT) {
        let bill = || col(BILL_AMOUNT).cast(DataType::Float64);
        aggs.push(bill().count().cast(DataType::Int64).alias(BILL_COUNT));
        aggs.push(bill().sum().alias(BILL_SUM));
        aggs.push(bill().mean().alias(BILL_MEAN));
        aggs.push(bill().std(1).alias(BILL_STD));
        rounded.extend([BILL_SUM, BILL_MEAN].map(String::from));
        order.extend([BILL_COUNT, BILL_SUM, BILL_MEAN, BILL_STD].map(String::from));
    }
    for points in [POINTS_EARNED, POINTS_REDEEMED] {
        if has(points) {
            let sum_name = format!("{}_sum", points);
            let mean_name = format!("{}_mean", points);
            aggs.push(col(points).sum().alias(&sum_name));
            aggs.push(col(points).cast(DataType::Float64).mean().alias(&mean_name));
            order.push(sum_name);
            order.push(mean_name.clone());
            rounded.push(mean_name);
        }
    }
    if has(BILL_AMOUNT) {
        order.extend(
            [TRANSACTION_FREQUENCY, TOTAL_SPEND, AVG_TRANSACTION_VALUE].map(String::from),
        );
    }

    // Last non-missing value of each group, in input order.
    let snapshot: Vec<&str> = SNAPSHOT_COLUMNS
        .iter()
        .copied()
        .filter(|c| has(*c))
        .collect();
    for column in &snapshot {
        aggs.push(col(column).drop_nulls().last());
        order.push(column.to_string());
    }

    let mut fixes: Vec<Expr> = rounded.iter().map(|c| col(c).round(2)).collect();
    if has(BILL_AMOUNT) {
        // Sample deviation is undefined for a single transaction.
        fixes.push(
            when(col(BILL_COUNT).lt(lit(2)))
                .then(lit(NULL).cast(DataType::Float64))
                .otherwise(col(BILL_STD).round(2))
                .alias(BILL_STD),
        );
    }
    fixes.extend(snapshot.iter().map(|c| {
        col(c)
            .cast(DataType::String)
            .fill_null(lit(UNKNOWN))
            .alias(c)
    }));

    let mut lazy = df
        .clone()
        .lazy()
        .group_by_stable([col(USER_ID)])
        .agg(aggs);
    if !fixes.is_empty() {
        lazy = lazy.with_columns(fixes);
    }
    if has(BILL_AMOUNT) {
        lazy = lazy.with_columns([
            col(BILL_COUNT).alias(TRANSACTION_FREQUENCY),
            col(BILL_SUM).alias(TOTAL_SPEND),
            col(BILL_MEAN).alias(AVG_TRANSACTION_VALUE),
        ]);
    }

    let selection: Vec<Expr> = order.iter().map(|c| col(c)).collect();
    let summary = lazy.select(selection).collect()?;
    info!("Customer summary created: {:?}", summary.shape());
    Ok(Some(summary))
}
