use loyalty_prep::normalizer::values::text_values;
use loyalty_prep::sink::{export_records, ExportOptions, SqliteSink};
use loyalty_prep::table_io::load_csv;
use loyalty_prep::{LoyaltyPipeline, PipelineConfig, PrepError};
use polars::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const RAW_CSV: &str = "\
user_id,first_name,age,loyalty_tier,bill_amount,points_earned,points_redeemed,\
    total_coupons_issued,coupons_redeemed_in_bill,transaction_date,last_transaction_date,\
    store_name,zone
U1,Asha,29,gold,\"₹1,500\",100,20,4,1,2024-03-09 19:30:00,2024-03-01 10:00:00,Phoenix Mall,North
U1,Asha,29,Gold,100,-10,0,0,0,2024-03-12 09:00:00,2024-03-15 09:00:00,Phoenix Mall,North
U2,,5,SILVER,300,50,60,2,2,2024-03-10 13:00:00,2024-03-09 13:00:00,,
,Ghost,40,Bronze,999,1,1,1,1,2024-03-10 13:00:00,,Phoenix Mall,South
U3,Meera,150,platinum,\"$12,000\",,5,3,,not-a-date,2024-01-01,Phoenix Mall,East
U2,Ravi,47,Silver,abc,10,0,1,0,2024-03-16 02:00:00,2024-03-10 13:00:00,City Centre,West
";

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("transactions.csv");
    std::fs::write(&path, RAW_CSV).unwrap();
    path
}

fn f64_column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name).unwrap().f64().unwrap().into_iter().collect()
}

fn i64_column(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
    df.column(name).unwrap().i64().unwrap().into_iter().collect()
}

#[test]
fn test_end_to_end_pipeline() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    let config = PipelineConfig {
        output_dir: dir.path().join("out"),
        ..Default::default()
    };

    let pipeline = LoyaltyPipeline::new(config.clone());
    let output = pipeline.run(&input).unwrap();
    let cleaned = &output.cleaned;

    // One row without user_id removed
    assert_eq!(output.cleaning.initial_rows, 6);
    assert_eq!(cleaned.height(), 5);
    assert_eq!(output.cleaning.removed_missing_user_id, 1);
    assert_eq!(cleaned.column("user_id").unwrap().null_count(), 0);

    // ₹1,500 -> 1500 (Medium, not high value); "abc" -> median of valid amounts
    let bills = f64_column(cleaned, "bill_amount");
    assert_eq!(bills[0], Some(1500.0));
    assert_eq!(bills[3], Some(12000.0));
    assert_eq!(bills[4], Some(900.0));
    let sizes = text_values(cleaned, "transaction_size").unwrap();
    assert_eq!(sizes[0].as_deref(), Some("Medium"));
    assert_eq!(sizes[3].as_deref(), Some("VIP"));
    assert_eq!(
        i64_column(cleaned, "high_value_transaction"),
        vec![Some(0), Some(0), Some(0), Some(1), Some(0)]
    );

    // Ages 5 and 150 replaced by the median of 29, 29, 47
    assert_eq!(
        f64_column(cleaned, "age"),
        vec![Some(29.0), Some(29.0), Some(29.0), Some(29.0), Some(47.0)]
    );

    // Tiers canonicalized, levels consistent
    let tiers = text_values(cleaned, "loyalty_tier").unwrap();
    let levels = i64_column(cleaned, "tier_level");
    for (tier, level) in tiers.iter().zip(&levels) {
        let expected = match tier.as_deref() {
            Some("Bronze") => 1,
            Some("Silver") => 2,
            Some("Gold") => 3,
            Some("Platinum") => 4,
            other => panic!("unexpected tier {:?}", other),
        };
        assert_eq!(*level, Some(expected));
    }

    // Negative points clamped to 0, not made positive
    assert_eq!(
        i64_column(cleaned, "points_earned"),
        vec![Some(100), Some(0), Some(50), Some(0), Some(10)]
    );

    // Rates stay in [0, 1], 0 when nothing was earned
    let rates = f64_column(cleaned, "points_utilization_rate");
    assert_eq!(rates[0], Some(0.2));
    assert_eq!(rates[1], Some(0.0));
    assert_eq!(rates[2], Some(1.0));
    assert!(rates.iter().flatten().all(|r| (0.0..=1.0).contains(r)));

    // Coupon counters filled and integer; rates 0 when nothing was issued
    assert_eq!(
        i64_column(cleaned, "coupons_redeemed_in_bill"),
        vec![Some(1), Some(0), Some(2), Some(0), Some(0)]
    );
    assert_eq!(
        f64_column(cleaned, "coupon_utilization_rate"),
        vec![Some(0.25), Some(0.0), Some(1.0), Some(0.0), Some(0.0)]
    );

    let names = text_values(cleaned, "first_name").unwrap();
    assert_eq!(names[2].as_deref(), Some("Unknown"));

    // -3 days clamped to 0; unparsable transaction date leaves recency missing
    assert_eq!(
        i64_column(cleaned, "days_since_last_transaction"),
        vec![Some(8), Some(0), Some(1), None, Some(5)]
    );

    let stores = text_values(cleaned, "store_name").unwrap();
    assert_eq!(stores[2].as_deref(), Some("Unknown Store"));
    assert_eq!(
        i64_column(cleaned, "store_popularity"),
        vec![Some(3), Some(3), Some(1), Some(3), Some(1)]
    );

    // Summary: one row per distinct user
    let summary = output.summary.as_ref().unwrap();
    assert_eq!(summary.height(), 3);
    assert_eq!(output.report.total_customers, Some(3));
    let ids = text_values(summary, "user_id").unwrap();
    assert_eq!(ids, vec![Some("U1".to_string()), Some("U2".to_string()), Some("U3".to_string())]);
    assert_eq!(i64_column(summary, "transaction_frequency"), vec![Some(2), Some(2), Some(1)]);
    assert_eq!(f64_column(summary, "total_spend")[0], Some(1600.0));
    assert_eq!(f64_column(summary, "avg_transaction_value")[0], Some(800.0));
    assert_eq!(
        text_values(summary, "zone").unwrap()[1].as_deref(),
        Some("West")
    );

    // Outputs written and readable
    assert!(config.cleaned_path().exists());
    assert!(config.summary_path().exists());
    let reloaded = load_csv(config.summary_path()).unwrap();
    assert_eq!(reloaded.height(), 3);
}

#[test]
fn test_missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let pipeline = LoyaltyPipeline::new(PipelineConfig {
        output_dir: dir.path().to_path_buf(),
        ..Default::default()
    });
    let err = pipeline.run(dir.path().join("absent.csv")).err().unwrap();
    assert!(matches!(err, PrepError::InputNotFound(_)));
}

#[test]
fn test_cleaned_output_round_trips_through_cleaning() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    let config = PipelineConfig {
        output_dir: dir.path().join("first"),
        ..Default::default()
    };
    LoyaltyPipeline::new(config.clone()).run(&input).unwrap();

    // Re-running on the cleaned file changes nothing that needs imputing.
    let second = LoyaltyPipeline::new(PipelineConfig {
        save_results: false,
        ..Default::default()
    })
    .run(config.cleaned_path())
    .unwrap();

    assert_eq!(second.cleaning.removed_missing_user_id, 0);
    assert_eq!(second.cleaning.invalid_ages, 0);
    assert_eq!(second.cleaning.imputed_ages, 0);
    assert_eq!(second.cleaning.unparsable_bill_amounts, 0);
    assert_eq!(second.cleaning.imputed_bill_amounts, 0);
    assert!(second.cleaning.clamped_negative_counts.is_empty());
    assert_eq!(second.cleaned.height(), 5);
}

#[test]
fn test_export_summary_to_sqlite() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path());
    let output = LoyaltyPipeline::new(PipelineConfig {
        save_results: false,
        ..Default::default()
    })
    .run(&input)
    .unwrap();

    let mut sink = SqliteSink::open(dir.path().join("kv.db"), "CustomerProfiles").unwrap();
    let options = ExportOptions {
        rename_key: Some("customer_id".to_string()),
        ..Default::default()
    };
    let summary = export_records(output.summary.as_ref().unwrap(), &options, &mut sink).unwrap();

    assert_eq!(summary.records_written, 3);
    let u3 = sink.get("U3").unwrap().unwrap();
    assert_eq!(u3["customer_id"], "U3");
    assert_eq!(u3["loyalty_tier"], "Platinum");
}
