//! Column names of the transaction and customer tables.

pub const USER_ID: &str = "user_id";
pub const FIRST_NAME: &str = "first_name";
pub const AGE: &str = "age";
pub const LOYALTY_TIER: &str = "loyalty_tier";
pub const BILL_AMOUNT: &str = "bill_amount";
pub const POINTS_EARNED: &str = "points_earned";
pub const POINTS_REDEEMED: &str = "points_redeemed";
pub const TOTAL_COUPONS_ISSUED: &str = "total_coupons_issued";
pub const COUPONS_REDEEMED_IN_BILL: &str = "coupons_redeemed_in_bill";
pub const TRANSACTION_DATE: &str = "transaction_date";
pub const LAST_TRANSACTION_DATE: &str = "last_transaction_date";
pub const DATE_OF_BIRTH: &str = "date_of_birth";
pub const STORE_NAME: &str = "store_name";
pub const ZONE: &str = "zone";

// Derived by the normalizer
pub const AGE_GROUP: &str = "age_group";
pub const TIER_LEVEL: &str = "tier_level";
pub const TRANSACTION_SIZE: &str = "transaction_size";
pub const HIGH_VALUE_TRANSACTION: &str = "high_value_transaction";
pub const TRANSACTION_YEAR: &str = "transaction_year";
pub const TRANSACTION_MONTH: &str = "transaction_month";
pub const TRANSACTION_DAY_OF_WEEK: &str = "transaction_day_of_week";
pub const WEEKEND: &str = "weekend";
pub const TRANSACTION_HOUR: &str = "transaction_hour";
pub const TIME_OF_DAY: &str = "time_of_day";
pub const STORE_POPULARITY: &str = "store_popularity";
pub const POINTS_UTILIZATION_RATE: &str = "points_utilization_rate";
pub const NET_POINTS_BALANCE: &str = "net_points_balance";
pub const COUPON_UTILIZATION_RATE: &str = "coupon_utilization_rate";
pub const DAYS_SINCE_LAST_TRANSACTION: &str = "days_since_last_transaction";

// Customer summary
pub const TRANSACTION_FREQUENCY: &str = "transaction_frequency";
pub const TOTAL_SPEND: &str = "total_spend";
pub const AVG_TRANSACTION_VALUE: &str = "avg_transaction_value";

pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_STORE: &str = "Unknown Store";
