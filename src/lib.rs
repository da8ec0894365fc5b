pub mod aggregator;
pub mod columns;
pub mod config;
pub mod error;
pub mod ml_ready;
pub mod normalizer;
pub mod pipeline;
pub mod sample;
pub mod sink;
pub mod table_io;

pub use aggregator::create_customer_summary;
pub use config::PipelineConfig;
pub use error::{PrepError, Result};
pub use normalizer::{clean_loyalty_data, CleaningReport, Normalizer};
pub use pipeline::{process_loyalty_data, LoyaltyPipeline, PipelineOutput, PipelineReport};
