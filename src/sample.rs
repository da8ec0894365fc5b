//! Random row sampling for trimming a large table to a training-sized one.

use crate::error::{PrepError, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::info;

pub const DEFAULT_SEED: u64 = 42;

/// Draw `n` distinct rows uniformly at random. The same seed always picks
/// the same rows in the same order.
pub fn sample_rows(df: &DataFrame, n: usize, seed: u64) -> Result<DataFrame> {
    let available = df.height();
    if n > available {
        return Err(PrepError::SampleTooLarge {
            requested: n,
            available,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let picked: Vec<IdxSize> = index::sample(&mut rng, available, n)
        .into_iter()
        .map(|i| i as IdxSize)
        .collect();

    let sampled = df.take(&IdxCa::from_vec("sample_idx", picked))?;
    info!("Sampled {} of {} rows (seed {})", n, available, seed);
    Ok(sampled)
}
