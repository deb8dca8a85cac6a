//! The synthetic workload: one dense square matrix multiply.

use crate::device::Device;
use crate::error::{BenchError, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Product of the timed multiply and how long it took.
#[derive(Debug)]
pub struct ComputeOutput {
    pub result: Array2<f32>,
    pub elapsed: Duration,
}

/// Matrix RNG for `rank`: seeded as `seed + rank` when a seed is given,
/// from OS entropy otherwise.
pub fn compute_rng(seed: Option<u64>, rank: u32) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(u64::from(rank))),
        None => StdRng::from_entropy(),
    }
}

fn random_matrix(size: usize, rng: &mut StdRng) -> Array2<f32> {
    Array2::from_shape_simple_fn((size, size), || rng.gen_range(-1.0f32..1.0))
}

/// Multiply two random `size × size` matrices on `device`.
///
/// The clock runs strictly between a device synchronization taken just
/// before the multiply and one taken after it completes. Allocation and
/// filling are not timed. Runs on the blocking pool so the async runtime
/// keeps servicing the transport meanwhile.
pub async fn run_compute(
    device: Arc<dyn Device>,
    size: usize,
    mut rng: StdRng,
) -> Result<ComputeOutput> {
    if size == 0 {
        return Err(BenchError::Config("matrix size must be at least 1".into()));
    }

    tokio::task::spawn_blocking(move || {
        let a = random_matrix(size, &mut rng);
        let b = random_matrix(size, &mut rng);

        device.synchronize()?;
        let start = Instant::now();
        let result = device.matmul(&a, &b)?;
        device.synchronize()?;
        let elapsed = start.elapsed();

        Ok(ComputeOutput { result, elapsed })
    })
    .await
    .map_err(|e| BenchError::compute_with_source("compute task did not finish", e))?
}
