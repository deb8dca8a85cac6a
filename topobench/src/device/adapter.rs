use crate::device::DeviceKind;
use crate::error::Result;
use ndarray::Array2;

/// A compute target for the synthetic workload.
///
/// Callers time work between two `synchronize` calls, so an implementation
/// must not return from `synchronize` until everything submitted before it
/// has completed. Host-memory backends run synchronously and treat it as a
/// no-op; accelerator backends block on their queue.
pub trait Device: Send + Sync {
    fn kind(&self) -> DeviceKind;

    /// Human-readable name, e.g. `cpu` or `cuda:0`.
    fn name(&self) -> String;

    /// Block until all previously submitted work on this device has finished.
    fn synchronize(&self) -> Result<()>;

    /// Multiply two matrices. `a` is `m × k`, `b` is `k × n`.
    fn matmul(&self, a: &Array2<f32>, b: &Array2<f32>) -> Result<Array2<f32>>;
}
