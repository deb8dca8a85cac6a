use crate::device::DeviceKind;
use crate::device::adapter::Device;
use crate::error::{BenchError, Result};
use ndarray::Array2;

/// Host-memory device. Work completes before `matmul` returns.
#[derive(Debug, Clone, Default)]
pub struct CpuDevice;

impl CpuDevice {
    pub fn new() -> Self {
        Self
    }
}

impl Device for CpuDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Cpu
    }

    fn name(&self) -> String {
        "cpu".to_string()
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn matmul(&self, a: &Array2<f32>, b: &Array2<f32>) -> Result<Array2<f32>> {
        let (m, k) = a.dim();
        let (k2, n) = b.dim();
        if k != k2 {
            return Err(BenchError::compute(format!(
                "shape mismatch: {m}x{k} @ {k2}x{n}"
            )));
        }
        Ok(a.dot(b))
    }
}
