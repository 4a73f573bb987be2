//! Compute device selection.

use candle_core::Device;
use tracing::info;

/// Returns a GPU device if one can be initialised (CUDA first, then Metal).
///
/// Without the `cuda` or `metal` features both constructors fail and this
/// returns `None`.
pub fn select_accelerator() -> Option<Device> {
    if let Ok(cuda_device) = Device::new_cuda(0) {
        info!("Using CUDA GPU");
        return Some(cuda_device);
    }

    if let Ok(metal_device) = Device::new_metal(0) {
        info!("Using Metal GPU");
        return Some(metal_device);
    }

    None
}

/// Selects the best available compute device: CUDA -> Metal -> CPU.
pub fn select_device() -> Device {
    select_accelerator().unwrap_or_else(|| {
        info!("Using CPU");
        Device::Cpu
    })
}
