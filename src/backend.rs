//! The seam between the safe adapters and the engine.
//!
//! [`EngineLibrary`](crate::EngineLibrary) implements [`Backend`] over the
//! native shim. Anything else implementing it (an in-process stub, a
//! recording fake) can drive [`EngineHandle`](crate::EngineHandle) the same way.

use std::path::Path;

use crate::device::InstanceState;
use crate::error::Result;
use crate::image::{MatView, MatViewMut};
use crate::tiling::Parameters;

/// Compute device a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// CPU-only inference (no Vulkan device).
    Cpu,
    /// Vulkan device by index.
    Gpu(u32),
}

impl Device {
    /// Parse a raw device id: `-1` is the CPU, non-negative ids are GPUs.
    ///
    /// ```
    /// use realesrgan_bind::Device;
    ///
    /// assert_eq!(Device::try_from_id(-1)?, Device::Cpu);
    /// assert_eq!(Device::try_from_id(2)?, Device::Gpu(2));
    /// assert!(Device::try_from_id(-2).is_err());
    /// # Ok::<(), realesrgan_bind::Error>(())
    /// ```
    pub fn try_from_id(id: i32) -> Result<Self> {
        match id {
            -1 => Ok(Device::Cpu),
            id if id >= 0 => Ok(Device::Gpu(id as u32)),
            id => Err(crate::Error::InvalidConfig(format!(
                "device id must be >= -1, got {id}"
            ))),
        }
    }

    /// Id as passed across the C boundary. GPU indices past `i32::MAX`
    /// saturate rather than turning into the CPU sentinel.
    pub fn id(self) -> i32 {
        match self {
            Device::Cpu => -1,
            Device::Gpu(index) => crate::ffi::c_int(index),
        }
    }
}

impl From<i32> for Device {
    /// Lossy: every negative id maps to [`Device::Cpu`].
    fn from(id: i32) -> Self {
        if id < 0 {
            Device::Cpu
        } else {
            Device::Gpu(id as u32)
        }
    }
}

/// Engine entry points used by the adapters.
///
/// Status-returning methods use the engine's convention: `0` is success,
/// anything else is an engine-defined failure.
pub trait Backend {
    /// Per-session state owned by an [`EngineHandle`](crate::EngineHandle).
    type Session;

    fn gpu_count(&self) -> i32;

    fn default_gpu_index(&self) -> i32;

    fn create_gpu_instance(&self) -> i32;

    fn destroy_gpu_instance(&self);

    /// Heap budget of a GPU in megabytes.
    fn heap_budget(&self, gpu_index: u32) -> u32;

    /// Instance lifecycle bookkeeping shared by every handle on this backend.
    fn instance_state(&self) -> &InstanceState;

    fn create_session(&self, device: Device, tta_mode: bool) -> Result<Self::Session>;

    fn destroy_session(&self, session: &mut Self::Session);

    fn configure(&self, session: &mut Self::Session, params: &Parameters);

    fn load(&self, session: &mut Self::Session, param_path: &Path, model_path: &Path) -> Result<i32>;

    fn process(&self, session: &Self::Session, input: MatView<'_>, output: MatViewMut<'_>) -> i32;
}
