//! GPU device queries and the process-wide GPU instance.
//!
//! Ordering rules enforced here:
//!
//! 1. [`create_gpu_instance`] at most once until the matching destroy.
//! 2. [`destroy_gpu_instance`] only after every [`EngineHandle`](crate::EngineHandle)
//!    on the backend has been dropped.
//!
//! Backends with automatic instance management may skip both calls;
//! handles work either way.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::{Error, Result};

/// Lifecycle bookkeeping for one GPU instance.
#[derive(Debug, Default)]
pub struct InstanceState {
    created: AtomicBool,
    live_handles: AtomicUsize,
}

impl InstanceState {
    pub const fn new() -> Self {
        Self {
            created: AtomicBool::new(false),
            live_handles: AtomicUsize::new(0),
        }
    }

    /// Whether an instance was explicitly created and not yet destroyed.
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    /// Number of engine handles currently alive on this backend.
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::Acquire)
    }

    pub(crate) fn handle_opened(&self) {
        self.live_handles.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn handle_closed(&self) {
        self.live_handles.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Number of Vulkan devices the engine can see.
pub fn get_gpu_count<B: Backend>(backend: &B) -> i32 {
    backend.gpu_count()
}

/// Index of the device the engine picks when none is given.
pub fn get_default_gpu_index<B: Backend>(backend: &B) -> i32 {
    backend.default_gpu_index()
}

/// Create the process-wide GPU instance.
///
/// # Errors
///
/// - [`Error::InstanceAlreadyCreated`] if one is already live.
/// - [`Error::InstanceCreateFailed`] with the engine's status otherwise.
pub fn create_gpu_instance<B: Backend>(backend: &B) -> Result<()> {
    let state = backend.instance_state();
    if state.created.swap(true, Ordering::AcqRel) {
        return Err(Error::InstanceAlreadyCreated);
    }

    let ret = backend.create_gpu_instance();
    if ret != 0 {
        state.created.store(false, Ordering::Release);
        return Err(Error::InstanceCreateFailed(ret));
    }

    info!(gpu_count = backend.gpu_count(), "gpu instance created");
    Ok(())
}

/// Destroy the process-wide GPU instance, releasing all GPU resources.
///
/// # Errors
///
/// [`Error::InstanceInUse`] while any engine handle is still alive. The
/// instance is left untouched in that case.
pub fn destroy_gpu_instance<B: Backend>(backend: &B) -> Result<()> {
    let state = backend.instance_state();
    let live_handles = state.live_handles();
    if live_handles > 0 {
        return Err(Error::InstanceInUse { live_handles });
    }

    if !state.created.swap(false, Ordering::AcqRel) {
        warn!("destroying a gpu instance that was not explicitly created");
    }
    backend.destroy_gpu_instance();
    info!("gpu instance destroyed");
    Ok(())
}

/// Owns the GPU instance for a scope: created on construction, destroyed on drop.
///
/// ```rust,no_run
/// # #[cfg(feature = "dynamic")] {
/// use realesrgan_bind::{Device, EngineHandle, EngineLibrary, GpuInstance};
/// use std::sync::Arc;
///
/// let lib = Arc::new(EngineLibrary::load()?);
/// let instance = GpuInstance::create(&*lib)?;
/// {
///     let handle = EngineHandle::new(lib.clone(), Device::Gpu(0), false)?;
///     // ...
/// }
/// drop(instance);
/// # }
/// # Ok::<(), realesrgan_bind::Error>(())
/// ```
pub struct GpuInstance<'b, B: Backend> {
    backend: &'b B,
}

impl<'b, B: Backend> GpuInstance<'b, B> {
    pub fn create(backend: &'b B) -> Result<Self> {
        create_gpu_instance(backend)?;
        Ok(Self { backend })
    }
}

impl<B: Backend> Drop for GpuInstance<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = destroy_gpu_instance(self.backend) {
            warn!("gpu instance not destroyed: {e}");
        }
    }
}
