//! High-level engine API.
//!
//! This module contains [`EngineHandle`] - one RealESRGAN session bound to
//! a device.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{Backend, Device};
use crate::error::{Error, Result};
use crate::image::ImageBuffer;
use crate::tiling::{tile_size_for_heap_budget, Parameters, CPU_TILE_SIZE};

/// A RealESRGAN session bound to one device.
///
/// # Lifecycle
///
/// 1. **Create** with [`new`](Self::new) for a device and TTA mode.
/// 2. **Configure** with [`set_parameters`](Self::set_parameters) (tile size, scale).
/// 3. **Load** the `.param` / `.bin` pair with [`load`](Self::load).
/// 4. **Process** frames with [`process`](Self::process), as many times as needed.
///
/// # Example
///
/// ```rust,no_run
/// # #[cfg(feature = "dynamic")] {
/// use std::sync::Arc;
/// use realesrgan_bind::{Device, EngineHandle, EngineLibrary, ImageBuffer};
///
/// let lib = Arc::new(EngineLibrary::load()?);
/// let mut engine = EngineHandle::new(lib, Device::Gpu(0), false)?;
/// engine.set_parameters(0, 4);
/// engine.load("models/realesr-animevideov3-x4.param", "models/realesr-animevideov3-x4.bin")?;
///
/// let input = ImageBuffer::zeroed(64, 64, 3)?;
/// let mut output = ImageBuffer::zeroed(256, 256, 3)?;
/// engine.process(&input, &mut output)?;
/// # }
/// # Ok::<(), realesrgan_bind::Error>(())
/// ```
///
/// # Drop order
///
/// The session is released on drop. The backend is kept alive through the
/// `Arc` until the last handle on it is gone.
pub struct EngineHandle<B: Backend> {
    session: B::Session,
    backend: Arc<B>,
    device: Device,
    tta_mode: bool,
    params: Option<Parameters>,
    loaded: bool,
}

impl<B: Backend> EngineHandle<B> {
    /// Create a session on `device`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDevice`] if the GPU index is not below the device count.
    /// - [`Error::SessionCreateFailed`] if the engine refuses the session.
    pub fn new(backend: Arc<B>, device: Device, tta_mode: bool) -> Result<Self> {
        if let Device::Gpu(index) = device {
            let available = backend.gpu_count();
            if index as i64 >= available as i64 {
                return Err(Error::InvalidDevice {
                    requested: device.id(),
                    available,
                });
            }
        }

        let session = backend.create_session(device, tta_mode)?;
        backend.instance_state().handle_opened();
        debug!(device = device.id(), tta_mode, "engine session created");

        Ok(Self {
            session,
            backend,
            device,
            tta_mode,
            params: None,
            loaded: false,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn tta_mode(&self) -> bool {
        self.tta_mode
    }

    /// Parameters set by the last [`set_parameters`](Self::set_parameters) call.
    pub fn parameters(&self) -> Option<Parameters> {
        self.params
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Tile size derived from the device's current heap budget.
    ///
    /// CPU sessions have no heap budget and get [`CPU_TILE_SIZE`].
    pub fn compute_default_tile_size(&self) -> u32 {
        match self.device {
            Device::Cpu => CPU_TILE_SIZE,
            Device::Gpu(index) => {
                let heap_budget = self.backend.heap_budget(index);
                let tile_size = tile_size_for_heap_budget(heap_budget);
                debug!(gpu = index, heap_budget, tile_size, "auto tile size");
                tile_size
            }
        }
    }

    /// Set tile size and scale. A tile size of `0` picks one from the heap
    /// budget. Pre-padding is always [`PREPADDING`](crate::PREPADDING).
    pub fn set_parameters(&mut self, tile_size: u32, scale: u32) {
        let params = Parameters::resolve(tile_size, scale, || self.compute_default_tile_size());
        self.backend.configure(&mut self.session, &params);
        debug!(
            tile_size = params.tile_size,
            scale = params.scale,
            prepadding = params.prepadding,
            "engine parameters set"
        );
        self.params = Some(params);
    }

    /// Load network topology and weights.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPath`] if a path cannot be encoded for the engine.
    /// - [`Error::LoadFailed`] with the engine's status code.
    pub fn load(&mut self, param_path: impl AsRef<Path>, model_path: impl AsRef<Path>) -> Result<()> {
        let (param_path, model_path) = (param_path.as_ref(), model_path.as_ref());
        let ret = self.backend.load(&mut self.session, param_path, model_path)?;
        if ret != 0 {
            warn!(
                param = %param_path.display(),
                model = %model_path.display(),
                code = ret,
                "model load failed"
            );
            self.loaded = false;
            return Err(Error::LoadFailed(ret));
        }

        debug!(param = %param_path.display(), model = %model_path.display(), "model loaded");
        self.loaded = true;
        Ok(())
    }

    /// Upscale `input` into `output`.
    ///
    /// `output` must already be `(width * scale, height * scale, channels)`
    /// of `input`; the engine writes into its storage in place.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConfigured`] before [`set_parameters`](Self::set_parameters).
    /// - [`Error::NotLoaded`] before a successful [`load`](Self::load).
    /// - [`Error::OutputSizeMismatch`] if `output` has the wrong shape.
    /// - [`Error::ProcessFailed`] with the engine's status code.
    pub fn process(&self, input: &ImageBuffer, output: &mut ImageBuffer) -> Result<()> {
        let params = self.params.ok_or(Error::NotConfigured)?;
        if !self.loaded {
            return Err(Error::NotLoaded);
        }

        let expected = upscaled_shape(input, params.scale)?;
        if output.shape() != expected {
            return Err(Error::OutputSizeMismatch {
                expected,
                actual: output.shape(),
            });
        }

        let ret = self
            .backend
            .process(&self.session, input.view(), output.view_mut());
        if ret != 0 {
            return Err(Error::ProcessFailed(ret));
        }
        Ok(())
    }
}

impl<B: Backend> Drop for EngineHandle<B> {
    fn drop(&mut self) {
        self.backend.destroy_session(&mut self.session);
        self.backend.instance_state().handle_closed();
        debug!(device = self.device.id(), "engine session destroyed");
    }
}

fn upscaled_shape(input: &ImageBuffer, scale: u32) -> Result<(u32, u32, u32)> {
    let (w, h, c) = input.shape();
    match (w.checked_mul(scale), h.checked_mul(scale)) {
        (Some(w), Some(h)) => Ok((w, h, c)),
        _ => Err(Error::InvalidDimensions {
            width: w,
            height: h,
            channels: c,
        }),
    }
}
