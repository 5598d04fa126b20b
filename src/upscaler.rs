//! One-call upscaling on top of [`EngineHandle`].

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::backend::{Backend, Device};
use crate::engine::EngineHandle;
use crate::error::{Error, Result};
use crate::image::ImageBuffer;
use crate::tiling::MIN_TILE_SIZE;

pub const DEFAULT_MODEL: &str = "RealESRGAN_General_WDN_x4_v3";
pub const DEFAULT_MODEL_DIR: &str = "models";
pub const SUPPORTED_SCALES: [u32; 3] = [2, 3, 4];

/// Settings for an [`Upscaler`].
///
/// The model is looked up as `<model_dir>/<model>.param` and
/// `<model_dir>/<model>.bin`. Its scale must match `scale`; model names
/// usually carry it (`x4`, `x2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscalerConfig {
    pub device: Device,
    /// Test-time augmentation: better quality, roughly 8x slower.
    pub tta_mode: bool,
    /// Tile edge in pixels; 0 picks one from the GPU heap budget.
    pub tile_size: u32,
    pub scale: u32,
    pub model_dir: PathBuf,
    pub model: String,
}

impl Default for UpscalerConfig {
    fn default() -> Self {
        Self {
            device: Device::Gpu(0),
            tta_mode: false,
            tile_size: 0,
            scale: 4,
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl UpscalerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tile_size != 0 && self.tile_size < MIN_TILE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "tile size must be 0 or >= {MIN_TILE_SIZE}, got {}",
                self.tile_size
            )));
        }
        if !SUPPORTED_SCALES.contains(&self.scale) {
            return Err(Error::InvalidConfig(format!(
                "scale must be one of {SUPPORTED_SCALES:?}, got {}",
                self.scale
            )));
        }
        if self.model.is_empty() {
            return Err(Error::InvalidConfig("model name is empty".into()));
        }
        Ok(())
    }

    pub fn param_path(&self) -> PathBuf {
        self.model_dir.join(format!("{}.param", self.model))
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(format!("{}.bin", self.model))
    }
}

/// A configured, loaded engine that upscales raw frames.
///
/// ```rust,no_run
/// # #[cfg(feature = "dynamic")] {
/// use std::sync::Arc;
/// use realesrgan_bind::{EngineLibrary, Upscaler, UpscalerConfig};
///
/// let lib = Arc::new(EngineLibrary::load()?);
/// let upscaler = Upscaler::new(lib, UpscalerConfig::default())?;
/// # let rgb = vec![0u8; 32 * 32 * 3];
/// let out = upscaler.upscale(&rgb, 32, 32)?;
/// assert_eq!(out.shape(), (128, 128, 3));
/// # }
/// # Ok::<(), realesrgan_bind::Error>(())
/// ```
pub struct Upscaler<B: Backend> {
    engine: EngineHandle<B>,
    config: UpscalerConfig,
}

impl<B: Backend> Upscaler<B> {
    /// Validate `config`, open a session, set parameters and load the model.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for an out-of-range tile size or scale.
    /// - [`Error::ModelNotFound`] if either model file is missing.
    /// - Anything [`EngineHandle::new`] or [`EngineHandle::load`] returns.
    pub fn new(backend: Arc<B>, config: UpscalerConfig) -> Result<Self> {
        config.validate()?;

        let (param_path, model_path) = (config.param_path(), config.model_path());
        for path in [&param_path, &model_path] {
            if !path.is_file() {
                return Err(Error::ModelNotFound(path.clone()));
            }
        }

        let mut engine = EngineHandle::new(backend, config.device, config.tta_mode)?;
        engine.set_parameters(config.tile_size, config.scale);
        engine.load(&param_path, &model_path)?;

        info!(
            model = %config.model,
            device = config.device.id(),
            scale = config.scale,
            "upscaler ready"
        );
        Ok(Self { engine, config })
    }

    pub fn config(&self) -> &UpscalerConfig {
        &self.config
    }

    pub fn engine(&self) -> &EngineHandle<B> {
        &self.engine
    }

    /// Upscale one interleaved 8-bit frame.
    ///
    /// The channel count is inferred as `pixels.len() / (width * height)`.
    pub fn upscale(&self, pixels: &[u8], width: u32, height: u32) -> Result<ImageBuffer> {
        let channels = infer_channels(pixels.len(), width, height)?;
        let input = ImageBuffer::new(pixels.to_vec(), width, height, channels)?;
        let scale = self.config.scale;
        let (out_w, out_h) = width
            .checked_mul(scale)
            .zip(height.checked_mul(scale))
            .ok_or(Error::InvalidDimensions {
                width,
                height,
                channels,
            })?;
        let mut output = ImageBuffer::zeroed(out_w, out_h, channels)?;
        self.engine.process(&input, &mut output)?;
        Ok(output)
    }

    /// Upscale a single-channel float mask with values in `0.0..=1.0`.
    ///
    /// Values are quantized to 8 bits (`255 * v`, truncated) before the
    /// engine sees them, so the result is a multiple of `1/255`.
    pub fn upscale_mask(&self, mask: &[f32], width: u32, height: u32) -> Result<Vec<f32>> {
        let expected = width as usize * height as usize;
        if mask.len() != expected {
            return Err(Error::InvalidBufferSize {
                expected,
                actual: mask.len(),
            });
        }
        let pixels: Vec<u8> = mask
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect();
        let output = self.upscale(&pixels, width, height)?;
        Ok(output.data().iter().map(|&b| f32::from(b) / 255.0).collect())
    }
}

fn infer_channels(len: usize, width: u32, height: u32) -> Result<u32> {
    let pixels = width as usize * height as usize;
    if pixels == 0 || len == 0 || len % pixels != 0 {
        return Err(Error::InvalidBufferSize {
            expected: pixels,
            actual: len,
        });
    }
    u32::try_from(len / pixels).map_err(|_| Error::InvalidBufferSize {
        expected: pixels,
        actual: len,
    })
}
