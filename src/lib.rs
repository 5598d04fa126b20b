pub mod ffi;
pub mod error;
mod backend;
pub mod device;
mod engine;
mod image;
#[cfg(any(feature = "dynamic", feature = "static-link"))]
mod library;
mod path;
pub mod tiling;
mod upscaler;
#[cfg(all(feature = "python", any(feature = "dynamic", feature = "static-link")))]
mod python;

pub use backend::{Backend, Device};
pub use device::{
    create_gpu_instance, destroy_gpu_instance, get_default_gpu_index, get_gpu_count,
    GpuInstance, InstanceState,
};
pub use engine::EngineHandle;
pub use error::{Error, Result};
pub use image::{ImageBuffer, MatView, MatViewMut};
#[cfg(any(feature = "dynamic", feature = "static-link"))]
pub use library::{EngineLibrary, NativeSession, DEFAULT_LIB_PATH, LIB_PATH_ENV};
pub use tiling::{
    tile_size_for_heap_budget, Parameters, CPU_TILE_SIZE, MAX_ENGINE_PARAM, MIN_TILE_SIZE, PREPADDING,
};
pub use upscaler::{Upscaler, UpscalerConfig, DEFAULT_MODEL, DEFAULT_MODEL_DIR, SUPPORTED_SCALES};
