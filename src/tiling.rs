/// Border added around every tile before it enters the network.
///
/// The engine's tiled convolution needs this margin to avoid seams at
/// tile boundaries. It is not configurable.
pub const PREPADDING: u32 = 10;

/// Tile size used when no GPU heap budget exists (CPU-only sessions).
pub const CPU_TILE_SIZE: u32 = 200;

/// Largest tile size or scale the engine's `int` fields can hold.
pub const MAX_ENGINE_PARAM: u32 = i32::MAX as u32;

/// Smallest explicit tile size accepted by [`UpscalerConfig`](crate::UpscalerConfig).
pub const MIN_TILE_SIZE: u32 = 32;

/// Pick a tile size from a GPU heap budget in megabytes.
///
/// Larger tiles run faster but need more device memory. The thresholds are
/// empirical:
///
/// ```text
/// budget >= 1900 MB  -> 200
/// budget >=  550 MB  -> 100
/// budget >=  190 MB  ->  64
/// otherwise          ->  32
/// ```
///
/// # Example
///
/// ```
/// use realesrgan_bind::tile_size_for_heap_budget;
///
/// assert_eq!(tile_size_for_heap_budget(4096), 200);
/// assert_eq!(tile_size_for_heap_budget(600), 100);
/// assert_eq!(tile_size_for_heap_budget(128), 32);
/// ```
pub fn tile_size_for_heap_budget(heap_budget_mb: u32) -> u32 {
    if heap_budget_mb >= 1900 {
        200
    } else if heap_budget_mb >= 550 {
        100
    } else if heap_budget_mb >= 190 {
        64
    } else {
        32
    }
}

/// Resolved engine parameters, as forwarded to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameters {
    /// Tile edge in pixels. Never zero once resolved.
    pub tile_size: u32,
    /// Upscale factor.
    pub scale: u32,
    /// Always [`PREPADDING`].
    pub prepadding: u32,
}

impl Parameters {
    /// Resolve a requested tile size (0 = auto) against an auto value.
    ///
    /// Tile size and scale are clamped to [`MAX_ENGINE_PARAM`].
    pub fn resolve(requested_tile_size: u32, scale: u32, auto_tile_size: impl FnOnce() -> u32) -> Self {
        let tile_size = if requested_tile_size == 0 {
            auto_tile_size()
        } else {
            requested_tile_size
        };
        Self {
            tile_size: tile_size.min(MAX_ENGINE_PARAM),
            scale: scale.min(MAX_ENGINE_PARAM),
            prepadding: PREPADDING,
        }
    }
}
