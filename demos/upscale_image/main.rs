//! Upscale a still image with RealESRGAN.
//!
//! Usage: cargo run --example upscale_image -- <model_dir> <model> <in.png> <out.png> [scale] [gpu] [tile_size]
//!
//! `gpu` is a device index or -1 for CPU. Set `REALESRGAN_NCNN_LIB` if the
//! engine shim is not on the library search path.

use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, ImageBuffer as PixelBuffer, Rgb, Rgba};
use realesrgan_bind::{
    get_default_gpu_index, get_gpu_count, Device, EngineLibrary, GpuInstance, Upscaler,
    UpscalerConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 5 {
        eprintln!("Usage: upscale_image <model_dir> <model> <in> <out> [scale] [gpu] [tile_size]");
        std::process::exit(1);
    }
    let scale: u32 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(4);
    let gpu: i32 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(0);
    let tile_size: u32 = args.get(7).and_then(|s| s.parse().ok()).unwrap_or(0);

    let lib = Arc::new(EngineLibrary::load().unwrap_or_else(|e| {
        eprintln!("Failed to load engine library: {}", e);
        std::process::exit(1);
    }));

    let _instance = GpuInstance::create(&*lib).unwrap_or_else(|e| {
        eprintln!("Failed to create gpu instance: {}", e);
        std::process::exit(1);
    });
    info!(
        gpu_count = get_gpu_count(&*lib),
        default_gpu = get_default_gpu_index(&*lib),
        "vulkan devices"
    );

    let device = Device::try_from_id(gpu).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
    let config = UpscalerConfig {
        device,
        tile_size,
        scale,
        model_dir: args[1].clone().into(),
        model: args[2].clone(),
        ..Default::default()
    };

    let img = image::open(&args[3]).expect("Failed to open image");
    let (w, h) = (img.width(), img.height());
    let has_alpha = img.color().has_alpha();
    let pixels = if has_alpha {
        img.to_rgba8().into_raw()
    } else {
        img.to_rgb8().into_raw()
    };

    // The upscaler owns an engine handle; drop it before the gpu instance.
    let out = {
        let upscaler = Upscaler::new(lib.clone(), config).unwrap_or_else(|e| {
            eprintln!("Failed to set up upscaler: {}", e);
            std::process::exit(1);
        });

        let start = Instant::now();
        let out = upscaler.upscale(&pixels, w, h).unwrap_or_else(|e| {
            eprintln!("Upscale failed: {}", e);
            std::process::exit(1);
        });
        println!(
            "{}x{} -> {}x{} in {:.1} ms",
            w,
            h,
            out.width(),
            out.height(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        out
    };

    let (out_w, out_h) = (out.width(), out.height());
    let result = if has_alpha {
        PixelBuffer::<Rgba<u8>, _>::from_raw(out_w, out_h, out.into_data()).map(DynamicImage::ImageRgba8)
    } else {
        PixelBuffer::<Rgb<u8>, _>::from_raw(out_w, out_h, out.into_data()).map(DynamicImage::ImageRgb8)
    };
    let result = result.expect("output buffer matches its declared shape");
    result.save(&args[4]).expect("Failed to save image");
    println!("Saved {}", args[4]);
}
