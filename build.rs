//! Build script for realesrgan-bind.
//!
//! When the `static-link` feature is enabled, compiles `csrc/realesrgan_c_api.cpp`
//! together with the RealESRGAN engine sources and links against ncnn.
//!
//! Requirements (static-link feature only):
//! - `REALESRGAN_SRC_DIR`: directory holding `realesrgan.h` / `realesrgan.cpp`
//!   and the generated shader headers
//! - `NCNN_DIR`: ncnn install prefix (`include/ncnn`, `lib`)
//! - Vulkan loader available to the linker

fn main() {
    #[cfg(feature = "static-link")]
    {
        build_shim();
    }
}

#[cfg(feature = "static-link")]
fn build_shim() {
    let src_dir = std::env::var("REALESRGAN_SRC_DIR")
        .unwrap_or_else(|_| panic!("REALESRGAN_SRC_DIR must point at the RealESRGAN sources"));
    let ncnn_dir = std::env::var("NCNN_DIR")
        .unwrap_or_else(|_| panic!("NCNN_DIR must point at the ncnn install prefix"));

    let mut build = cc::Build::new();

    build
        .cpp(true)
        .file("csrc/realesrgan_c_api.cpp")
        .file(format!("{src_dir}/realesrgan.cpp"))
        .include("csrc")
        .include(&src_dir)
        .include(format!("{ncnn_dir}/include/ncnn"))
        .flag_if_supported("-std=c++11")
        .flag_if_supported("-fopenmp")
        .warnings(false);

    build.compile("realesrgan_c_api");

    println!("cargo:rustc-link-search=native={ncnn_dir}/lib");
    println!("cargo:rustc-link-lib=static=ncnn");
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        println!("cargo:rustc-link-lib=vulkan-1");
    } else {
        println!("cargo:rustc-link-lib=vulkan");
        println!("cargo:rustc-link-lib=gomp");
    }

    println!("cargo:rerun-if-changed=csrc/realesrgan_c_api.cpp");
    println!("cargo:rerun-if-changed=csrc/realesrgan_c_api.h");
    println!("cargo:rerun-if-env-changed=REALESRGAN_SRC_DIR");
    println!("cargo:rerun-if-env-changed=NCNN_DIR");
}
