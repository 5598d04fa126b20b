// Native engine library: symbol resolution and the `Backend` impl over it.
// Users interact with `EngineHandle` and the `device` functions.

use std::path::Path;
use std::ptr::NonNull;

use tracing::info;

use crate::backend::{Backend, Device};
use crate::device::InstanceState;
use crate::error::{Error, Result};
use crate::ffi::*;
use crate::image::{MatView, MatViewMut};
use crate::path::NativePath;
use crate::tiling::Parameters;

/// Environment variable overriding the shim library location.
pub const LIB_PATH_ENV: &str = "REALESRGAN_NCNN_LIB";

#[cfg(target_os = "windows")]
pub const DEFAULT_LIB_PATH: &str = "realesrgan_c_api.dll";
#[cfg(target_os = "macos")]
pub const DEFAULT_LIB_PATH: &str = "librealesrgan_c_api.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_LIB_PATH: &str = "librealesrgan_c_api.so";

// ncnn keeps one GPU instance per process, whichever library handle loaded it.
static NATIVE_INSTANCE: InstanceState = InstanceState::new();

/// Function pointers resolved from the shim library (or linked statically).
struct EngineFunctions {
    get_gpu_count: FnGetGpuCount,
    get_default_gpu_index: FnGetDefaultGpuIndex,
    create_gpu_instance: FnCreateGpuInstance,
    destroy_gpu_instance: FnDestroyGpuInstance,
    get_heap_budget: FnGetHeapBudget,
    session_create: FnSessionCreate,
    session_destroy: FnSessionDestroy,
    session_configure: FnSessionConfigure,
    session_load: FnSessionLoad,
    session_process: FnSessionProcess,
}

/// The RealESRGAN engine shim.
///
/// Share it between handles with an `Arc`. With the `dynamic` feature the
/// `_lib` field keeps the loaded library mapped for as long as any handle
/// exists.
pub struct EngineLibrary {
    funcs: EngineFunctions,
    #[cfg(feature = "dynamic")]
    _lib: libloading::Library,
}

/// Live native session (`resr_session*`).
pub struct NativeSession(NonNull<ResrSession>);

impl EngineLibrary {
    /// Load the shim from `$REALESRGAN_NCNN_LIB`, or [`DEFAULT_LIB_PATH`]
    /// through the platform's library search path.
    pub fn load() -> Result<Self> {
        match std::env::var(LIB_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load_from(path),
            _ => Self::load_from(DEFAULT_LIB_PATH),
        }
    }

    /// Load the shim at runtime and resolve every entry point.
    #[cfg(feature = "dynamic")]
    pub fn load_from(lib_path: impl AsRef<Path>) -> Result<Self> {
        let lib_path = lib_path.as_ref();
        let lib = unsafe {
            libloading::Library::new(lib_path)
                .map_err(|_| Error::LibraryNotFound(lib_path.display().to_string()))?
        };

        let funcs = unsafe {
            EngineFunctions {
                get_gpu_count: resolve(&lib, SYM_GET_GPU_COUNT)?,
                get_default_gpu_index: resolve(&lib, SYM_GET_DEFAULT_GPU_INDEX)?,
                create_gpu_instance: resolve(&lib, SYM_CREATE_GPU_INSTANCE)?,
                destroy_gpu_instance: resolve(&lib, SYM_DESTROY_GPU_INSTANCE)?,
                get_heap_budget: resolve(&lib, SYM_GET_HEAP_BUDGET)?,
                session_create: resolve(&lib, SYM_SESSION_CREATE)?,
                session_destroy: resolve(&lib, SYM_SESSION_DESTROY)?,
                session_configure: resolve(&lib, SYM_SESSION_CONFIGURE)?,
                session_load: resolve(&lib, SYM_SESSION_LOAD)?,
                session_process: resolve(&lib, SYM_SESSION_PROCESS)?,
            }
        };

        info!(path = %lib_path.display(), "engine library loaded");
        Ok(Self { funcs, _lib: lib })
    }

    /// Static-link variant: symbols resolved at link time, path ignored.
    #[cfg(all(feature = "static-link", not(feature = "dynamic")))]
    pub fn load_from(_lib_path: impl AsRef<Path>) -> Result<Self> {
        extern "C" {
            fn resr_get_gpu_count() -> i32;
            fn resr_get_default_gpu_index() -> i32;
            fn resr_create_gpu_instance() -> i32;
            fn resr_destroy_gpu_instance();
            fn resr_get_heap_budget(gpuid: i32) -> u32;
            fn resr_session_create(gpuid: i32, tta_mode: i32) -> *mut ResrSession;
            fn resr_session_destroy(session: *mut ResrSession);
            fn resr_session_configure(
                session: *mut ResrSession,
                scale: i32,
                tilesize: i32,
                prepadding: i32,
            );
            fn resr_session_load(
                session: *mut ResrSession,
                parampath: *const PathChar,
                modelpath: *const PathChar,
            ) -> i32;
            fn resr_session_process(
                session: *const ResrSession,
                input: *const ResrMat,
                output: *mut ResrMat,
            ) -> i32;
        }

        let funcs = EngineFunctions {
            get_gpu_count: resr_get_gpu_count,
            get_default_gpu_index: resr_get_default_gpu_index,
            create_gpu_instance: resr_create_gpu_instance,
            destroy_gpu_instance: resr_destroy_gpu_instance,
            get_heap_budget: resr_get_heap_budget,
            session_create: resr_session_create,
            session_destroy: resr_session_destroy,
            session_configure: resr_session_configure,
            session_load: resr_session_load,
            session_process: resr_session_process,
        };

        info!("engine library linked statically");
        Ok(Self { funcs })
    }
}

#[cfg(feature = "dynamic")]
unsafe fn resolve<T: Copy>(lib: &libloading::Library, sym: &[u8]) -> Result<T> {
    lib.get::<T>(sym)
        .map(|s| *s)
        .map_err(|_| Error::SymbolNotFound(symbol_name(sym)))
}

impl Backend for EngineLibrary {
    type Session = NativeSession;

    fn gpu_count(&self) -> i32 {
        unsafe { (self.funcs.get_gpu_count)() }
    }

    fn default_gpu_index(&self) -> i32 {
        unsafe { (self.funcs.get_default_gpu_index)() }
    }

    fn create_gpu_instance(&self) -> i32 {
        unsafe { (self.funcs.create_gpu_instance)() }
    }

    fn destroy_gpu_instance(&self) {
        unsafe { (self.funcs.destroy_gpu_instance)() }
    }

    fn heap_budget(&self, gpu_index: u32) -> u32 {
        unsafe { (self.funcs.get_heap_budget)(c_int(gpu_index)) }
    }

    fn instance_state(&self) -> &InstanceState {
        &NATIVE_INSTANCE
    }

    fn create_session(&self, device: Device, tta_mode: bool) -> Result<NativeSession> {
        let raw = unsafe { (self.funcs.session_create)(device.id(), tta_mode as i32) };
        NonNull::new(raw)
            .map(NativeSession)
            .ok_or(Error::SessionCreateFailed(device.id()))
    }

    fn destroy_session(&self, session: &mut NativeSession) {
        unsafe { (self.funcs.session_destroy)(session.0.as_ptr()) }
    }

    fn configure(&self, session: &mut NativeSession, params: &Parameters) {
        unsafe {
            (self.funcs.session_configure)(
                session.0.as_ptr(),
                c_int(params.scale),
                c_int(params.tile_size),
                c_int(params.prepadding),
            )
        }
    }

    fn load(&self, session: &mut NativeSession, param_path: &Path, model_path: &Path) -> Result<i32> {
        let param_path = NativePath::new(param_path)?;
        let model_path = NativePath::new(model_path)?;
        Ok(unsafe {
            (self.funcs.session_load)(session.0.as_ptr(), param_path.as_ptr(), model_path.as_ptr())
        })
    }

    fn process(&self, session: &NativeSession, input: MatView<'_>, output: MatViewMut<'_>) -> i32 {
        // The engine never writes through the input mat.
        let in_mat = ResrMat {
            data: input.data.as_ptr() as *mut u8,
            w: c_int(input.width),
            h: c_int(input.height),
            c: c_int(input.channels),
        };
        let mut out_mat = ResrMat {
            data: output.data.as_mut_ptr(),
            w: c_int(output.width),
            h: c_int(output.height),
            c: c_int(output.channels),
        };
        unsafe { (self.funcs.session_process)(session.0.as_ptr(), &in_mat, &mut out_mat) }
    }
}
