//! Raw FFI bindings to `csrc/realesrgan_c_api.h`.
//!
//! These mirror the C header exactly. Use [`crate::EngineHandle`] and the
//! functions in [`crate::device`] for safe wrappers.

use std::ffi::c_void;

/// Opaque engine session (`resr_session`).
pub type ResrSession = c_void;

/// Native path character: `wchar_t` on Windows, `char` elsewhere.
#[cfg(windows)]
pub type PathChar = u16;
#[cfg(not(windows))]
pub type PathChar = std::ffi::c_char;

/// Packed interleaved 8-bit image (`resr_mat`).
///
/// The engine treats `c` as both the element size in bytes and the
/// element pack, so one pixel occupies exactly `c` bytes.
#[repr(C)]
#[derive(Debug)]
pub struct ResrMat {
    pub data: *mut u8,
    pub w: i32,
    pub h: i32,
    pub c: i32,
}

// Symbol names exported by the shim library
pub const SYM_GET_GPU_COUNT: &[u8] = b"resr_get_gpu_count";
pub const SYM_GET_DEFAULT_GPU_INDEX: &[u8] = b"resr_get_default_gpu_index";
pub const SYM_CREATE_GPU_INSTANCE: &[u8] = b"resr_create_gpu_instance";
pub const SYM_DESTROY_GPU_INSTANCE: &[u8] = b"resr_destroy_gpu_instance";
pub const SYM_GET_HEAP_BUDGET: &[u8] = b"resr_get_heap_budget";
pub const SYM_SESSION_CREATE: &[u8] = b"resr_session_create";
pub const SYM_SESSION_DESTROY: &[u8] = b"resr_session_destroy";
pub const SYM_SESSION_CONFIGURE: &[u8] = b"resr_session_configure";
pub const SYM_SESSION_LOAD: &[u8] = b"resr_session_load";
pub const SYM_SESSION_PROCESS: &[u8] = b"resr_session_process";

// Function type signatures for libloading
pub type FnGetGpuCount = unsafe extern "C" fn() -> i32;

pub type FnGetDefaultGpuIndex = unsafe extern "C" fn() -> i32;

pub type FnCreateGpuInstance = unsafe extern "C" fn() -> i32;

pub type FnDestroyGpuInstance = unsafe extern "C" fn();

pub type FnGetHeapBudget = unsafe extern "C" fn(i32) -> u32;

pub type FnSessionCreate = unsafe extern "C" fn(i32, i32) -> *mut ResrSession;

pub type FnSessionDestroy = unsafe extern "C" fn(*mut ResrSession);

pub type FnSessionConfigure = unsafe extern "C" fn(*mut ResrSession, i32, i32, i32);

pub type FnSessionLoad =
    unsafe extern "C" fn(*mut ResrSession, *const PathChar, *const PathChar) -> i32;

pub type FnSessionProcess =
    unsafe extern "C" fn(*const ResrSession, *const ResrMat, *mut ResrMat) -> i32;

/// Convert to a C `int`, saturating at `i32::MAX` instead of wrapping negative.
pub(crate) fn c_int(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Human-readable form of a symbol name constant.
pub(crate) fn symbol_name(sym: &[u8]) -> String {
    String::from_utf8_lossy(sym).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_int_never_wraps_negative() {
        assert_eq!(c_int(0), 0);
        assert_eq!(c_int(200), 200);
        assert_eq!(c_int(i32::MAX as u32), i32::MAX);
        assert_eq!(c_int(i32::MAX as u32 + 1), i32::MAX);
        assert_eq!(c_int(u32::MAX), i32::MAX);
    }
}
