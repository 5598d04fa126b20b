use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load library: {0}")]
    LibraryNotFound(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("invalid device id {requested} (have {available} gpu devices)")]
    InvalidDevice { requested: i32, available: i32 },

    #[error("resr_session_create failed for device {0}")]
    SessionCreateFailed(i32),

    #[error("model load failed (code {0})")]
    LoadFailed(i32),

    #[error("process failed (code {0})")]
    ProcessFailed(i32),

    #[error("invalid buffer size: expected {expected} bytes, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    #[error("invalid image dimensions {width}x{height}x{channels}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        channels: u32,
    },

    #[error(
        "output buffer is {}x{}x{}, expected {}x{}x{}",
        .actual.0, .actual.1, .actual.2, .expected.0, .expected.1, .expected.2
    )]
    OutputSizeMismatch {
        expected: (u32, u32, u32),
        actual: (u32, u32, u32),
    },

    #[error("set_parameters must be called before process")]
    NotConfigured,

    #[error("load must succeed before process")]
    NotLoaded,

    #[error("path cannot be passed to the engine: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("gpu instance already created")]
    InstanceAlreadyCreated,

    #[error("create_gpu_instance failed (code {0})")]
    InstanceCreateFailed(i32),

    #[error("gpu instance still in use by {live_handles} engine handle(s)")]
    InstanceInUse { live_handles: usize },
}

impl Error {
    /// Engine status code carried by this error, if it came from the engine.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Error::LoadFailed(code)
            | Error::ProcessFailed(code)
            | Error::InstanceCreateFailed(code) => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
