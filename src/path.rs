// Path encoding for the engine's file API: wide strings on Windows,
// NUL-terminated bytes everywhere else.

use std::path::Path;

use crate::error::{Error, Result};
use crate::ffi::PathChar;

/// A path encoded for `resr_session_load`, NUL terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NativePath(Vec<PathChar>);

impl NativePath {
    #[cfg(windows)]
    pub fn new(path: &Path) -> Result<Self> {
        use std::os::windows::ffi::OsStrExt;

        let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
        if wide.contains(&0) {
            return Err(Error::InvalidPath(path.to_path_buf()));
        }
        wide.push(0);
        Ok(Self(wide))
    }

    #[cfg(not(windows))]
    pub fn new(path: &Path) -> Result<Self> {
        use std::os::unix::ffi::OsStrExt;

        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
            .map_err(|_| Error::InvalidPath(path.to_path_buf()))?;
        Ok(Self(
            c_path
                .into_bytes_with_nul()
                .into_iter()
                .map(|b| b as PathChar)
                .collect(),
        ))
    }

    pub fn as_ptr(&self) -> *const PathChar {
        self.0.as_ptr()
    }

    #[cfg(test)]
    fn units(&self) -> &[PathChar] {
        &self.0
    }
}
