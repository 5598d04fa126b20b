//! `realesrgan_bind` Python extension module.
//!
//! Mirrors the Rust API with the engine's int status convention: `load`,
//! `process` and `create_gpu_instance` return `0` on success and the
//! engine's code on failure. Contract violations caught on this side
//! (bad buffer sizes, bad device ids, lifecycle misuse) raise instead.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::backend::Device;
use crate::device;
use crate::engine::EngineHandle;
use crate::error::{Error, Result};
use crate::image::ImageBuffer;
use crate::library::EngineLibrary;

static LIBRARY: OnceLock<Arc<EngineLibrary>> = OnceLock::new();

fn library() -> PyResult<Arc<EngineLibrary>> {
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib.clone());
    }
    let lib = Arc::new(EngineLibrary::load().map_err(to_py_err)?);
    Ok(LIBRARY.get_or_init(|| lib).clone())
}

fn to_py_err(e: Error) -> PyErr {
    match e {
        Error::InvalidBufferSize { .. }
        | Error::InvalidDimensions { .. }
        | Error::OutputSizeMismatch { .. }
        | Error::InvalidDevice { .. }
        | Error::InvalidPath(_)
        | Error::InvalidConfig(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

/// Engine failures become status codes, everything else raises.
fn status(result: Result<()>) -> PyResult<i32> {
    match result {
        Ok(()) => Ok(0),
        Err(e) => match e.status_code() {
            Some(code) => Ok(code),
            None => Err(to_py_err(e)),
        },
    }
}

#[pyclass(name = "ImageBuffer", module = "realesrgan_bind")]
pub struct PyImageBuffer {
    inner: ImageBuffer,
}

#[pymethods]
impl PyImageBuffer {
    #[new]
    fn new(data: &[u8], width: u32, height: u32, channels: u32) -> PyResult<Self> {
        let inner = ImageBuffer::new(data.to_vec(), width, height, channels).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn get_data<'py>(&self, py: Python<'py>) -> Bound<'py, PyBytes> {
        PyBytes::new(py, self.inner.data())
    }

    fn set_data(&mut self, data: &[u8]) -> PyResult<()> {
        self.inner.set_data(data.to_vec()).map_err(to_py_err)
    }

    #[getter]
    fn width(&self) -> u32 {
        self.inner.width()
    }

    #[getter]
    fn height(&self) -> u32 {
        self.inner.height()
    }

    #[getter]
    fn channels(&self) -> u32 {
        self.inner.channels()
    }

    fn __repr__(&self) -> String {
        let (w, h, c) = self.inner.shape();
        format!("ImageBuffer(width={w}, height={h}, channels={c})")
    }
}

#[pyclass(name = "EngineHandle", module = "realesrgan_bind", unsendable)]
pub struct PyEngineHandle {
    inner: EngineHandle<EngineLibrary>,
}

#[pymethods]
impl PyEngineHandle {
    #[new]
    #[pyo3(signature = (device_id, tta_mode = false))]
    fn new(device_id: i32, tta_mode: bool) -> PyResult<Self> {
        let inner =
            EngineHandle::new(library()?, Device::from(device_id), tta_mode).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn set_parameters(&mut self, tilesize: u32, scale: u32) {
        self.inner.set_parameters(tilesize, scale);
    }

    fn load(&mut self, param_path: PathBuf, model_path: PathBuf) -> PyResult<i32> {
        status(self.inner.load(param_path, model_path))
    }

    /// Passing the same `ImageBuffer` as input and output raises `ValueError`.
    fn process(
        &self,
        input: &Bound<'_, PyImageBuffer>,
        output: &Bound<'_, PyImageBuffer>,
    ) -> PyResult<i32> {
        with_buffers(input, output, |input, output| self.inner.process(input, output))
    }
}

/// Borrow `input` shared and `output` exclusively for one engine call.
fn with_buffers(
    input: &Bound<'_, PyImageBuffer>,
    output: &Bound<'_, PyImageBuffer>,
    f: impl FnOnce(&ImageBuffer, &mut ImageBuffer) -> Result<()>,
) -> PyResult<i32> {
    if input.is(output) {
        return Err(PyValueError::new_err(
            "input and output must be different ImageBuffer objects",
        ));
    }
    let input = input.try_borrow()?;
    let mut output = output.try_borrow_mut()?;
    status(f(&input.inner, &mut output.inner))
}

#[pyfunction]
fn get_gpu_count() -> PyResult<i32> {
    Ok(device::get_gpu_count(&*library()?))
}

#[pyfunction]
fn get_default_gpu_index() -> PyResult<i32> {
    Ok(device::get_default_gpu_index(&*library()?))
}

#[pyfunction]
fn create_gpu_instance() -> PyResult<i32> {
    status(device::create_gpu_instance(&*library()?))
}

#[pyfunction]
fn destroy_gpu_instance() -> PyResult<()> {
    device::destroy_gpu_instance(&*library()?).map_err(to_py_err)
}

#[pymodule]
#[pyo3(name = "realesrgan_bind")]
fn python_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyImageBuffer>()?;
    m.add_class::<PyEngineHandle>()?;

    m.add_function(wrap_pyfunction!(get_gpu_count, m)?)?;
    m.add_function(wrap_pyfunction!(get_default_gpu_index, m)?)?;
    m.add_function(wrap_pyfunction!(create_gpu_instance, m)?)?;
    m.add_function(wrap_pyfunction!(destroy_gpu_instance, m)?)?;

    Ok(())
}
