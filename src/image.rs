//! Image buffers and the zero-copy views handed to the engine.

use crate::error::{Error, Result};

/// Raw interleaved 8-bit image owned by the caller.
///
/// The byte length always equals `width * height * channels`; construction
/// and [`set_data`](Self::set_data) reject anything else, so a view built
/// from a buffer can never send the engine past the end of its storage.
///
/// ```
/// use realesrgan_bind::ImageBuffer;
///
/// let img = ImageBuffer::new(vec![0u8; 2 * 2 * 3], 2, 2, 3)?;
/// assert_eq!(img.get_data(), vec![0u8; 12]);
/// # Ok::<(), realesrgan_bind::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u32,
}

impl ImageBuffer {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u32) -> Result<Self> {
        let expected = expected_len(width, height, channels)?;
        check_len(expected, data.len())?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// All-zero buffer of the given shape.
    pub fn zeroed(width: u32, height: u32, channels: u32) -> Result<Self> {
        let len = expected_len(width, height, channels)?;
        Ok(Self {
            data: vec![0u8; len],
            width,
            height,
            channels,
        })
    }

    /// Replace the pixel bytes. Dimensions stay as they are.
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<()> {
        check_len(self.data.len(), data.len())?;
        self.data = data;
        Ok(())
    }

    /// Owned copy of the pixel bytes.
    pub fn get_data(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// `(width, height, channels)`.
    pub fn shape(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }

    pub fn view(&self) -> MatView<'_> {
        MatView {
            data: &self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    pub fn view_mut(&mut self) -> MatViewMut<'_> {
        MatViewMut {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }
}

/// Read-only view over an [`ImageBuffer`]'s storage.
#[derive(Debug, Clone, Copy)]
pub struct MatView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

/// Writable view over an [`ImageBuffer`]'s storage. The engine writes the
/// upscaled frame through it in place.
#[derive(Debug)]
pub struct MatViewMut<'a> {
    pub data: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

fn expected_len(width: u32, height: u32, channels: u32) -> Result<usize> {
    let invalid = Error::InvalidDimensions {
        width,
        height,
        channels,
    };
    if width == 0 || height == 0 || channels == 0 {
        return Err(invalid);
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels as usize))
        .ok_or(invalid)
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::InvalidBufferSize { expected, actual });
    }
    Ok(())
}
