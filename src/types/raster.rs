//! Image, band plane and mask buffers.
//!
//! A `Raster` is an H×W×C float image stored row-major with interleaved
//! channels. Channel values are expected in the 0..1 range for RGB(A) data;
//! other colorspace representations use whatever scale that space defines.

use image::{DynamicImage, Rgb32FImage, Rgba, Rgba32FImage, RgbaImage};

use crate::error::{MapError, Result};

/// Index of the alpha band in four-channel images.
pub const ALPHA: usize = 3;

/// A multi-channel float image.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Raster {
    /// Create a zero-filled image.
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width * height * channels],
        }
    }

    /// Wrap an interleaved buffer.
    pub fn from_vec(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height * channels {
            return Err(MapError::Image {
                message: format!(
                    "Buffer holds {} values, expected {}x{}x{} = {}",
                    data.len(),
                    height,
                    width,
                    channels,
                    width * height * channels
                ),
                help: None,
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Wrap a buffer described by an `[height, width, channels]` shape.
    pub fn from_shape(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        match shape {
            [height, width, channels] => Self::from_vec(*width, *height, *channels, data),
            _ => Err(MapError::Image {
                message: format!("Expected a 3-dimensional image, got {} dimension(s)", shape.len()),
                help: Some("Images are shaped [height, width, channels]".to_string()),
            }),
        }
    }

    /// Build an image from RGBA pixels in row-major order.
    pub fn from_rgba_pixels(width: usize, height: usize, pixels: &[[f32; 4]]) -> Result<Self> {
        Self::from_vec(width, height, 4, pixels.iter().flatten().copied().collect())
    }

    /// Build an image from RGB pixels in row-major order.
    pub fn from_rgb_pixels(width: usize, height: usize, pixels: &[[f32; 3]]) -> Result<Self> {
        Self::from_vec(width, height, 3, pixels.iter().flatten().copied().collect())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `[height, width, channels]`
    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    pub fn has_alpha(&self) -> bool {
        self.channels > ALPHA
    }

    /// Number of pixels (width × height).
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Channel values of the pixel at `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn pixels(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.channels.max(1))
    }

    pub fn pixels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.data.chunks_exact_mut(self.channels.max(1))
    }

    /// Copy a band out as a plane.
    pub fn band(&self, index: usize) -> Result<Plane> {
        self.check_band(index)?;
        let data = self.pixels().map(|p| p[index]).collect();
        Ok(Plane::from_vec(self.width, self.height, data))
    }

    /// Overwrite a band with the values of a plane.
    pub fn set_band(&mut self, index: usize, plane: &Plane) -> Result<()> {
        self.check_band(index)?;
        if plane.dims() != (self.width, self.height) {
            return Err(MapError::shape(format!(
                "Band plane is {}x{}, image is {}x{}",
                plane.width(),
                plane.height(),
                self.width,
                self.height
            )));
        }
        for (pixel, value) in self.pixels_mut().zip(plane.values()) {
            pixel[index] = *value;
        }
        Ok(())
    }

    /// Set every value of a band.
    pub fn fill_band(&mut self, index: usize, value: f32) -> Result<()> {
        self.check_band(index)?;
        for pixel in self.pixels_mut() {
            pixel[index] = value;
        }
        Ok(())
    }

    fn check_band(&self, index: usize) -> Result<()> {
        if index >= self.channels {
            return Err(MapError::Image {
                message: format!("Band {} does not exist in a {}-channel image", index, self.channels),
                help: None,
            });
        }
        Ok(())
    }

    /// Collect the pixels selected by `mask` into a single-row image.
    pub fn gather(&self, mask: &Mask) -> Raster {
        let data: Vec<f32> = self
            .pixels()
            .zip(mask.bits())
            .filter(|(_, selected)| **selected)
            .flat_map(|(pixel, _)| pixel.iter().copied())
            .collect();
        let count = data.len() / self.channels.max(1);
        Raster {
            width: count,
            height: 1,
            channels: self.channels,
            data,
        }
    }

    /// Write a single-row chunk back into the pixels selected by `mask`.
    pub fn scatter(&mut self, mask: &Mask, chunk: &Raster) -> Result<()> {
        if chunk.channels != self.channels || chunk.len() != mask.count() {
            return Err(MapError::shape(format!(
                "Chunk of {} pixel(s) with {} channel(s) does not fit {} selected pixel(s) with {} channel(s)",
                chunk.len(),
                chunk.channels,
                mask.count(),
                self.channels
            )));
        }
        let selected = self
            .pixels_mut()
            .zip(mask.bits())
            .filter(|(_, selected)| **selected)
            .map(|(pixel, _)| pixel);
        for (target, source) in selected.zip(chunk.pixels()) {
            target.copy_from_slice(source);
        }
        Ok(())
    }

    /// Copy the pixels selected by `mask` from `source`, which must have the same shape.
    pub fn copy_masked(&mut self, source: &Raster, mask: &Mask) {
        let channels = self.channels.max(1);
        let targets = self.data.chunks_exact_mut(channels);
        for ((target, pixel), selected) in targets.zip(source.pixels()).zip(mask.bits()) {
            if *selected {
                target.copy_from_slice(pixel);
            }
        }
    }

    /// Normalised float copy of an RGB image.
    pub fn from_rgb_image(img: &Rgb32FImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            channels: 3,
            data: img.as_raw().clone(),
        }
    }

    /// Normalised float copy of an RGBA image.
    pub fn from_rgba_image(img: &Rgba32FImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            channels: 4,
            data: img.as_raw().clone(),
        }
    }

    /// Convert any decoded image, keeping an alpha band only if the source has one.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        if img.color().has_alpha() {
            Self::from_rgba_image(&img.to_rgba32f())
        } else {
            Self::from_rgb_image(&img.to_rgb32f())
        }
    }

    /// Quantise to an 8-bit RGBA buffer, clamping to 0..1 and filling a missing alpha band.
    pub fn to_rgba8(&self) -> Result<RgbaImage> {
        if self.channels < 3 {
            return Err(MapError::Image {
                message: format!("Cannot export a {}-channel image as RGBA", self.channels),
                help: None,
            });
        }
        let quantise = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let img = RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let p = self.pixel(x as usize, y as usize);
            let alpha = if self.has_alpha() { p[ALPHA] } else { 1.0 };
            Rgba([quantise(p[0]), quantise(p[1]), quantise(p[2]), quantise(alpha)])
        });
        Ok(img)
    }
}

/// A single band of per-pixel values.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { width, height, data }
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self::from_vec(width, height, vec![value; width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Apply `f` to every value.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Plane {
        Plane::from_vec(self.width, self.height, self.data.iter().map(|v| f(*v)).collect())
    }

    /// Combine two planes of equal size value by value.
    pub fn zip_with(&self, other: &Plane, f: impl Fn(f32, f32) -> f32) -> Result<Plane> {
        check_dims(self.dims(), other.dims())?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(Plane::from_vec(self.width, self.height, data))
    }

    /// Test every value, producing a mask.
    pub fn test(&self, f: impl Fn(f32) -> bool) -> Mask {
        Mask::from_vec(self.width, self.height, self.data.iter().map(|v| f(*v)).collect())
    }

    /// Test value pairs of two planes of equal size.
    pub fn test_with(&self, other: &Plane, f: impl Fn(f32, f32) -> bool) -> Result<Mask> {
        check_dims(self.dims(), other.dims())?;
        let bits = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(Mask::from_vec(self.width, self.height, bits))
    }
}

/// A boolean selection, one bit per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Mask {
    pub fn from_vec(width: usize, height: usize, bits: Vec<bool>) -> Self {
        debug_assert_eq!(bits.len(), width * height);
        Self { width, height, bits }
    }

    pub fn filled(width: usize, height: usize, value: bool) -> Self {
        Self::from_vec(width, height, vec![value; width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.bits[y * self.width + x]
    }

    /// Number of selected pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn any(&self) -> bool {
        self.bits.iter().any(|b| *b)
    }

    pub fn not(&self) -> Mask {
        Mask::from_vec(self.width, self.height, self.bits.iter().map(|b| !b).collect())
    }

    pub fn and(&self, other: &Mask) -> Result<Mask> {
        self.zip_with(other, |a, b| a & b)
    }

    pub fn or(&self, other: &Mask) -> Result<Mask> {
        self.zip_with(other, |a, b| a | b)
    }

    pub fn xor(&self, other: &Mask) -> Result<Mask> {
        self.zip_with(other, |a, b| a ^ b)
    }

    /// Combine two masks of equal size bit by bit.
    pub fn zip_with(&self, other: &Mask, f: impl Fn(bool, bool) -> bool) -> Result<Mask> {
        check_dims(self.dims(), other.dims())?;
        let bits = self
            .bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(Mask::from_vec(self.width, self.height, bits))
    }

    /// Apply `f` to every bit.
    pub fn map(&self, f: impl Fn(bool) -> bool) -> Mask {
        Mask::from_vec(self.width, self.height, self.bits.iter().map(|b| f(*b)).collect())
    }
}

fn check_dims(a: (usize, usize), b: (usize, usize)) -> Result<()> {
    if a != b {
        return Err(MapError::shape(format!(
            "Operands cover {}x{} and {}x{} pixels",
            a.0, a.1, b.0, b.1
        )));
    }
    Ok(())
}
