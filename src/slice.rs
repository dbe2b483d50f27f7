use crate::error::{RegistrationError, Result};
use image::{GrayImage, Luma};
use ndarray::Array2;

/// A 2-D slice of real-valued intensities, indexed `[row, col]`.
pub type Image = Array2<f64>;

/// `(rows, cols)` of an image
pub fn shape_of(image: &Image) -> (usize, usize) {
    image.dim()
}

/// Smallest and largest intensity. An empty image yields `(+inf, -inf)`.
pub fn intensity_range(image: &Image) -> (f64, f64) {
    image
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Rescale intensities linearly so that the minimum maps to 0 and the maximum to 1.
pub fn normalize_min_max(mut image: Image) -> Result<Image> {
    if image.is_empty() {
        return Err(RegistrationError::Load("image has no pixels".to_string()));
    }

    let (min, max) = intensity_range(&image);
    if !min.is_finite() || !max.is_finite() {
        return Err(RegistrationError::Load(
            "image contains non-finite intensities".to_string(),
        ));
    }
    if max == min {
        return Err(RegistrationError::EmptyRange { min });
    }

    let span = max - min;
    image.mapv_inplace(|v| (v - min) / span);
    Ok(image)
}

/// Convert an 8-bit grayscale image into a slice (values stay in 0..=255).
pub fn from_gray_image(gray: &GrayImage) -> Image {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32)[0] as f64
    })
}

/// Convert a `[0, 1]` slice into an 8-bit grayscale image for previews.
/// Values outside `[0, 1]` are clamped.
pub fn to_gray_image(image: &Image) -> GrayImage {
    let (rows, cols) = image.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = image[[y as usize, x as usize]].clamp(0.0, 1.0);
        Luma([(v * 255.0).round() as u8])
    })
}
