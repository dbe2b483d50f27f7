use crate::error::Result;
use crate::slice::{normalize_min_max, Image};
use ndarray::Array2;

/// Gaussian blob in fractional image coordinates
struct Blob {
    row: f64,
    col: f64,
    sigma: f64,
    amplitude: f64,
}

const BLOBS: [Blob; 4] = [
    Blob { row: 0.38, col: 0.42, sigma: 0.14, amplitude: 1.0 },
    Blob { row: 0.64, col: 0.62, sigma: 0.09, amplitude: 0.7 },
    Blob { row: 0.30, col: 0.70, sigma: 0.05, amplitude: 0.5 },
    Blob { row: 0.70, col: 0.30, sigma: 0.06, amplitude: -0.3 },
];

/// A deterministic, asymmetric test slice normalized to `[0, 1]`.
///
/// Smooth enough for bilinear resampling, with no rotational symmetry so
/// that rotation and translation are both identifiable.
pub fn synthetic_phantom(rows: usize, cols: usize) -> Result<Image> {
    let image = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let u = r as f64 / rows as f64;
        let v = c as f64 / cols as f64;

        let blobs: f64 = BLOBS
            .iter()
            .map(|b| {
                let d2 = (u - b.row).powi(2) + (v - b.col).powi(2);
                b.amplitude * (-d2 / (2.0 * b.sigma * b.sigma)).exp()
            })
            .sum();

        blobs + 0.15 * u
    });

    normalize_min_max(image)
}
