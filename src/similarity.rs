use crate::error::{RegistrationError, Result};
use crate::slice::{intensity_range, shape_of, Image};

/// Default number of histogram bins per image axis
pub const DEFAULT_BINS: usize = 100;

/// Similarity between two same-shaped images, higher is better
pub trait SimilarityMetric {
    /// Score `candidate` against `fixed`
    fn score(&self, fixed: &Image, candidate: &Image) -> Result<f64>;

    /// Get the name of this metric
    fn name(&self) -> &str;

    /// Largest value `score` can return, attained at `candidate == fixed`
    fn max_score(&self) -> f64;
}

/// Normalized mutual information `(H(A) + H(B)) / H(A, B)`.
///
/// Ranges over `[1, 2]`: 1 for statistically independent images, 2 when one
/// image fully determines the other.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedMutualInformation {
    pub bins: usize,
}

impl Default for NormalizedMutualInformation {
    fn default() -> Self {
        Self { bins: DEFAULT_BINS }
    }
}

impl NormalizedMutualInformation {
    pub fn new(bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(RegistrationError::InvalidParameter(
                "histogram needs at least one bin".to_string(),
            ));
        }
        Ok(Self { bins })
    }
}

impl SimilarityMetric for NormalizedMutualInformation {
    fn score(&self, fixed: &Image, candidate: &Image) -> Result<f64> {
        let (expected, found) = (shape_of(fixed), shape_of(candidate));
        if expected != found {
            return Err(RegistrationError::ShapeMismatch { expected, found });
        }
        if self.bins == 0 {
            return Err(RegistrationError::InvalidParameter(
                "histogram needs at least one bin".to_string(),
            ));
        }
        if fixed.is_empty() {
            return Err(RegistrationError::InvalidParameter(
                "cannot score empty images".to_string(),
            ));
        }

        let joint = JointHistogram::build(fixed, candidate, self.bins);
        let h_fixed = entropy(joint.marginal_rows(), joint.total);
        let h_candidate = entropy(joint.marginal_cols(), joint.total);
        let h_joint = entropy(joint.counts.iter().copied(), joint.total);

        // Both inputs constant: nothing to disagree on
        if h_joint <= 0.0 {
            return Ok(self.max_score());
        }

        Ok((h_fixed + h_candidate) / h_joint)
    }

    fn name(&self) -> &str {
        "NMI"
    }

    fn max_score(&self) -> f64 {
        2.0
    }
}

/// Score with the default NMI metric.
pub fn score(fixed: &Image, candidate: &Image) -> Result<f64> {
    NormalizedMutualInformation::default().score(fixed, candidate)
}

struct JointHistogram {
    bins: usize,
    counts: Vec<u64>,
    total: u64,
}

impl JointHistogram {
    fn build(a: &Image, b: &Image, bins: usize) -> Self {
        let axis_a = BinAxis::spanning(a, bins);
        let axis_b = BinAxis::spanning(b, bins);

        let mut counts = vec![0u64; bins * bins];
        for (&va, &vb) in a.iter().zip(b.iter()) {
            counts[axis_a.index(va) * bins + axis_b.index(vb)] += 1;
        }

        Self {
            bins,
            counts,
            total: a.len() as u64,
        }
    }

    fn marginal_rows(&self) -> impl Iterator<Item = u64> + '_ {
        self.counts.chunks(self.bins).map(|row| row.iter().sum::<u64>())
    }

    fn marginal_cols(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.bins).map(move |col| {
            (0..self.bins)
                .map(|row| self.counts[row * self.bins + col])
                .sum::<u64>()
        })
    }
}

/// Equal-width bins over an image's own intensity range
struct BinAxis {
    lo: f64,
    width: f64,
    bins: usize,
}

impl BinAxis {
    fn spanning(image: &Image, bins: usize) -> Self {
        let (mut lo, mut hi) = intensity_range(image);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        Self {
            lo,
            width: (hi - lo) / bins as f64,
            bins,
        }
    }

    fn index(&self, value: f64) -> usize {
        let idx = ((value - self.lo) / self.width).floor();
        // the upper edge belongs to the last bin
        (idx.max(0.0) as usize).min(self.bins - 1)
    }
}

/// Shannon entropy (natural log) of a histogram
fn entropy(counts: impl Iterator<Item = u64>, total: u64) -> f64 {
    let total = total as f64;
    counts
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_identical_images_score_two() {
        let image = Array2::from_shape_fn((16, 16), |(r, c)| ((r * 16 + c) % 37) as f64);
        let nmi = score(&image, &image).unwrap();
        assert!((nmi - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array2::<f64>::zeros((4, 4));
        let b = Array2::<f64>::zeros((4, 5));
        let err = score(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::ShapeMismatch {
                expected: (4, 4),
                found: (4, 5)
            }
        ));
    }

    #[test]
    fn test_constant_candidate_scores_one() {
        let fixed = array![[0.0, 1.0], [0.5, 0.25]];
        let candidate = Array2::<f64>::zeros((2, 2));
        let nmi = score(&fixed, &candidate).unwrap();
        assert!((nmi - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_both_constant_is_finite() {
        let a = Array2::from_elem((3, 3), 0.2);
        let b = Array2::from_elem((3, 3), 0.9);
        assert_eq!(score(&a, &b).unwrap(), 2.0);
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert!(NormalizedMutualInformation::new(0).is_err());
        assert!(NormalizedMutualInformation::new(32).is_ok());
    }

    #[test]
    fn test_bin_axis_edges() {
        let image = array![[0.0, 1.0]];
        let axis = BinAxis::spanning(&image, 4);
        assert_eq!(axis.index(0.0), 0);
        assert_eq!(axis.index(0.26), 1);
        assert_eq!(axis.index(1.0), 3);
    }
}
