use crate::data::nifti;
use crate::error::{RegistrationError, Result};
use crate::slice::{from_gray_image, normalize_min_max, Image};
use std::path::Path;

/// Load a 2-D slice and min-max normalize it to `[0, 1]`.
///
/// `.nii` / `.nii.gz` volumes yield their middle slice along the third axis;
/// every other extension is decoded as an 8-bit grayscale image.
pub fn load_slice<P: AsRef<Path>>(path: P) -> Result<Image> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RegistrationError::ResourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let raw = if is_nifti(path) {
        let bytes = nifti::maybe_gunzip(std::fs::read(path)?)?;
        nifti::read_middle_slice(&bytes)?
    } else {
        let img = image::open(path)?;
        from_gray_image(&img.to_luma8())
    };

    tracing::info!(
        path = %path.display(),
        rows = raw.nrows(),
        cols = raw.ncols(),
        "Loaded slice"
    );

    normalize_min_max(raw)
}

fn is_nifti(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase())
        .unwrap_or_default();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

pub fn validate_image_size(image: &Image, min_size: usize) -> Result<()> {
    if image.nrows() < min_size || image.ncols() < min_size {
        return Err(RegistrationError::Load(format!(
            "Image too small: {}x{}, minimum: {}x{}",
            image.nrows(),
            image.ncols(),
            min_size,
            min_size
        )));
    }
    Ok(())
}
