//! Minimal NIfTI-1 single-file reader (`.nii`, `.nii.gz`)

use crate::error::{RegistrationError, Result};
use crate::slice::Image;
use flate2::read::GzDecoder;
use ndarray::Array2;
use std::io::Read;

const HEADER_SIZE: usize = 348;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataType {
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl DataType {
    fn from_code(code: i16) -> Result<Self> {
        match code {
            2 => Ok(DataType::U8),
            4 => Ok(DataType::I16),
            8 => Ok(DataType::I32),
            16 => Ok(DataType::F32),
            64 => Ok(DataType::F64),
            256 => Ok(DataType::I8),
            512 => Ok(DataType::U16),
            768 => Ok(DataType::U32),
            other => Err(RegistrationError::Load(format!(
                "unsupported NIfTI datatype code {}",
                other
            ))),
        }
    }

    fn size(self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

/// The header fields needed to pull a slice out of the voxel block
#[derive(Debug, Clone)]
pub struct NiftiHeader {
    endian: Endian,
    /// Voxel counts along x, y, z
    pub dims: [usize; 3],
    datatype: DataType,
    pub vox_offset: usize,
    pub scl_slope: f32,
    pub scl_inter: f32,
}

/// Decompress if the bytes are gzip-wrapped, otherwise return them as-is.
pub fn maybe_gunzip(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut decoded)
            .map_err(|e| RegistrationError::Load(format!("corrupt gzip stream: {}", e)))?;
        Ok(decoded)
    } else {
        Ok(bytes)
    }
}

impl NiftiHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(RegistrationError::Load(format!(
                "NIfTI header truncated: {} bytes",
                bytes.len()
            )));
        }

        let endian = match bytes[0..4] {
            [0x5c, 0x01, 0x00, 0x00] => Endian::Little,
            [0x00, 0x00, 0x01, 0x5c] => Endian::Big,
            _ => {
                return Err(RegistrationError::Load(
                    "not a NIfTI-1 file (bad sizeof_hdr)".to_string(),
                ))
            }
        };

        if &bytes[344..348] != b"n+1\0" {
            return Err(RegistrationError::Load(
                "only single-file NIfTI-1 (magic n+1) is supported".to_string(),
            ));
        }

        let ndim = read_i16(bytes, 40, endian);
        if !(1..=7).contains(&ndim) {
            return Err(RegistrationError::Load(format!(
                "invalid dimension count {}",
                ndim
            )));
        }

        let mut dims = [1usize; 3];
        for (axis, dim) in dims.iter_mut().enumerate().take(ndim.min(3) as usize) {
            let extent = read_i16(bytes, 42 + 2 * axis, endian);
            if extent < 1 {
                return Err(RegistrationError::Load(format!(
                    "invalid extent {} along axis {}",
                    extent, axis
                )));
            }
            *dim = extent as usize;
        }

        let datatype = DataType::from_code(read_i16(bytes, 70, endian))?;

        let vox_offset = read_f32(bytes, 108, endian);
        if !(vox_offset.is_finite()
            && vox_offset >= HEADER_SIZE as f32
            && vox_offset <= bytes.len() as f32)
        {
            return Err(RegistrationError::Load(format!(
                "invalid vox_offset {}",
                vox_offset
            )));
        }

        Ok(Self {
            endian,
            dims,
            datatype,
            vox_offset: vox_offset as usize,
            scl_slope: read_f32(bytes, 112, endian),
            scl_inter: read_f32(bytes, 116, endian),
        })
    }

    fn scaling(&self) -> Option<(f64, f64)> {
        if self.scl_slope != 0.0 && self.scl_slope.is_finite() {
            let inter = if self.scl_inter.is_finite() {
                self.scl_inter as f64
            } else {
                0.0
            };
            Some((self.scl_slope as f64, inter))
        } else {
            None
        }
    }
}

/// Extract the middle slice along the third axis, as `[x, y]`.
///
/// For 4-D data only the first volume is read.
pub fn read_middle_slice(bytes: &[u8]) -> Result<Image> {
    let header = NiftiHeader::parse(bytes)?;
    let [nx, ny, nz] = header.dims;
    let z = nz / 2;

    let voxel_size = header.datatype.size();
    let slice_bytes = nx
        .checked_mul(ny)
        .and_then(|n| n.checked_mul(voxel_size))
        .ok_or_else(|| RegistrationError::Load("voxel block size overflows".to_string()))?;
    let volume_end = slice_bytes
        .checked_mul(nz)
        .and_then(|n| n.checked_add(header.vox_offset))
        .ok_or_else(|| RegistrationError::Load("voxel block size overflows".to_string()))?;
    if bytes.len() < volume_end {
        return Err(RegistrationError::Load(format!(
            "voxel data truncated: need {} bytes, have {}",
            volume_end,
            bytes.len()
        )));
    }

    // bounded by volume_end, so no overflow
    let slice_start = header.vox_offset + slice_bytes * z;
    let scaling = header.scaling();

    let image = Array2::from_shape_fn((nx, ny), |(x, y)| {
        let offset = slice_start + (x + nx * y) * voxel_size;
        let raw = read_voxel(bytes, offset, header.datatype, header.endian);
        match scaling {
            Some((slope, inter)) => raw * slope + inter,
            None => raw,
        }
    });

    tracing::debug!(
        nx = nx,
        ny = ny,
        nz = nz,
        slice = z,
        datatype = ?header.datatype,
        "Extracted middle NIfTI slice"
    );

    Ok(image)
}

fn take<const N: usize>(bytes: &[u8], offset: usize, endian: Endian) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[offset..offset + N]);
    if endian == Endian::Big {
        buf.reverse();
    }
    buf
}

fn read_i16(bytes: &[u8], offset: usize, endian: Endian) -> i16 {
    i16::from_le_bytes(take(bytes, offset, endian))
}

fn read_f32(bytes: &[u8], offset: usize, endian: Endian) -> f32 {
    f32::from_le_bytes(take(bytes, offset, endian))
}

fn read_voxel(bytes: &[u8], offset: usize, datatype: DataType, endian: Endian) -> f64 {
    match datatype {
        DataType::U8 => bytes[offset] as f64,
        DataType::I8 => bytes[offset] as i8 as f64,
        DataType::I16 => i16::from_le_bytes(take(bytes, offset, endian)) as f64,
        DataType::U16 => u16::from_le_bytes(take(bytes, offset, endian)) as f64,
        DataType::I32 => i32::from_le_bytes(take(bytes, offset, endian)) as f64,
        DataType::U32 => u32::from_le_bytes(take(bytes, offset, endian)) as f64,
        DataType::F32 => f32::from_le_bytes(take(bytes, offset, endian)) as f64,
        DataType::F64 => f64::from_le_bytes(take(bytes, offset, endian)),
    }
}
