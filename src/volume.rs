//! Raw voxel grids decoded from MetaIO element data

use crate::error::SampleError;
use crate::header::VolumeDescriptor;
use crate::types::{ByteOrder, ElementType, ValueRange};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use ndarray::{Array3, ArrayView3};
use num_traits::AsPrimitive;
use tracing::debug;

/// Decoded scalar grid, indexed `[z, y, x]` so that the standard layout
/// matches the on-disk order `z * (nx * ny) + y * nx + x`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawVolume {
    UnsignedByte8(Array3<u8>),
    UnsignedInt32(Array3<u32>),
    Float32(Array3<f32>),
}

impl RawVolume {
    /// Decode raw element bytes according to the descriptor
    pub fn decode(descriptor: &VolumeDescriptor, bytes: &[u8]) -> Result<Self, SampleError> {
        if descriptor.is_empty() {
            return Err(SampleError::EmptyVolume);
        }

        let expected = descriptor.byte_len().ok_or(SampleError::SizeMismatch {
            expected: usize::MAX,
            actual: bytes.len(),
        })?;
        if bytes.len() != expected {
            return Err(SampleError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let [nx, ny, nz] = descriptor.dim_size;
        let shape = (nz, ny, nx);

        debug!(
            nx,
            ny,
            nz,
            element_type = %descriptor.element_type,
            byte_order = ?descriptor.byte_order,
            "decoding raw volume"
        );

        let volume = match descriptor.element_type {
            ElementType::UnsignedByte8 => RawVolume::UnsignedByte8(into_grid(shape, bytes.to_vec())?),
            ElementType::UnsignedInt32 => {
                let mut data = vec![0u32; bytes.len() / 4];
                match descriptor.byte_order {
                    ByteOrder::LittleEndian => LittleEndian::read_u32_into(bytes, &mut data),
                    ByteOrder::BigEndian => BigEndian::read_u32_into(bytes, &mut data),
                }
                RawVolume::UnsignedInt32(into_grid(shape, data)?)
            }
            ElementType::Float32 => {
                let mut data = vec![0f32; bytes.len() / 4];
                match descriptor.byte_order {
                    ByteOrder::LittleEndian => LittleEndian::read_f32_into(bytes, &mut data),
                    ByteOrder::BigEndian => BigEndian::read_f32_into(bytes, &mut data),
                }
                RawVolume::Float32(into_grid(shape, data)?)
            }
        };

        Ok(volume)
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            RawVolume::UnsignedByte8(_) => ElementType::UnsignedByte8,
            RawVolume::UnsignedInt32(_) => ElementType::UnsignedInt32,
            RawVolume::Float32(_) => ElementType::Float32,
        }
    }

    /// Extents as `[nx, ny, nz]`
    pub fn dim_size(&self) -> [usize; 3] {
        let (nz, ny, nx) = match self {
            RawVolume::UnsignedByte8(a) => a.dim(),
            RawVolume::UnsignedInt32(a) => a.dim(),
            RawVolume::Float32(a) => a.dim(),
        };
        [nx, ny, nz]
    }

    pub fn len(&self) -> usize {
        self.dim_size().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at grid coordinate `(x, y, z)` widened to `f64`
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        match self {
            RawVolume::UnsignedByte8(a) => a.get((z, y, x)).map(|&v| AsPrimitive::<f64>::as_(v)),
            RawVolume::UnsignedInt32(a) => a.get((z, y, x)).map(|&v| AsPrimitive::<f64>::as_(v)),
            RawVolume::Float32(a) => a.get((z, y, x)).map(|&v| AsPrimitive::<f64>::as_(v)),
        }
    }

    /// Observed minimum and maximum; NaN and infinite elements are skipped
    pub fn value_range(&self) -> ValueRange {
        match self {
            RawVolume::UnsignedByte8(a) => grid_range(a.view()),
            RawVolume::UnsignedInt32(a) => grid_range(a.view()),
            RawVolume::Float32(a) => grid_range(a.view()),
        }
    }
}

fn into_grid<T>(shape: (usize, usize, usize), data: Vec<T>) -> Result<Array3<T>, SampleError> {
    let actual = data.len();
    Array3::from_shape_vec(shape, data).map_err(|_| SampleError::SizeMismatch {
        expected: shape.0 * shape.1 * shape.2,
        actual,
    })
}

fn grid_range<T: AsPrimitive<f64>>(grid: ArrayView3<'_, T>) -> ValueRange {
    grid.iter().fold(
        ValueRange::new(f64::INFINITY, f64::NEG_INFINITY),
        |range, &v| {
            let v: f64 = v.as_();
            if !v.is_finite() {
                return range;
            }
            ValueRange::new(range.min.min(v), range.max.max(v))
        },
    )
}
