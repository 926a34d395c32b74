//! metaio-cloud - MetaIO volumes as colored point clouds
//!
//! Decodes volumetric images stored in the MetaIO format (a `.mhd` text header
//! plus a companion raw binary file) into a sparse list of colored points that
//! a visualization layer can render directly.
//!
//! # Features
//!
//! - `Key = Value` header parsing with typed numeric fields
//! - `MET_UCHAR`, `MET_UINT` and `MET_FLOAT` element data, little- or big-endian
//! - Deterministic every-n-th-voxel downsampling and strict value filtering
//! - Min/max intensity normalization mapped to a blue-to-red color ramp
//! - Optional z-partitioned parallel sampling with identical output order
//! - Async loading from the local filesystem (implement `IOManager` for other storage)
//!
//! # Example
//!
//! ```rust
//! use metaio_cloud::decode_volume;
//!
//! let header = "NDims = 3\nDimSize = 2 2 1\nElementSpacing = 1 1 1\n\
//!               ElementType = MET_UCHAR\nElementDataFile = d.raw";
//! let cloud = decode_volume(header, &[0, 10, 20, 30], 1, 1.0, -1.0)?;
//! assert_eq!(cloud.len(), 4);
//! assert_eq!(cloud.samples[3].color, [1.0, 0.0, 0.0]);
//! # Ok::<(), metaio_cloud::DecodeError>(())
//! ```

pub mod error;
pub mod header;
pub mod io;
pub mod loader;
pub mod sampler;
pub mod types;
pub mod utils;
pub mod volume;

// Re-exports
pub use error::{DecodeError, HeaderError, Result, SampleError};
pub use header::{HeaderField, HeaderValue, MetaHeader, VolumeDescriptor};
pub use io::{FileSystemIOManager, IOManager, StorageBackend};
pub use loader::{load_point_cloud, LoadedVolume, MetaIoLoader};
pub use sampler::{PointCloud, SampleStats, VolumeSampler};
pub use types::{ByteOrder, ElementType, Sample, SamplingOptions, ValueRange};
pub use volume::RawVolume;

/// Version of the crate
pub const METAIO_CLOUD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decode MetaIO header text and its raw element bytes into a point cloud
pub fn decode_volume(
    header_text: &str,
    raw_bytes: &[u8],
    downsample_step: usize,
    scale_factor: f64,
    filter_min: f64,
) -> Result<PointCloud> {
    let descriptor = header::parse(header_text)?;
    let cloud = sampler::sample(&descriptor, raw_bytes, downsample_step, scale_factor, filter_min)?;
    Ok(cloud)
}
