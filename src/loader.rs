//! Volume loading - fetches a MetaIO header and its raw file, then samples it

use crate::error::{DecodeError, Result};
use crate::header::{self, VolumeDescriptor};
use crate::io::{create_io_manager, local_path, FileSystemIOManager, IOManager, StorageBackend};
use crate::sampler::{PointCloud, VolumeSampler};
use crate::types::SamplingOptions;
use crate::utils::{format_bytes, resolve_data_path};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

/// A sampled volume together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedVolume {
    pub header_location: String,
    pub data_location: String,
    pub descriptor: VolumeDescriptor,
    pub cloud: PointCloud,
}

/// Main interface for turning MetaIO files into point clouds
#[derive(Clone)]
pub struct MetaIoLoader {
    /// I/O manager for storage operations
    io_manager: Arc<dyn IOManager>,

    sampler: VolumeSampler,
}

impl MetaIoLoader {
    /// Create a loader for the storage backend named by `url`'s scheme
    pub fn open(url: &str, options: SamplingOptions) -> Result<Self> {
        let io_manager: Arc<dyn IOManager> = Arc::from(create_io_manager(url)?);
        Self::with_io_manager(io_manager, options)
    }

    /// Create a loader reading from the local file system
    pub fn local(options: SamplingOptions) -> Result<Self> {
        Self::with_io_manager(Arc::new(FileSystemIOManager::default()), options)
    }

    /// Create a loader on top of a caller-provided storage backend
    pub fn with_io_manager(io_manager: Arc<dyn IOManager>, options: SamplingOptions) -> Result<Self> {
        Ok(Self {
            io_manager,
            sampler: VolumeSampler::new(options)?,
        })
    }

    pub fn options(&self) -> &SamplingOptions {
        self.sampler.options()
    }

    pub fn backend(&self) -> StorageBackend {
        self.io_manager.backend()
    }

    /// Fetch and parse a header; returns the descriptor and the resolved
    /// location of its raw data file.
    pub async fn load_descriptor(&self, header_location: &str) -> Result<(VolumeDescriptor, String)> {
        let header_location = self.checked_location(header_location)?;
        let text = self.io_manager.fetch_text(header_location).await?;
        let descriptor = header::parse(&text)?;
        let data_location = resolve_data_path(header_location, &descriptor.element_data_file);
        Ok((descriptor, data_location))
    }

    /// Load one volume and sample it into a point cloud
    pub async fn load(&self, header_location: &str) -> Result<LoadedVolume> {
        let (descriptor, data_location) = self.load_descriptor(header_location).await?;

        debug!(
            data = %data_location,
            expected = ?descriptor.byte_len().map(format_bytes),
            "fetching raw volume"
        );
        let bytes = self.io_manager.fetch_bytes(&data_location).await?;

        let sampler = self.sampler;
        let task_descriptor = descriptor.clone();
        let cloud = tokio::task::spawn_blocking(move || sampler.sample(&task_descriptor, &bytes))
            .await??;

        Ok(LoadedVolume {
            header_location: local_path(header_location).to_string(),
            data_location,
            descriptor,
            cloud,
        })
    }

    /// Load several volumes concurrently; results keep the input order
    pub async fn load_many<S: AsRef<str>>(&self, header_locations: &[S]) -> Result<Vec<LoadedVolume>> {
        let futures: Vec<_> = header_locations
            .iter()
            .map(|location| self.load(location.as_ref()))
            .collect();

        try_join_all(futures).await
    }

    fn checked_location<'a>(&self, location: &'a str) -> Result<&'a str> {
        let backend = StorageBackend::from_url(location)?;
        if backend != self.io_manager.backend() {
            return Err(DecodeError::Configuration(format!(
                "{} is not served by the {:?} backend",
                location,
                self.io_manager.backend()
            )));
        }
        Ok(local_path(location))
    }
}

/// Load a single MetaIO volume from `url` with the given options
pub async fn load_point_cloud(url: &str, options: SamplingOptions) -> Result<LoadedVolume> {
    MetaIoLoader::open(url, options)?.load(url).await
}
