//! Volume sampling - turns a decoded grid into a sparse colored point cloud

use crate::error::SampleError;
use crate::header::VolumeDescriptor;
use crate::types::{Sample, SamplingOptions, ValueRange};
use crate::volume::RawVolume;
use ndarray::ArrayView3;
use num_traits::AsPrimitive;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Diagnostics reported alongside the sampled points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    /// Number of emitted samples
    pub retained: usize,
    /// Number of cells selected by the downsampling step
    pub visited: usize,
    /// Lower normalization bound: `max(filter_min, observed min)`
    pub min_value: f64,
    /// Observed maximum over the whole volume
    pub max_value: f64,
}

/// Ordered point samples produced from one volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub samples: Vec<Sample>,
    pub stats: SampleStats,
    /// Point size a renderer can start from, derived from the scaled spacing
    pub suggested_point_size: f64,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Interleaved `xyz` positions as a flat vertex buffer
    pub fn positions(&self) -> Vec<f32> {
        self.samples
            .iter()
            .flat_map(|s| s.position.map(|c| c as f32))
            .collect()
    }

    /// Interleaved `rgb` colors as a flat vertex buffer
    pub fn colors(&self) -> Vec<f32> {
        self.samples
            .iter()
            .flat_map(|s| s.color.map(|c| c as f32))
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} points (visited {}), min {}, max {}, point size {:.3}",
            self.stats.retained,
            self.stats.visited,
            self.stats.min_value,
            self.stats.max_value,
            self.suggested_point_size
        )
    }
}

/// Samples decoded volumes according to a fixed set of options
#[derive(Debug, Clone, Copy)]
pub struct VolumeSampler {
    options: SamplingOptions,
}

impl VolumeSampler {
    /// Create a sampler, rejecting invalid options
    pub fn new(options: SamplingOptions) -> Result<Self, SampleError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }

    /// Decode `raw_bytes` and sample the resulting volume
    pub fn sample(
        &self,
        descriptor: &VolumeDescriptor,
        raw_bytes: &[u8],
    ) -> Result<PointCloud, SampleError> {
        let volume = RawVolume::decode(descriptor, raw_bytes)?;
        Ok(self.sample_volume(descriptor, volume))
    }

    /// Sample an already decoded volume; the volume is released afterwards
    pub fn sample_volume(&self, descriptor: &VolumeDescriptor, volume: RawVolume) -> PointCloud {
        let observed = volume.value_range();
        let range = ValueRange::new(
            observed.min.max(self.options.filter_min),
            observed.max,
        );
        let spacing = descriptor.scaled_spacing(self.options.scale_factor);

        let pass = SamplingPass {
            step: self.options.downsample_step,
            filter_min: self.options.filter_min,
            range,
            spacing,
        };

        let (samples, visited) = match &volume {
            RawVolume::UnsignedByte8(grid) => pass.run(grid.view(), self.options.parallel),
            RawVolume::UnsignedInt32(grid) => pass.run(grid.view(), self.options.parallel),
            RawVolume::Float32(grid) => pass.run(grid.view(), self.options.parallel),
        };
        drop(volume);

        let stats = SampleStats {
            retained: samples.len(),
            visited,
            min_value: range.min,
            max_value: range.max,
        };

        info!(
            retained = stats.retained,
            visited = stats.visited,
            min = stats.min_value,
            max = stats.max_value,
            "sampled volume"
        );

        PointCloud {
            samples,
            stats,
            suggested_point_size: 20.0 * spacing.iter().sum::<f64>() / 3.0,
        }
    }
}

/// Sample a descriptor and its raw bytes with explicit parameters
pub fn sample(
    descriptor: &VolumeDescriptor,
    raw_bytes: &[u8],
    downsample_step: usize,
    scale_factor: f64,
    filter_min: f64,
) -> Result<PointCloud, SampleError> {
    VolumeSampler::new(SamplingOptions::new(downsample_step, scale_factor, filter_min))?
        .sample(descriptor, raw_bytes)
}

struct SamplingPass {
    step: usize,
    filter_min: f64,
    range: ValueRange,
    spacing: [f64; 3],
}

impl SamplingPass {
    /// Walk the grid in linear order; returns emitted samples and the number
    /// of cells selected by the step.
    fn run<T>(&self, grid: ArrayView3<'_, T>, parallel: bool) -> (Vec<Sample>, usize)
    where
        T: AsPrimitive<f64> + Sync,
    {
        let (nz, _, _) = grid.dim();

        if parallel {
            let slabs: Vec<(Vec<Sample>, usize)> = (0..nz)
                .into_par_iter()
                .map(|z| self.slab(&grid, z))
                .collect();

            let mut samples = Vec::with_capacity(slabs.iter().map(|(s, _)| s.len()).sum());
            let mut visited = 0;
            for (slab, count) in slabs {
                samples.extend(slab);
                visited += count;
            }
            (samples, visited)
        } else {
            let mut samples = Vec::new();
            let mut visited = 0;
            for z in 0..nz {
                let (slab, count) = self.slab(&grid, z);
                samples.extend(slab);
                visited += count;
            }
            (samples, visited)
        }
    }

    /// One z-plane. The running counter is `linear_index + 1`, so a plane can
    /// be sampled independently of the others.
    fn slab<T>(&self, grid: &ArrayView3<'_, T>, z: usize) -> (Vec<Sample>, usize)
    where
        T: AsPrimitive<f64>,
    {
        let (_, ny, nx) = grid.dim();
        let plane_start = z * nx * ny;
        let mut samples = Vec::new();
        let mut visited = 0;

        for y in 0..ny {
            for x in 0..nx {
                let counter = plane_start + y * nx + x + 1;
                if counter % self.step != 0 {
                    continue;
                }
                visited += 1;

                let value: f64 = grid[[z, y, x]].as_();
                if value.is_finite() && value > self.filter_min {
                    samples.push(self.emit(x, y, z, value));
                }
            }
        }

        (samples, visited)
    }

    fn emit(&self, x: usize, y: usize, z: usize, value: f64) -> Sample {
        let intensity = self.range.normalize(value);
        Sample {
            position: [
                x as f64 * self.spacing[0],
                y as f64 * self.spacing[1],
                z as f64 * self.spacing[2],
            ],
            color: [intensity, 0.0, 1.0 - intensity],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::parse;

    fn uchar_descriptor(dims: &str, spacing: &str) -> VolumeDescriptor {
        parse(&format!(
            "NDims=3\nDimSize={dims}\nElementSpacing={spacing}\nElementType=MET_UCHAR\nElementDataFile=d.raw"
        ))
        .unwrap()
    }

    #[test]
    fn test_positions_use_scaled_spacing() {
        let desc = uchar_descriptor("2 1 2", "0.5 1 2");
        let cloud = sample(&desc, &[1, 2, 3, 4], 1, 2.0, 0.0).unwrap();
        let positions: Vec<_> = cloud.samples.iter().map(|s| s.position).collect();
        assert_eq!(
            positions,
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 0.0, 4.0],
                [1.0, 0.0, 4.0],
            ]
        );
        assert!((cloud.suggested_point_size - 20.0 * (1.0 + 2.0 + 4.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_filter_is_strict() {
        let desc = uchar_descriptor("4 1 1", "1 1 1");
        let cloud = sample(&desc, &[5, 6, 5, 7], 1, 1.0, 5.0).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.stats.visited, 4);
        assert_eq!(cloud.stats.min_value, 5.0);
        assert_eq!(cloud.stats.max_value, 7.0);
    }

    #[test]
    fn test_degenerate_range() {
        let desc = uchar_descriptor("2 2 2", "1 1 1");
        let cloud = sample(&desc, &[9; 8], 1, 1.0, 0.0).unwrap();
        assert_eq!(cloud.len(), 8);
        assert!(cloud.samples.iter().all(|s| s.color == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_filter_raises_normalization_floor() {
        let desc = uchar_descriptor("3 1 1", "1 1 1");
        let cloud = sample(&desc, &[0, 10, 20], 1, 1.0, 5.0).unwrap();
        let intensities: Vec<_> = cloud.samples.iter().map(Sample::intensity).collect();
        assert_eq!(intensities, vec![(10.0 - 5.0) / 15.0, 1.0]);
    }

    #[test]
    fn test_infinite_values_are_dropped() {
        let desc = parse(
            "NDims = 3\nDimSize = 3 1 1\nElementSpacing = 1 1 1\nElementType = MET_FLOAT\nElementDataFile = v.raw",
        )
        .unwrap();
        let bytes: Vec<u8> = [1.0f32, f32::INFINITY, 4.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();

        let cloud = sample(&desc, &bytes, 1, 1.0, 0.0).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.stats.max_value, 4.0);
        assert_eq!(cloud.samples[0].color, [0.0, 0.0, 1.0]);
        assert_eq!(cloud.samples[1].color, [1.0, 0.0, 0.0]);
        assert!(cloud.samples.iter().flat_map(|s| s.color).all(f64::is_finite));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let desc = uchar_descriptor("7 5 6", "1 2 3");
        let bytes: Vec<u8> = (0..7 * 5 * 6).map(|i| ((i * 37) % 251) as u8).collect();

        let options = SamplingOptions::new(3, 0.5, 40.0);
        let sequential = VolumeSampler::new(options).unwrap().sample(&desc, &bytes).unwrap();
        let parallel = VolumeSampler::new(options.with_parallel(true))
            .unwrap()
            .sample(&desc, &bytes)
            .unwrap();

        assert_eq!(sequential, parallel);
        assert!(!sequential.is_empty());
    }

    #[test]
    fn test_vertex_buffers() {
        let desc = uchar_descriptor("2 1 1", "1 1 1");
        let cloud = sample(&desc, &[0, 4], 1, 1.0, -1.0).unwrap();
        assert_eq!(cloud.positions(), vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(cloud.colors(), vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert!(cloud.summary().starts_with("2 points"));
    }

    #[test]
    fn test_invalid_step() {
        let desc = uchar_descriptor("1 1 1", "1 1 1");
        assert!(matches!(
            sample(&desc, &[1], 0, 1.0, 0.0),
            Err(SampleError::InvalidOptions(_))
        ));
    }
}
