//! Example: Write a synthetic MetaIO volume to disk and turn it into points
//!
//! Run with: cargo run --example point_cloud [path/to/volume.mhd]

use metaio_cloud::{load_point_cloud, SamplingOptions};
use std::fs;
use tracing_subscriber::EnvFilter;

/// A 64^3 float volume holding the distance from the grid center
fn write_sphere(dir: &std::path::Path) -> anyhow::Result<String> {
    const N: usize = 64;
    let center = (N as f32 - 1.0) / 2.0;

    let mut raw = Vec::with_capacity(N * N * N * 4);
    for z in 0..N {
        for y in 0..N {
            for x in 0..N {
                let d = ((x as f32 - center).powi(2)
                    + (y as f32 - center).powi(2)
                    + (z as f32 - center).powi(2))
                .sqrt();
                raw.extend_from_slice(&(center - d).to_le_bytes());
            }
        }
    }

    let header = format!(
        "ObjectType = Image\nNDims = 3\nDimSize = {N} {N} {N}\nElementSpacing = 1 1 2\n\
         ElementType = MET_FLOAT\nElementDataFile = sphere.raw\n"
    );
    fs::write(dir.join("sphere.mhd"), header)?;
    fs::write(dir.join("sphere.raw"), raw)?;

    Ok(dir.join("sphere.mhd").to_string_lossy().into_owned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let temp_dir = tempfile::tempdir()?;
    let location = match std::env::args().nth(1) {
        Some(path) => path,
        None => write_sphere(temp_dir.path())?,
    };

    // Keep only the inner half of the sphere, every 8th voxel
    let options = SamplingOptions::default()
        .with_downsample_step(8)
        .with_scale_factor(0.1)
        .with_filter_min(0.0)
        .with_parallel(true);

    let loaded = load_point_cloud(&location, options).await?;

    println!("Header:  {}", loaded.header_location);
    println!("Data:    {}", loaded.data_location);
    println!(
        "Volume:  {:?} {} spacing {:?}",
        loaded.descriptor.dim_size, loaded.descriptor.element_type, loaded.descriptor.element_spacing
    );
    println!("Cloud:   {}", loaded.cloud.summary());

    let positions = loaded.cloud.positions();
    let colors = loaded.cloud.colors();
    println!(
        "Buffers: {} position floats, {} color floats",
        positions.len(),
        colors.len()
    );

    Ok(())
}
