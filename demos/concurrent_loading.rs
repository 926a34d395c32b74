//! Example: Load several MetaIO volumes concurrently and compare sequential
//! and z-partitioned sampling
//!
//! Run with: cargo run --release --example concurrent_loading

use metaio_cloud::{MetaIoLoader, SamplingOptions};
use std::fs;
use std::time::Instant;

fn write_volume(dir: &std::path::Path, name: &str, dims: [usize; 3]) -> anyhow::Result<String> {
    let count: usize = dims.iter().product();
    let raw: Vec<u8> = (0..count)
        .flat_map(|i| ((i as u32).wrapping_mul(2_654_435_761) >> 20).to_le_bytes())
        .collect();

    let header = format!(
        "NDims = 3\nDimSize = {} {} {}\nElementSpacing = 0.8 0.8 1.2\nElementType = MET_UINT\nElementDataFile = {name}.raw\n",
        dims[0], dims[1], dims[2]
    );
    fs::write(dir.join(format!("{name}.mhd")), header)?;
    fs::write(dir.join(format!("{name}.raw")), raw)?;

    Ok(format!("file://{}/{name}.mhd", dir.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let temp_dir = tempfile::tempdir()?;
    let locations = ["t1", "t2", "flair", "seg"]
        .iter()
        .map(|name| write_volume(temp_dir.path(), name, [160, 160, 96]))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let options = SamplingOptions::default()
        .with_downsample_step(50)
        .with_filter_min(1000.0);

    for parallel in [false, true] {
        let loader = MetaIoLoader::open(&locations[0], options.with_parallel(parallel))?;

        let start = Instant::now();
        let volumes = loader.load_many(&locations).await?;
        let elapsed = start.elapsed();

        println!("parallel = {parallel}: {} volumes in {:?}", volumes.len(), elapsed);
        for volume in &volumes {
            println!("  {} -> {}", volume.header_location, volume.cloud.summary());
        }
    }

    Ok(())
}
