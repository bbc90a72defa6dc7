use anyhow::{Context, Result};
use segsync::layout;
use segsync::{ContentHasher, DeltaReference, LocalLayout, Md5Hasher};

use crate::config::AppConfig;

/// Print the digest of a local segment and the delta URL it addresses.
pub fn run(config: &AppConfig, segment: &str) -> Result<()> {
    let name = layout::segment_name(segment)?;
    let local = LocalLayout::new(config.base_dir()?);
    let live = local.segment(name).live;

    let hash = Md5Hasher
        .hash_file(&live)
        .with_context(|| format!("failed to read {}", live.display()))?;
    let url = config.server.remote().delta(&DeltaReference::new(name, &hash));

    println!("{hash}  {}", live.display());
    println!("delta: {url}");
    Ok(())
}
