use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AppConfig;

/// Print the effective configuration, with the base directory resolved.
pub fn run(config: &AppConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) if path.exists() => println!("# {}", path.display()),
        Some(path) => println!("# {} (not found, using defaults)", path.display()),
        None => println!("# no config directory, using defaults"),
    }

    let mut effective = config.clone();
    effective.base_dir = Some(config.base_dir()?);

    let text = toml::to_string_pretty(&effective).context("failed to render configuration")?;
    print!("{text}");
    Ok(())
}
