//! CLI command implementations.

pub mod base;
pub mod check;
pub mod hex_utils;
pub mod scan;
pub mod sections;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use aobhook::{ImageSet, MappedImage};
use tracing::info;

/// Loads a PE file and maps it at its preferred base.
pub fn load_image(path: &Path) -> Result<ImageSet> {
    let file = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let image = MappedImage::from_pe_file(&file)?;
    info!(
        "Mapped {} at 0x{:X} (0x{:X} bytes)",
        path.display(),
        image.base(),
        image.len()
    );

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ImageSet::with_main(name, image))
}
