//! Sections command implementation.

use std::path::Path;

use anyhow::Result;
use aobhook::ImageLoader;

use super::hex_utils::format_hex_address;
use super::load_image;

/// Run the sections command
pub fn run(image: &Path) -> Result<()> {
    let images = load_image(image)?;
    let module = images.module_handle(None)?;
    let headers = images.section_headers(module)?;

    println!("Image base: {}", module);
    println!();
    println!("{:<8}  {:>18}  {:>10}  {:>10}", "Name", "Address", "Size", "Flags");
    for header in &headers {
        println!(
            "{:<8}  {:>18}  {:>10}  {:>#10X}",
            header.name_lossy(),
            format_hex_address(module.base() + header.virtual_address as u64),
            format!("0x{:X}", header.virtual_size),
            header.characteristics
        );
    }
    println!();
    println!("{} sections", headers.len());
    Ok(())
}
