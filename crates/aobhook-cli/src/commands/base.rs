//! Base command implementation.

use std::path::Path;

use anyhow::Result;
use aobhook::{ImageLoader, RipRelative, Scanner, Target};

use super::hex_utils::format_hex_address;
use super::load_image;

/// Run the base command
pub fn run(
    image: &Path,
    pattern: &str,
    opcode_offset: usize,
    instruction_offset: usize,
    section: Option<&str>,
) -> Result<()> {
    let images = load_image(image)?;
    let module = images.module_handle(None)?;
    let mut scanner = Scanner::new(images);

    let target = Target {
        module: None,
        section,
    };
    let rip = RipRelative::new(opcode_offset, instruction_offset);
    let address = scanner.scan_base(pattern, rip, target)?;

    println!(
        "{} (RVA {})",
        format_hex_address(address),
        format_hex_address(address.wrapping_sub(module.base()))
    );
    Ok(())
}
