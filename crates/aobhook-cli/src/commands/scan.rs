//! Scan command implementation.

use std::path::Path;

use anyhow::Result;
use aobhook::{Scanner, Target};

use super::hex_utils::{format_hex_address, parse_offset};
use super::load_image;

/// Run the scan command
pub fn run(
    image: &Path,
    pattern: &str,
    section: Option<&str>,
    offset: &str,
    all: bool,
) -> Result<()> {
    let offset = parse_offset(offset)?;
    let images = load_image(image)?;
    let mut scanner = Scanner::new(images);

    let target = Target {
        module: None,
        section,
    };

    if all {
        let matches = scanner.scan_module_all(pattern, target)?;
        for address in &matches {
            println!("{}", format_hex_address(address.wrapping_add_signed(offset)));
        }
        println!("{} matches", matches.len());
    } else {
        let address = scanner.scan_module_offset(pattern, offset, target)?;
        println!("{}", format_hex_address(address));
    }
    Ok(())
}
