//! Check command implementation.

use std::path::Path;

use anyhow::{Result, bail};
use aobhook::{ImageLoader, Scanner, load_signatures};
use owo_colors::OwoColorize;

use super::hex_utils::format_hex_address;
use super::load_image;

/// Run the check command
pub fn run(image: &Path, signatures: &Path) -> Result<()> {
    let set = load_signatures(signatures)?;
    let images = load_image(image)?;
    let base = images.module_handle(None)?.base();
    let mut scanner = Scanner::new(images);

    println!("Signature set {} ({} entries)", set.version, set.entries.len());
    println!();

    let mut failed = 0;
    for entry in &set.entries {
        match scanner.resolve(entry) {
            Ok(address) => println!(
                "{}  {:<32} {} (RVA {})",
                "OK  ".green(),
                entry.name,
                format_hex_address(address),
                format_hex_address(address.wrapping_sub(base))
            ),
            Err(e) => {
                failed += 1;
                println!("{}  {}", "FAIL".red(), entry.name);
                for line in e.render().lines() {
                    println!("      {}", line.dimmed());
                }
            }
        }
    }

    println!();
    if failed > 0 {
        bail!("{} of {} signatures failed to resolve", failed, set.entries.len());
    }
    println!("All {} signatures resolved", set.entries.len());
    Ok(())
}
