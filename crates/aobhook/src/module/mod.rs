//! Loaded modules and the per-module section index.

pub mod hash;
mod index;
mod loader;
pub mod pe;

pub use hash::section_hash;
pub use index::{MemoryRegion, SectionIndex};
pub use loader::{ImageLoader, ImageSet, ModuleHandle, module_label};
pub use pe::SectionHeader;
