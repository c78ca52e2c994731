//! Per-module section index.
//!
//! Pattern scans during startup hit the same handful of sections over and
//! over. The first lookup against a module parses its whole section table
//! once; later lookups only read the map. Entries are never invalidated,
//! so a module unloaded and replaced under the same handle keeps its old
//! layout.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::diag;
use crate::error::{Result, ResultExt};
use crate::module::hash::section_hash;
use crate::module::{ImageLoader, ModuleHandle, module_label};

/// One occurrence of a section in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub size: usize,
}

impl MemoryRegion {
    pub const fn new(start: u64, size: usize) -> Self {
        Self { start, size }
    }

    /// One past the last byte, saturating at `u64::MAX`.
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size as u64)
    }

    pub const fn contains(&self, address: u64) -> bool {
        address >= self.start && address - self.start < self.size as u64
    }
}

type SectionMap = HashMap<u64, Vec<MemoryRegion>>;

/// Maps (module, section name) to the regions that section occupies.
#[derive(Debug, Default)]
pub struct SectionIndex {
    modules: HashMap<ModuleHandle, SectionMap>,
}

impl SectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the regions named `section` in `module`, in section table order.
    ///
    /// Builds the module's entry on first use. A section missing from an
    /// already indexed module fails without touching the entry.
    pub fn get<L: ImageLoader + ?Sized>(
        &mut self,
        loader: &L,
        module: Option<&str>,
        section: &str,
    ) -> Result<&[MemoryRegion]> {
        let handle = loader.module_handle(module)?;

        let sections = match self.modules.entry(handle) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let sections = build(loader, handle).chain_err(|| {
                    diag!(
                        SectionNotFound,
                        "Failed to index sections of module {} at {}",
                        module_label(module),
                        handle
                    )
                })?;
                entry.insert(sections)
            }
        };

        sections
            .get(&section_hash(section))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                diag!(
                    SectionNotFound,
                    "Section {} not found in module {}",
                    section,
                    module_label(module)
                )
            })
    }

    pub fn is_cached(&self, module: ModuleHandle) -> bool {
        self.modules.contains_key(&module)
    }

    /// Total number of regions recorded for a cached module.
    pub fn region_count(&self, module: ModuleHandle) -> Option<usize> {
        self.modules
            .get(&module)
            .map(|sections| sections.values().map(Vec::len).sum())
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleHandle> + '_ {
        self.modules.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn build<L: ImageLoader + ?Sized>(loader: &L, handle: ModuleHandle) -> Result<SectionMap> {
    let headers = loader.section_headers(handle)?;

    let mut sections = SectionMap::with_capacity(headers.len());
    for header in &headers {
        let start = handle
            .base()
            .checked_add(header.virtual_address as u64)
            .ok_or_else(|| {
                diag!(
                    MemoryAccess,
                    "Section {} at RVA 0x{:X} lies past the end of the address space",
                    header.name_lossy(),
                    header.virtual_address
                )
            })?;
        let region = MemoryRegion::new(start, header.virtual_size as usize);
        sections.entry(header.name_hash()).or_default().push(region);
    }

    debug!("Indexed {} sections of module at {}", headers.len(), handle);
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{MappedImage, MockImageBuilder, ReadMemory};
    use crate::module::{ImageSet, SectionHeader};

    /// Counts section table parses.
    struct CountingLoader {
        inner: ImageSet,
        parses: Cell<usize>,
    }

    impl CountingLoader {
        fn new(inner: ImageSet) -> Self {
            Self {
                inner,
                parses: Cell::new(0),
            }
        }
    }

    impl ReadMemory for CountingLoader {
        fn view(&self, address: u64, len: usize) -> Result<&[u8]> {
            self.inner.view(address, len)
        }
    }

    impl ImageLoader for CountingLoader {
        fn module_handle(&self, name: Option<&str>) -> Result<ModuleHandle> {
            self.inner.module_handle(name)
        }

        fn section_headers(&self, module: ModuleHandle) -> Result<Vec<SectionHeader>> {
            self.parses.set(self.parses.get() + 1);
            self.inner.section_headers(module)
        }
    }

    const BASE: u64 = 0x1_4000_0000;

    fn loader() -> CountingLoader {
        let image = MockImageBuilder::new(BASE)
            .section(".text", 0x1000, vec![0x90; 0x200])
            .section(".rdata", 0x2000, vec![0; 0x80])
            .section(".text", 0x3000, vec![0xCC; 0x40])
            .build();
        let mut set = ImageSet::with_main("game.exe", image);
        set.insert(
            "helper.dll",
            MockImageBuilder::new(0x7FF0_0000)
                .section(".text", 0x1000, vec![0xC3; 0x10])
                .build(),
        );
        CountingLoader::new(set)
    }

    #[test]
    fn test_parses_once_per_module() {
        let loader = loader();
        let mut index = SectionIndex::new();

        index.get(&loader, None, ".text").unwrap();
        index.get(&loader, None, ".text").unwrap();
        index.get(&loader, None, ".rdata").unwrap();
        assert_eq!(loader.parses.get(), 1);

        index.get(&loader, Some("helper.dll"), ".text").unwrap();
        index.get(&loader, Some("HELPER.dll"), ".text").unwrap();
        assert_eq!(loader.parses.get(), 2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_duplicate_names_keep_table_order() {
        let loader = loader();
        let mut index = SectionIndex::new();

        let regions = index.get(&loader, None, ".text").unwrap();
        assert_eq!(
            regions,
            &[
                MemoryRegion::new(BASE + 0x1000, 0x200),
                MemoryRegion::new(BASE + 0x3000, 0x40),
            ]
        );
    }

    #[test]
    fn test_missing_section_leaves_cache_untouched() {
        let loader = loader();
        let mut index = SectionIndex::new();
        let handle = ModuleHandle::from_base(BASE);

        index.get(&loader, None, ".rdata").unwrap();
        let before = index.region_count(handle);

        let err = index.get(&loader, None, ".pdata").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SectionNotFound);
        assert!(err.message().contains(".pdata"));

        assert_eq!(index.region_count(handle), before);
        assert_eq!(before, Some(3));
        assert_eq!(loader.parses.get(), 1);

        // A second miss does not rebuild either.
        assert!(index.get(&loader, None, ".pdata").is_err());
        assert_eq!(loader.parses.get(), 1);
    }

    #[test]
    fn test_unknown_module_is_not_cached() {
        let loader = loader();
        let mut index = SectionIndex::new();

        let err = index.get(&loader, Some("absent.dll"), ".text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModuleNotFound);
        assert!(index.is_empty());
        assert_eq!(loader.parses.get(), 0);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let set = ImageSet::with_main("broken.exe", MappedImage::new(0x1000, vec![0; 0x10]));
        let loader = CountingLoader::new(set);
        let mut index = SectionIndex::new();

        let err = index.get(&loader, None, ".text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SectionNotFound);
        assert_eq!(err.root_cause().kind(), ErrorKind::MemoryAccess);
        assert!(!index.is_cached(ModuleHandle::from_base(0x1000)));

        assert!(index.get(&loader, None, ".text").is_err());
        assert_eq!(loader.parses.get(), 2);
    }

    #[test]
    fn test_region_contains() {
        let region = MemoryRegion::new(0x1000, 0x10);
        assert!(region.contains(0x1000));
        assert!(region.contains(0x100F));
        assert!(!region.contains(0x1010));
        assert_eq!(region.end(), 0x1010);

        let top = MemoryRegion::new(u64::MAX - 0xF, 0x20);
        assert_eq!(top.end(), u64::MAX);
        assert!(top.contains(u64::MAX));
    }

    #[test]
    fn test_section_past_address_space_end_is_rejected() {
        let base = 0xFFFF_FFFF_FFFF_F000;
        let image = MockImageBuilder::new(base)
            .section(".text", 0x1000, vec![0xC3; 0x10])
            .build();
        let loader = CountingLoader::new(ImageSet::with_main("high.exe", image));
        let mut index = SectionIndex::new();

        let err = index.get(&loader, None, ".text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SectionNotFound);
        assert_eq!(err.root_cause().kind(), ErrorKind::MemoryAccess);
        assert!(!index.is_cached(ModuleHandle::from_base(base)));
    }
}
