use std::fmt;

use crate::diag;
use crate::error::Result;
use crate::memory::{MappedImage, ReadMemory};
use crate::module::pe::{self, SectionHeader};

/// Opaque handle of a loaded image. On Windows this is the `HMODULE`, i.e.
/// the image base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleHandle(u64);

impl ModuleHandle {
    pub const fn from_base(base: u64) -> Self {
        Self(base)
    }

    pub const fn base(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Display name for an optional module name, `None` being the main image.
pub fn module_label(name: Option<&str>) -> &str {
    name.unwrap_or("<main image>")
}

/// Source of loaded images: resolves module names and exposes their memory.
pub trait ImageLoader: ReadMemory {
    /// Resolves `name` to a loaded image; `None` is the main executable.
    fn module_handle(&self, name: Option<&str>) -> Result<ModuleHandle>;

    /// Reads the section table of a loaded image.
    fn section_headers(&self, module: ModuleHandle) -> Result<Vec<SectionHeader>> {
        pe::read_section_headers(self, module.base())
    }
}

/// A set of named images held in memory. The first image inserted is the
/// main image.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    images: Vec<(String, MappedImage)>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_main(name: impl Into<String>, image: MappedImage) -> Self {
        let mut set = Self::new();
        set.insert(name, image);
        set
    }

    pub fn insert(&mut self, name: impl Into<String>, image: MappedImage) {
        self.images.push((name.into(), image));
    }

    pub fn get(&self, module: ModuleHandle) -> Option<&MappedImage> {
        self.images
            .iter()
            .map(|(_, image)| image)
            .find(|image| image.base() == module.base())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.iter().map(|(name, _)| name.as_str())
    }
}

impl ReadMemory for ImageSet {
    fn view(&self, address: u64, len: usize) -> Result<&[u8]> {
        match self
            .images
            .iter()
            .find(|(_, image)| image.contains(address, len))
        {
            Some((_, image)) => image.view(address, len),
            None => Err(diag!(
                MemoryAccess,
                "Range 0x{:X}+0x{:X} is not inside any loaded image",
                address,
                len
            )),
        }
    }
}

impl ImageLoader for ImageSet {
    fn module_handle(&self, name: Option<&str>) -> Result<ModuleHandle> {
        let found = match name {
            None => self.images.first(),
            Some(name) => self
                .images
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name)),
        };

        found
            .map(|(_, image)| ModuleHandle::from_base(image.base()))
            .ok_or_else(|| diag!(ModuleNotFound, "Module {} is not loaded", module_label(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn images() -> ImageSet {
        let mut set = ImageSet::with_main("game.exe", MappedImage::new(0x40_0000, vec![0; 0x100]));
        set.insert("engine.dll", MappedImage::new(0x1000_0000, vec![7; 0x100]));
        set
    }

    #[test]
    fn test_module_handle_main_and_named() {
        let set = images();
        assert_eq!(set.module_handle(None).unwrap().base(), 0x40_0000);
        assert_eq!(
            set.module_handle(Some("ENGINE.DLL")).unwrap(),
            ModuleHandle::from_base(0x1000_0000)
        );
    }

    #[test]
    fn test_module_not_found() {
        let err = images().module_handle(Some("missing.dll")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModuleNotFound);
        assert!(err.message().contains("missing.dll"));

        let err = ImageSet::new().module_handle(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModuleNotFound);
    }

    #[test]
    fn test_view_routes_to_owning_image() {
        let set = images();
        assert_eq!(set.view(0x1000_0010, 2).unwrap(), &[7, 7]);
        assert_eq!(set.view(0x40_0010, 2).unwrap(), &[0, 0]);
        assert!(set.view(0x2000_0000, 1).is_err());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(ModuleHandle::from_base(0x7FF6_0000).to_string(), "0x7FF60000");
    }
}
