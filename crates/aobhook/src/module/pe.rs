//! PE header walking.
//!
//! Headers are read at the image base exactly as the loader left them. The
//! DOS and NT signatures are not checked: a module handle handed out by the
//! loader is trusted to point at a valid image.

use std::borrow::Cow;

use crate::diag;
use crate::error::{Result, ResultExt};
use crate::memory::ReadMemory;
use crate::module::hash::fnv1a_64;

pub const SECTION_NAME_LEN: usize = 8;

const E_LFANEW: u64 = 0x3C;
const NT_SIGNATURE_LEN: u64 = 4;
const FILE_HEADER_LEN: u64 = 20;
const SECTION_HEADER_LEN: usize = 40;

// Offsets inside IMAGE_FILE_HEADER
const NUMBER_OF_SECTIONS: u64 = 2;
const SIZE_OF_OPTIONAL_HEADER: u64 = 16;

// Offsets inside IMAGE_OPTIONAL_HEADER
const PE32_MAGIC: u16 = 0x10B;
const IMAGE_BASE_PE32: u64 = 28;
const IMAGE_BASE_PE32_PLUS: u64 = 24;
const SIZE_OF_IMAGE: u64 = 56;
const SIZE_OF_HEADERS: u64 = 60;

/// One entry of an image's section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: [u8; SECTION_NAME_LEN],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    fn parse(raw: &[u8]) -> Self {
        let u32_at =
            |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        let mut name = [0u8; SECTION_NAME_LEN];
        name.copy_from_slice(&raw[..SECTION_NAME_LEN]);
        Self {
            name,
            virtual_size: u32_at(8),
            virtual_address: u32_at(12),
            size_of_raw_data: u32_at(16),
            pointer_to_raw_data: u32_at(20),
            characteristics: u32_at(36),
        }
    }

    /// Name bytes up to the first NUL. Eight-character names have none.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SECTION_NAME_LEN);
        &self.name[..len]
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    pub fn name_hash(&self) -> u64 {
        fnv1a_64(self.name_bytes())
    }
}

/// The handful of header fields needed to lay out or index an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeaders {
    pub image_base: u64,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub sections: Vec<SectionHeader>,
}

struct Layout {
    optional_header: u64,
    section_table: u64,
    section_count: usize,
}

/// `base + delta`, failing instead of wrapping past the end of the
/// address space.
fn header_address(base: u64, delta: u64) -> Result<u64> {
    base.checked_add(delta).ok_or_else(|| {
        diag!(
            MemoryAccess,
            "Header address 0x{:X}+0x{:X} overflows the address space",
            base,
            delta
        )
    })
}

fn read_layout<R: ReadMemory + ?Sized>(memory: &R, base: u64) -> Result<Layout> {
    let e_lfanew = memory.read_u32(header_address(base, E_LFANEW)?)?;
    let file_header = header_address(base, e_lfanew as u64 + NT_SIGNATURE_LEN)?;
    let section_count =
        memory.read_u16(header_address(file_header, NUMBER_OF_SECTIONS)?)? as usize;
    let optional_len =
        memory.read_u16(header_address(file_header, SIZE_OF_OPTIONAL_HEADER)?)? as u64;
    let optional_header = header_address(file_header, FILE_HEADER_LEN)?;
    let section_table = header_address(optional_header, optional_len)?;

    Ok(Layout {
        optional_header,
        section_table,
        section_count,
    })
}

fn read_table<R: ReadMemory + ?Sized>(memory: &R, layout: &Layout) -> Result<Vec<SectionHeader>> {
    let table = memory.view(layout.section_table, layout.section_count * SECTION_HEADER_LEN)?;
    Ok(table
        .chunks_exact(SECTION_HEADER_LEN)
        .map(SectionHeader::parse)
        .collect())
}

/// Reads the section table of the image mapped at `base`, in table order.
pub fn read_section_headers<R: ReadMemory + ?Sized>(
    memory: &R,
    base: u64,
) -> Result<Vec<SectionHeader>> {
    let layout = read_layout(memory, base)
        .chain_err(|| diag!(MemoryAccess, "Failed to read PE headers at 0x{:X}", base))?;
    read_table(memory, &layout)
        .chain_err(|| diag!(MemoryAccess, "Failed to read section table at 0x{:X}", base))
}

/// Reads the section table plus base and size fields of the optional header.
pub fn read_image_headers<R: ReadMemory + ?Sized>(memory: &R, base: u64) -> Result<ImageHeaders> {
    let layout = read_layout(memory, base)
        .chain_err(|| diag!(MemoryAccess, "Failed to read PE headers at 0x{:X}", base))?;

    let optional = layout.optional_header;
    let image_base = if memory.read_u16(optional)? == PE32_MAGIC {
        memory.read_u32(header_address(optional, IMAGE_BASE_PE32)?)? as u64
    } else {
        memory.read_u64(header_address(optional, IMAGE_BASE_PE32_PLUS)?)?
    };

    Ok(ImageHeaders {
        image_base,
        size_of_image: memory.read_u32(header_address(optional, SIZE_OF_IMAGE)?)?,
        size_of_headers: memory.read_u32(header_address(optional, SIZE_OF_HEADERS)?)?,
        sections: read_table(memory, &layout)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{MappedImage, MockImageBuilder};
    use crate::module::hash::section_hash;

    #[test]
    fn test_read_section_headers_in_table_order() {
        let image = MockImageBuilder::new(0x40_0000)
            .section(".text", 0x1000, vec![0x90; 0x30])
            .section(".rdata", 0x2000, vec![0; 0x10])
            .section(".data", 0x3000, vec![0; 0x08])
            .build();

        let sections = read_section_headers(&image, image.base()).unwrap();
        let names: Vec<_> = sections.iter().map(|s| s.name_lossy().into_owned()).collect();
        assert_eq!(names, [".text", ".rdata", ".data"]);
        assert_eq!(sections[0].virtual_address, 0x1000);
        assert_eq!(sections[0].virtual_size, 0x30);
        assert_eq!(sections[1].name_hash(), section_hash(".rdata"));
    }

    #[test]
    fn test_eight_character_name_has_no_terminator() {
        let image = MockImageBuilder::new(0x40_0000)
            .section(".textbss", 0x1000, vec![0; 4])
            .build();

        let sections = read_section_headers(&image, image.base()).unwrap();
        assert_eq!(sections[0].name_bytes(), b".textbss");
        assert_eq!(sections[0].name_hash(), section_hash(".textbss"));
    }

    #[test]
    fn test_read_image_headers() {
        let image = MockImageBuilder::new(0x1_8000_0000)
            .section(".text", 0x1000, vec![0xC3; 0x100])
            .build();

        let headers = read_image_headers(&image, image.base()).unwrap();
        assert_eq!(headers.image_base, 0x1_8000_0000);
        assert_eq!(headers.size_of_image as usize, image.len());
        assert_eq!(headers.sections.len(), 1);
    }

    #[test]
    fn test_unreadable_headers() {
        let image = MappedImage::new(0x1000, vec![0; 0x20]);
        let err = read_section_headers(&image, 0x1000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemoryAccess);
        assert!(err.message().contains("PE headers"));
    }
}
