//! An image held in an owned buffer at its virtual layout.

use tracing::debug;

use crate::diag;
use crate::error::{Result, ResultExt};
use crate::memory::ReadMemory;
use crate::module::pe;

/// Bytes of one image, addressed as if mapped at `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedImage {
    base: u64,
    bytes: Vec<u8>,
}

impl MappedImage {
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// Lays out a PE file the way the loader would: headers at the image
    /// base, each section's raw data at its virtual address.
    pub fn from_pe_file(file: &[u8]) -> Result<Self> {
        let raw = RawFile(file);
        let headers = pe::read_image_headers(&raw, 0)
            .chain_err(|| diag!(Io, "Failed to read PE headers from file"))?;

        if headers.image_base.checked_add(headers.size_of_image as u64).is_none() {
            return Err(diag!(
                Io,
                "Image at 0x{:X} with size 0x{:X} extends past the end of the address space",
                headers.image_base,
                headers.size_of_image
            ));
        }

        let mut bytes = vec![0u8; headers.size_of_image as usize];
        let header_len = (headers.size_of_headers as usize)
            .min(file.len())
            .min(bytes.len());
        bytes[..header_len].copy_from_slice(&file[..header_len]);

        for section in &headers.sections {
            let raw_len = if section.virtual_size == 0 {
                section.size_of_raw_data
            } else {
                section.size_of_raw_data.min(section.virtual_size)
            } as usize;
            let src_start = section.pointer_to_raw_data as usize;
            let dst_start = section.virtual_address as usize;

            let src = file.get(src_start..src_start + raw_len).ok_or_else(|| {
                diag!(
                    Io,
                    "Raw data of section {} (0x{:X}..0x{:X}) lies outside the file",
                    section.name_lossy(),
                    src_start,
                    src_start + raw_len
                )
            })?;
            let dst = bytes.get_mut(dst_start..dst_start + raw_len).ok_or_else(|| {
                diag!(
                    Io,
                    "Section {} at RVA 0x{:X} lies outside SizeOfImage 0x{:X}",
                    section.name_lossy(),
                    dst_start,
                    headers.size_of_image
                )
            })?;
            dst.copy_from_slice(src);
        }

        debug!(
            "Mapped PE file: base 0x{:X}, {} sections, 0x{:X} bytes",
            headers.image_base,
            headers.sections.len(),
            headers.size_of_image
        );
        Ok(Self::new(headers.image_base, bytes))
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One past the last byte, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.bytes.len() as u64)
    }

    pub fn contains(&self, address: u64, len: usize) -> bool {
        self.offset_of(address, len).is_some()
    }

    /// Offset of `address` into the buffer if `len` bytes from it are inside.
    fn offset_of(&self, address: u64, len: usize) -> Option<usize> {
        let start = address.checked_sub(self.base)?;
        let end = start.checked_add(len as u64)?;
        (end <= self.bytes.len() as u64).then_some(start as usize)
    }

    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let range = self.range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn range(&self, address: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let start = self.offset_of(address, len).ok_or_else(|| {
            diag!(
                MemoryAccess,
                "Range 0x{:X}+0x{:X} is outside the image at 0x{:X}..0x{:X}",
                address,
                len,
                self.base,
                self.end()
            )
        })?;
        Ok(start..start + len)
    }
}

impl ReadMemory for MappedImage {
    fn view(&self, address: u64, len: usize) -> Result<&[u8]> {
        let range = self.range(address, len)?;
        Ok(&self.bytes[range])
    }
}

/// A file read at file offsets, used only to parse its headers.
struct RawFile<'a>(&'a [u8]);

impl ReadMemory for RawFile<'_> {
    fn view(&self, address: u64, len: usize) -> Result<&[u8]> {
        let start = address as usize;
        self.0.get(start..start.saturating_add(len)).ok_or_else(|| {
            diag!(
                MemoryAccess,
                "File offset 0x{:X}+0x{:X} is past the end of the file (0x{:X} bytes)",
                address,
                len,
                self.0.len()
            )
        })
    }
}
