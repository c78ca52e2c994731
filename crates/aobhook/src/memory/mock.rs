//! Synthetic PE images for tests.

use crate::memory::MappedImage;

const E_LFANEW: usize = 0x40;
const FILE_HEADER: usize = E_LFANEW + 4;
const OPTIONAL_HEADER: usize = FILE_HEADER + 20;
const OPTIONAL_HEADER_LEN: usize = 0xF0;
const SECTION_TABLE: usize = OPTIONAL_HEADER + OPTIONAL_HEADER_LEN;
const SIZE_OF_HEADERS: usize = 0x400;
const PAGE: usize = 0x1000;

struct MockSection {
    name: String,
    virtual_address: u32,
    data: Vec<u8>,
}

/// Builds a minimal PE32+ image with the given sections.
///
/// ```ignore
/// let image = MockImageBuilder::new(0x1_4000_0000)
///     .section(".text", 0x1000, code)
///     .build();
/// ```
pub struct MockImageBuilder {
    base: u64,
    sections: Vec<MockSection>,
}

impl MockImageBuilder {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            sections: Vec::new(),
        }
    }

    /// Adds a section whose virtual size is `data.len()`. Names longer than
    /// eight bytes are truncated.
    pub fn section(mut self, name: &str, virtual_address: u32, data: Vec<u8>) -> Self {
        self.sections.push(MockSection {
            name: name.to_string(),
            virtual_address,
            data,
        });
        self
    }

    fn size_of_image(&self) -> usize {
        let end = self
            .sections
            .iter()
            .map(|s| s.virtual_address as usize + s.data.len())
            .max()
            .unwrap_or(SIZE_OF_HEADERS)
            .max(SIZE_OF_HEADERS);
        end.div_ceil(PAGE) * PAGE
    }

    /// Headers followed by section table entries; `raw` gives each section's
    /// file offset, or `None` for an in-memory image.
    fn headers(&self, raw: &[Option<u32>]) -> Vec<u8> {
        let mut out = vec![0u8; SIZE_OF_HEADERS];
        out[0] = b'M';
        out[1] = b'Z';
        put_u32(&mut out, 0x3C, E_LFANEW as u32);
        out[E_LFANEW..E_LFANEW + 4].copy_from_slice(b"PE\0\0");

        put_u16(&mut out, FILE_HEADER, 0x8664);
        put_u16(&mut out, FILE_HEADER + 2, self.sections.len() as u16);
        put_u16(&mut out, FILE_HEADER + 16, OPTIONAL_HEADER_LEN as u16);

        put_u16(&mut out, OPTIONAL_HEADER, 0x20B);
        put_u64(&mut out, OPTIONAL_HEADER + 24, self.base);
        put_u32(&mut out, OPTIONAL_HEADER + 56, self.size_of_image() as u32);
        put_u32(&mut out, OPTIONAL_HEADER + 60, SIZE_OF_HEADERS as u32);

        for (i, section) in self.sections.iter().enumerate() {
            let entry = SECTION_TABLE + i * 40;
            let name = section.name.as_bytes();
            let name_len = name.len().min(8);
            out[entry..entry + name_len].copy_from_slice(&name[..name_len]);
            put_u32(&mut out, entry + 8, section.data.len() as u32);
            put_u32(&mut out, entry + 12, section.virtual_address);
            put_u32(&mut out, entry + 16, section.data.len() as u32);
            put_u32(&mut out, entry + 20, raw[i].unwrap_or(0));
            put_u32(&mut out, entry + 36, 0x6000_0020);
        }
        out
    }

    /// The image as mapped in memory at `base`.
    pub fn build(self) -> MappedImage {
        let mut bytes = vec![0u8; self.size_of_image()];
        let headers = self.headers(&vec![None; self.sections.len()]);
        bytes[..headers.len()].copy_from_slice(&headers);
        for section in &self.sections {
            let start = section.virtual_address as usize;
            bytes[start..start + section.data.len()].copy_from_slice(&section.data);
        }
        MappedImage::new(self.base, bytes)
    }

    /// The image as a file on disk, sections packed after the headers.
    pub fn build_file(self) -> Vec<u8> {
        let mut offsets = Vec::with_capacity(self.sections.len());
        let mut next = SIZE_OF_HEADERS;
        for section in &self.sections {
            offsets.push(Some(next as u32));
            next += section.data.len();
        }

        let mut file = self.headers(&offsets);
        for section in &self.sections {
            file.extend_from_slice(&section.data);
        }
        file
    }
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}
