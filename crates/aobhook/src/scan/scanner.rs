//! Signature scanning over indexed module sections.

use tracing::debug;

use crate::config::ScanConfig;
use crate::diag;
use crate::error::{Result, ResultExt};
use crate::module::{ImageLoader, MemoryRegion, SectionIndex, module_label};
use crate::scan::{Pattern, PatternMatcher, WildcardMatcher};
use crate::signature::{SignatureEntry, SignatureKind};

/// Which module and section to search. `None` fields fall back to the main
/// image and the configured default section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target<'a> {
    pub module: Option<&'a str>,
    pub section: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub const fn main() -> Self {
        Self {
            module: None,
            section: None,
        }
    }

    pub const fn module(name: &'a str) -> Self {
        Self {
            module: Some(name),
            section: None,
        }
    }

    pub const fn section(mut self, name: &'a str) -> Self {
        self.section = Some(name);
        self
    }
}

/// Decoding of a displacement-relative instruction, such as
/// `lea rcx, [rip+disp32]` (`48 8D 0D xx xx xx xx`).
///
/// The 4-byte little-endian displacement sits `opcode_offset` bytes into the
/// instruction and is relative to the next instruction, `instruction_offset`
/// bytes past the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RipRelative {
    pub opcode_offset: usize,
    pub instruction_offset: usize,
}

impl RipRelative {
    /// 7-byte `lea`/`mov` with a REX prefix.
    pub const LEA: Self = Self {
        opcode_offset: 3,
        instruction_offset: 7,
    };

    pub const fn new(opcode_offset: usize, instruction_offset: usize) -> Self {
        Self {
            opcode_offset,
            instruction_offset,
        }
    }

    /// `match_address + instruction_offset + displacement`, wrapping.
    pub const fn resolve(&self, match_address: u64, displacement: i32) -> u64 {
        match_address
            .wrapping_add(self.instruction_offset as u64)
            .wrapping_add_signed(displacement as i64)
    }
}

impl Default for RipRelative {
    fn default() -> Self {
        Self::LEA
    }
}

/// Searches sections of loaded images for byte signatures.
///
/// Owns the [`SectionIndex`], so each module's section table is parsed once
/// for the life of the scanner.
pub struct Scanner<L, M = WildcardMatcher> {
    loader: L,
    matcher: M,
    index: SectionIndex,
    config: ScanConfig,
}

impl<L: ImageLoader> Scanner<L> {
    pub fn new(loader: L) -> Self {
        Self::with_matcher(loader, WildcardMatcher)
    }
}

impl<L: ImageLoader, M: PatternMatcher> Scanner<L, M> {
    pub fn with_matcher(loader: L, matcher: M) -> Self {
        Self {
            loader,
            matcher,
            index: SectionIndex::new(),
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn index(&self) -> &SectionIndex {
        &self.index
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Regions of the target section, in section table order.
    pub fn regions(&mut self, target: Target<'_>) -> Result<&[MemoryRegion]> {
        let section = target.section.unwrap_or(&self.config.default_section);
        self.index.get(&self.loader, target.module, section)
    }

    /// Address of the first match of an already parsed pattern.
    ///
    /// Regions are searched one at a time; a match spanning two adjacent
    /// regions is not found.
    pub fn find(&mut self, pattern: &Pattern, target: Target<'_>) -> Result<u64> {
        let section = target.section.unwrap_or(&self.config.default_section);
        let regions = self
            .index
            .get(&self.loader, target.module, section)
            .chain_err(|| {
                diag!(PatternNotFound, "While attempting to locate pattern: {}", pattern)
            })?;

        for region in regions {
            let bytes = self
                .loader
                .view(region.start, region.size)
                .chain_err(|| {
                    diag!(PatternNotFound, "While attempting to locate pattern: {}", pattern)
                })?;

            if let Some(offset) = self.matcher.find(bytes, pattern) {
                let address = region.start + offset as u64;
                debug!("Pattern {} found at 0x{:X}", pattern, address);
                return Ok(address);
            }
        }

        Err(diag!(
            PatternNotFound,
            "Failed to locate pattern: {} in section {} of module {}",
            pattern,
            section,
            module_label(target.module)
        ))
    }

    pub fn scan_module(&mut self, pattern: &str, target: Target<'_>) -> Result<u64> {
        let pattern = Pattern::parse(pattern)
            .chain_err(|| diag!(PatternNotFound, "Failed to parse pattern: {}", pattern))?;
        self.find(&pattern, target)
    }

    /// [`Self::scan_module`] plus a signed offset from the match.
    pub fn scan_module_offset(
        &mut self,
        pattern: &str,
        offset: i64,
        target: Target<'_>,
    ) -> Result<u64> {
        Ok(self.scan_module(pattern, target)?.wrapping_add_signed(offset))
    }

    /// Resolves the address referenced by the displacement-relative
    /// instruction that starts at the match.
    pub fn scan_base(
        &mut self,
        pattern: &str,
        rip: RipRelative,
        target: Target<'_>,
    ) -> Result<u64> {
        let resolved = self.scan_module(pattern, target).and_then(|address| {
            let displacement = self
                .loader
                .read_i32(address.wrapping_add(rip.opcode_offset as u64))?;
            Ok(rip.resolve(address, displacement))
        });

        resolved.chain_err(|| diag!(BaseNotFound, "Failed to locate base for pattern: {}", pattern))
    }

    /// [`Self::scan_base`] with the configured instruction layout.
    pub fn scan_base_default(&mut self, pattern: &str, target: Target<'_>) -> Result<u64> {
        let rip = self.config.rip_relative;
        self.scan_base(pattern, rip, target)
    }

    /// Every match in every region of the target section.
    pub fn scan_module_all(&mut self, pattern: &str, target: Target<'_>) -> Result<Vec<u64>> {
        let parsed = Pattern::parse(pattern)
            .chain_err(|| diag!(PatternNotFound, "Failed to parse pattern: {}", pattern))?;
        let section = target.section.unwrap_or(&self.config.default_section);
        let regions = self.index.get(&self.loader, target.module, section)?;

        let mut results = Vec::new();
        for region in regions {
            let bytes = self.loader.view(region.start, region.size)?;
            results.extend(
                self.matcher
                    .find_all(bytes, &parsed)
                    .into_iter()
                    .map(|offset| region.start + offset as u64),
            );
        }
        Ok(results)
    }

    /// Resolves the address a signature entry points at. Patch entries
    /// resolve to the address the patch would be written to.
    pub fn resolve(&mut self, entry: &SignatureEntry) -> Result<u64> {
        let target = entry.target();
        let resolved = match &entry.kind {
            SignatureKind::Address { offset } | SignatureKind::Patch { offset, .. } => {
                self.scan_module_offset(&entry.pattern, *offset, target)
            }
            SignatureKind::Base {
                opcode_offset,
                instruction_offset,
            } => self.scan_base(
                &entry.pattern,
                RipRelative::new(*opcode_offset, *instruction_offset),
                target,
            ),
        };
        resolved
            .chain_err(|| diag!(PatternNotFound, "Failed to resolve signature '{}'", entry.name))
    }
}
