use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::diag;
use crate::error::Result;
use crate::scan::Target;

/// How a matched signature turns into an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignatureKind {
    /// Match address plus a signed offset.
    Address {
        #[serde(default)]
        offset: i64,
    },
    /// Target of the displacement-relative instruction at the match.
    Base {
        #[serde(default = "default_opcode_offset")]
        opcode_offset: usize,
        #[serde(default = "default_instruction_offset")]
        instruction_offset: usize,
    },
    /// Bytes written at match address plus offset.
    Patch {
        replacement: String,
        #[serde(default)]
        offset: i64,
    },
}

fn default_opcode_offset() -> usize {
    3
}

fn default_instruction_offset() -> usize {
    7
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub name: String,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(flatten)]
    pub kind: SignatureKind,
}

impl SignatureEntry {
    /// Entry searching the main image's default section.
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, kind: SignatureKind) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            module: None,
            section: None,
            kind,
        }
    }

    pub fn target(&self) -> Target<'_> {
        Target {
            module: self.module.as_deref(),
            section: self.section.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    pub version: String,
    pub entries: Vec<SignatureEntry>,
}

impl SignatureSet {
    pub fn entry(&self, name: &str) -> Option<&SignatureEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| diag!(Io, "Failed to read signatures from {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| diag!(Io, "Failed to parse signatures in {}: {}", path.display(), e))
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &SignatureSet) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(signatures)
        .map_err(|e| diag!(Io, "Failed to serialize signatures: {}", e))?;
    fs::write(path, content)
        .map_err(|e| diag!(Io, "Failed to write signatures to {}: {}", path.display(), e))
}
