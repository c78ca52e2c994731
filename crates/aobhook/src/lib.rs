//! # aobhook
//!
//! Signature scanning and code instrumentation for modules injected into a
//! host process.
//!
//! This crate provides:
//! - A per-module section index built once from the PE section table
//! - Wildcard byte-pattern scanning, with RIP-relative base resolution
//! - A hook and byte-patch registry with an init, apply and teardown lifecycle
//! - Chained diagnostics that record where each failure was raised
//! - Host helpers for locating the injected module and reporting errors
//!
//! ## Feature Flags
//!
//! - `file-log`: Enables [`logging::init_file`], for hosts that have no console.
//!   On Windows, `logging::init_beside_module` logs next to the injected module.

pub mod config;
pub mod error;
pub mod instrument;
#[cfg(feature = "file-log")]
pub mod logging;
pub mod memory;
pub mod module;
pub mod prelude;
pub mod scan;
pub mod signature;
pub mod util;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{Diagnostic, ErrorKind, Result, ResultExt};
pub use instrument::{
    BytePatcher, EngineError, HookEngine, HookRecord, Instrumentation, PatchEngine, PatchRecord,
    RecordState, WriteMemory,
};
pub use memory::{MappedImage, ReadMemory};
pub use module::{ImageLoader, ImageSet, MemoryRegion, ModuleHandle, SectionIndex};
pub use scan::{Pattern, PatternMatcher, RipRelative, Scanner, Target, WildcardMatcher};
pub use signature::{
    SignatureEntry, SignatureKind, SignatureSet, load_signatures, save_signatures,
};
