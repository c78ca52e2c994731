//! Prelude module for convenient imports
//!
//! ```ignore
//! use aobhook::prelude::*;
//! ```
//!
//! This brings the following into scope:
//!
//! - Scanning: `Scanner`, `Target`, `RipRelative`, `Pattern`
//! - Instrumentation: `Instrumentation` and the engine traits
//! - Error handling: `Diagnostic`, `ErrorKind`, `Result`, `ResultExt`, `diag!`

// Scanning
pub use crate::config::ScanConfig;
pub use crate::scan::{Pattern, RipRelative, Scanner, Target};

// Instrumentation
pub use crate::instrument::{HookEngine, Instrumentation, PatchEngine};
#[cfg(target_os = "windows")]
pub use crate::instrument::LocalInstrumentation;

// Memory
pub use crate::memory::ReadMemory;
pub use crate::module::ImageLoader;

// Host
#[cfg(target_os = "windows")]
pub use crate::util::{current_module_name, show_error};

// Error handling
pub use crate::diag;
pub use crate::error::{Diagnostic, ErrorKind, Result, ResultExt};
