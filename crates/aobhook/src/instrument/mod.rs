//! Hook and patch registration on top of the scanner.

mod engine;
#[cfg(target_os = "windows")]
mod minhook;
mod patcher;
mod registry;

pub use engine::{EngineError, EngineResult, HookEngine, PatchEngine};
#[cfg(target_os = "windows")]
pub use minhook::MinHook;
#[cfg(target_os = "windows")]
pub use patcher::ProtectedWriter;
pub use patcher::{BytePatcher, WriteMemory};
#[cfg(target_os = "windows")]
pub use registry::LocalInstrumentation;
pub use registry::{HookRecord, Instrumentation, PatchRecord, RecordState};
