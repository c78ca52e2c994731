//! Hooking and patching backends driven by the registry.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{engine} returned status {status}")]
    Status { engine: &'static str, status: i32 },

    #[error("Engine is already initialized")]
    AlreadyInitialized,

    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("An entry already exists at {0:#x}")]
    AlreadyCreated(u64),

    #[error("No entry exists at {0:#x}")]
    NotCreated(u64),

    #[error("Replacement byte string is empty")]
    EmptyPatch,

    #[error("Memory access failed at address {address:#x}: {message}")]
    Memory { address: u64, message: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Inline function detours.
pub trait HookEngine {
    fn initialize(&mut self) -> EngineResult<()>;

    /// Prepares a detour from `source` to `destination` without enabling it.
    /// Returns the trampoline that calls through to the original code.
    fn create_hook(&mut self, source: u64, destination: u64) -> EngineResult<u64>;

    fn enable_hook(&mut self, source: u64) -> EngineResult<()>;

    fn disable_hook(&mut self, source: u64) -> EngineResult<()>;

    fn disable_all(&mut self) -> EngineResult<()>;

    fn uninitialize(&mut self) -> EngineResult<()>;
}

/// Reversible in-place byte patches.
pub trait PatchEngine {
    /// Records a patch and captures the bytes it will replace. Nothing is
    /// written until [`PatchEngine::enable_patch`].
    fn create_patch(&mut self, address: u64, replacement: &[u8]) -> EngineResult<()>;

    fn enable_patch(&mut self, address: u64) -> EngineResult<()>;

    /// Restores the captured original bytes.
    fn disable_patch(&mut self, address: u64) -> EngineResult<()>;

    fn disable_all(&mut self) -> EngineResult<()>;

    /// Forgets every patch. Enabled patches are left in place.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::Status {
            engine: "MinHook",
            status: 9,
        };
        assert_eq!(err.to_string(), "MinHook returned status 9");
        assert_eq!(
            EngineError::NotCreated(0x1400).to_string(),
            "No entry exists at 0x1400"
        );
    }
}
