//! Hook and patch registration with a batched init, apply and teardown
//! lifecycle.

use tracing::{debug, info, warn};

use crate::diag;
use crate::error::{Result, ResultExt};
use crate::instrument::{HookEngine, PatchEngine};
use crate::module::ImageLoader;
use crate::scan::{PatternMatcher, Scanner, Target, WildcardMatcher, parse_bytes};
use crate::signature::{SignatureKind, SignatureSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Queued,
    Applied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRecord {
    pub source: u64,
    pub destination: u64,
    pub trampoline: u64,
    pub state: RecordState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    pub address: u64,
    pub replacement: Vec<u8>,
    pub state: RecordState,
}

/// Queues hooks and patches against pattern-resolved addresses and drives
/// the engines through `initialize`, `apply` and `unhook`.
///
/// Records only move forward (`Queued` to `Applied`); the sole way back is
/// [`Instrumentation::unhook`], which tears everything down at once.
pub struct Instrumentation<L, H, P, M = WildcardMatcher> {
    scanner: Scanner<L, M>,
    hook_engine: H,
    patch_engine: P,
    hooks: Vec<HookRecord>,
    patches: Vec<PatchRecord>,
    initialized: bool,
}

impl<L, H, P, M> Instrumentation<L, H, P, M>
where
    L: ImageLoader,
    H: HookEngine,
    P: PatchEngine,
    M: PatternMatcher,
{
    pub fn new(scanner: Scanner<L, M>, hook_engine: H, patch_engine: P) -> Self {
        Self {
            scanner,
            hook_engine,
            patch_engine,
            hooks: Vec::new(),
            patches: Vec::new(),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn hooks(&self) -> &[HookRecord] {
        &self.hooks
    }

    pub fn patches(&self) -> &[PatchRecord] {
        &self.patches
    }

    pub fn scanner(&self) -> &Scanner<L, M> {
        &self.scanner
    }

    /// The scanner used for registration, for plain address lookups.
    pub fn scanner_mut(&mut self) -> &mut Scanner<L, M> {
        &mut self.scanner
    }

    pub fn hook_engine(&self) -> &H {
        &self.hook_engine
    }

    pub fn patch_engine(&self) -> &P {
        &self.patch_engine
    }

    fn require_initialized(&self, operation: &str) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(diag!(
                SubsystemInitFailed,
                "{} called before the hook engine was initialized",
                operation
            ))
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(diag!(SubsystemInitFailed, "Hook engine is already initialized"));
        }
        self.hook_engine
            .initialize()
            .map_err(|e| diag!(SubsystemInitFailed, "Failed to initialize hook engine: {}", e))?;
        self.initialized = true;
        info!("Hook engine initialized");
        Ok(())
    }

    /// Queues a detour from the code at the pattern match plus `offset` to
    /// `destination`. Returns the trampoline for calling the original.
    pub fn hook(
        &mut self,
        pattern: &str,
        destination: u64,
        offset: i64,
        target: Target<'_>,
    ) -> Result<u64> {
        self.require_initialized("hook")?;

        let source = self
            .scanner
            .scan_module_offset(pattern, offset, target)
            .chain_err(|| {
                diag!(HookTargetNotFound, "Failed to locate function to hook: {}", pattern)
            })?;

        let trampoline = self
            .hook_engine
            .create_hook(source, destination)
            .map_err(|e| {
                diag!(HookInstallFailed, "Failed to hook function at 0x{:X}: {}", source, e)
            })?;

        debug!(
            "Queued hook 0x{:X} -> 0x{:X} (trampoline 0x{:X})",
            source, destination, trampoline
        );
        self.hooks.push(HookRecord {
            source,
            destination,
            trampoline,
            state: RecordState::Queued,
        });
        Ok(trampoline)
    }

    /// Queues `replacement` to be written at the pattern match plus
    /// `offset`. Returns the patched address.
    pub fn patch(
        &mut self,
        pattern: &str,
        replacement: &[u8],
        offset: i64,
        target: Target<'_>,
    ) -> Result<u64> {
        self.require_initialized("patch")?;

        let address = self
            .scanner
            .scan_module_offset(pattern, offset, target)
            .chain_err(|| {
                diag!(
                    PatchTargetNotFound,
                    "Failed to locate destination to write byte patch: {}",
                    pattern
                )
            })?;

        self.patch_engine
            .create_patch(address, replacement)
            .map_err(|e| {
                diag!(
                    PatchInstallFailed,
                    "Failed to create byte patch at 0x{:X}: {}",
                    address,
                    e
                )
            })?;

        debug!("Queued {} byte patch at 0x{:X}", replacement.len(), address);
        self.patches.push(PatchRecord {
            address,
            replacement: replacement.to_vec(),
            state: RecordState::Queued,
        });
        Ok(address)
    }

    /// [`Self::patch`] with the replacement given as hex bytes, e.g. `"90 90"`.
    pub fn patch_hex(
        &mut self,
        pattern: &str,
        replacement: &str,
        offset: i64,
        target: Target<'_>,
    ) -> Result<u64> {
        let bytes = parse_bytes(replacement)
            .chain_err(|| {
                diag!(PatchInstallFailed, "Invalid replacement bytes for pattern: {}", pattern)
            })?;
        self.patch(pattern, &bytes, offset, target)
    }

    /// Queues every patch entry of a signature set. Other entry kinds are
    /// skipped. Returns the number of patches queued.
    pub fn queue_signatures(&mut self, signatures: &SignatureSet) -> Result<usize> {
        let mut queued = 0;
        for entry in &signatures.entries {
            if let SignatureKind::Patch {
                replacement,
                offset,
            } = &entry.kind
            {
                self.patch_hex(&entry.pattern, replacement, *offset, entry.target())
                    .chain_err(|| {
                        diag!(PatchInstallFailed, "Failed to queue signature '{}'", entry.name)
                    })?;
                queued += 1;
            }
        }
        info!("Queued {} patches from signature set {}", queued, signatures.version);
        Ok(queued)
    }

    /// Enables queued hooks, then queued patches, each in registration
    /// order. Stops at the first failure; anything enabled before it stays
    /// enabled. Records already applied are skipped.
    pub fn apply(&mut self) -> Result<()> {
        self.require_initialized("apply")?;
        let (hooks, patches) = self.enable_queued()?;
        info!("Applied {} hooks and {} patches", hooks, patches);
        Ok(())
    }

    /// Enables queued hooks, then queued patches. Returns how many of each
    /// moved to applied.
    fn enable_queued(&mut self) -> Result<(usize, usize)> {
        let mut hooks = 0;
        for record in self.hooks.iter_mut().filter(|r| r.state == RecordState::Queued) {
            self.hook_engine.enable_hook(record.source).map_err(|e| {
                diag!(
                    SubsystemApplyFailed,
                    "Hook engine failed to enable hook at 0x{:X}: {}",
                    record.source,
                    e
                )
            })?;
            record.state = RecordState::Applied;
            hooks += 1;
        }

        let mut patches = 0;
        for record in self.patches.iter_mut().filter(|r| r.state == RecordState::Queued) {
            self.patch_engine.enable_patch(record.address).map_err(|e| {
                diag!(
                    SubsystemApplyFailed,
                    "Patch engine failed to enable patch at 0x{:X}: {}",
                    record.address,
                    e
                )
            })?;
            record.state = RecordState::Applied;
            patches += 1;
        }

        Ok((hooks, patches))
    }

    /// Disables every hook and patch and shuts the engines down. Engine
    /// failures are logged and otherwise ignored.
    pub fn unhook(&mut self) {
        if let Err(e) = self.hook_engine.disable_all() {
            warn!("Failed to disable hooks: {}", e);
        }
        if let Err(e) = self.patch_engine.disable_all() {
            warn!("Failed to restore byte patches: {}", e);
        }
        if let Err(e) = self.hook_engine.uninitialize() {
            warn!("Failed to uninitialize hook engine: {}", e);
        }
        self.patch_engine.release();

        info!(
            "Removed {} hooks and {} patches",
            self.hooks.len(),
            self.patches.len()
        );
        self.hooks.clear();
        self.patches.clear();
        self.initialized = false;
    }
}

#[cfg(target_os = "windows")]
mod local {
    use super::Instrumentation;
    use crate::instrument::{BytePatcher, MinHook, ProtectedWriter};
    use crate::memory::LocalProcess;
    use crate::scan::Scanner;

    /// Registry over the current process, MinHook and in-place patching.
    pub type LocalInstrumentation =
        Instrumentation<LocalProcess, MinHook, BytePatcher<ProtectedWriter>>;

    impl LocalInstrumentation {
        pub fn local() -> Self {
            Self::new(
                Scanner::new(LocalProcess),
                MinHook::new(),
                BytePatcher::new(ProtectedWriter),
            )
        }
    }
}

#[cfg(target_os = "windows")]
pub use local::LocalInstrumentation;
