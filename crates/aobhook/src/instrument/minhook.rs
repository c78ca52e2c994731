//! MinHook-backed [`HookEngine`].

use std::ffi::c_void;
use std::ptr;

use minhook_sys::{
    MH_CreateHook, MH_DisableHook, MH_EnableHook, MH_Initialize, MH_OK, MH_RemoveHook,
    MH_Uninitialize,
};

use crate::instrument::{EngineError, EngineResult, HookEngine};

/// Process-wide MinHook instance. MinHook keeps global state, so only one
/// registry should drive it at a time.
#[derive(Debug, Default)]
pub struct MinHook {
    created: Vec<u64>,
}

impl MinHook {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check(status: i32) -> EngineResult<()> {
    if status == MH_OK {
        Ok(())
    } else {
        Err(EngineError::Status {
            engine: "MinHook",
            status,
        })
    }
}

impl HookEngine for MinHook {
    fn initialize(&mut self) -> EngineResult<()> {
        // SAFETY: no preconditions.
        check(unsafe { MH_Initialize() })
    }

    fn create_hook(&mut self, source: u64, destination: u64) -> EngineResult<u64> {
        let mut original = ptr::null_mut::<c_void>();
        // SAFETY: source was resolved inside a loaded image and destination
        // is supplied by the caller as a function with a matching signature.
        check(unsafe {
            MH_CreateHook(
                source as usize as *mut c_void,
                destination as usize as *mut c_void,
                &mut original,
            )
        })?;
        self.created.push(source);
        Ok(original as usize as u64)
    }

    fn enable_hook(&mut self, source: u64) -> EngineResult<()> {
        // SAFETY: MinHook validates that a hook exists for source.
        check(unsafe { MH_EnableHook(source as usize as *mut c_void) })
    }

    fn disable_hook(&mut self, source: u64) -> EngineResult<()> {
        // SAFETY: as for enable_hook.
        check(unsafe { MH_DisableHook(source as usize as *mut c_void) })
    }

    fn disable_all(&mut self) -> EngineResult<()> {
        // SAFETY: a null target means every hook.
        check(unsafe { MH_DisableHook(ptr::null_mut()) })
    }

    fn uninitialize(&mut self) -> EngineResult<()> {
        let mut first_error = None;
        for source in self.created.drain(..) {
            // SAFETY: as for enable_hook.
            if let Err(e) = check(unsafe { MH_RemoveHook(source as usize as *mut c_void) }) {
                first_error.get_or_insert(e);
            }
        }
        // SAFETY: no preconditions.
        check(unsafe { MH_Uninitialize() })?;
        first_error.map_or(Ok(()), Err)
    }
}
