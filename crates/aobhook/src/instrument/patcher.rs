//! Byte patch engine.

use tracing::debug;

use crate::instrument::{EngineError, EngineResult, PatchEngine};
use crate::memory::{MappedImage, ReadMemory};

/// Raw byte access for patch targets.
pub trait WriteMemory {
    fn read(&self, address: u64, len: usize) -> EngineResult<Vec<u8>>;

    fn write(&mut self, address: u64, data: &[u8]) -> EngineResult<()>;
}

impl WriteMemory for MappedImage {
    fn read(&self, address: u64, len: usize) -> EngineResult<Vec<u8>> {
        self.read_bytes(address, len).map_err(|e| EngineError::Memory {
            address,
            message: e.message().to_string(),
        })
    }

    fn write(&mut self, address: u64, data: &[u8]) -> EngineResult<()> {
        MappedImage::write(self, address, data).map_err(|e| EngineError::Memory {
            address,
            message: e.message().to_string(),
        })
    }
}

#[derive(Debug)]
struct PatchSlot {
    address: u64,
    replacement: Vec<u8>,
    original: Vec<u8>,
    enabled: bool,
}

/// [`PatchEngine`] that keeps the original bytes of every patch so it can
/// restore them.
#[derive(Debug)]
pub struct BytePatcher<W> {
    memory: W,
    slots: Vec<PatchSlot>,
}

impl<W: WriteMemory> BytePatcher<W> {
    pub fn new(memory: W) -> Self {
        Self {
            memory,
            slots: Vec::new(),
        }
    }

    pub fn memory(&self) -> &W {
        &self.memory
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_enabled(&self, address: u64) -> bool {
        self.slot(address).is_some_and(|slot| slot.enabled)
    }

    /// Bytes captured when the patch at `address` was created.
    pub fn original(&self, address: u64) -> Option<&[u8]> {
        self.slot(address).map(|slot| slot.original.as_slice())
    }

    fn slot(&self, address: u64) -> Option<&PatchSlot> {
        self.slots.iter().find(|slot| slot.address == address)
    }

    fn slot_index(&self, address: u64) -> EngineResult<usize> {
        self.slots
            .iter()
            .position(|slot| slot.address == address)
            .ok_or(EngineError::NotCreated(address))
    }

    fn restore(&mut self, index: usize) -> EngineResult<()> {
        let slot = &mut self.slots[index];
        if slot.enabled {
            self.memory.write(slot.address, &slot.original)?;
            slot.enabled = false;
            debug!("Restored {} bytes at 0x{:X}", slot.original.len(), slot.address);
        }
        Ok(())
    }
}

impl<W: WriteMemory> PatchEngine for BytePatcher<W> {
    fn create_patch(&mut self, address: u64, replacement: &[u8]) -> EngineResult<()> {
        if replacement.is_empty() {
            return Err(EngineError::EmptyPatch);
        }
        if self.slot(address).is_some() {
            return Err(EngineError::AlreadyCreated(address));
        }

        let original = self.memory.read(address, replacement.len())?;
        self.slots.push(PatchSlot {
            address,
            replacement: replacement.to_vec(),
            original,
            enabled: false,
        });
        Ok(())
    }

    fn enable_patch(&mut self, address: u64) -> EngineResult<()> {
        let index = self.slot_index(address)?;
        let slot = &mut self.slots[index];
        if !slot.enabled {
            self.memory.write(slot.address, &slot.replacement)?;
            slot.enabled = true;
            debug!("Wrote {} bytes at 0x{:X}", slot.replacement.len(), slot.address);
        }
        Ok(())
    }

    fn disable_patch(&mut self, address: u64) -> EngineResult<()> {
        let index = self.slot_index(address)?;
        self.restore(index)
    }

    /// Restores in reverse creation order so overlapping patches unwind
    /// cleanly. Keeps going after a failure and reports the first one.
    fn disable_all(&mut self) -> EngineResult<()> {
        let mut first_error = None;
        for index in (0..self.slots.len()).rev() {
            if let Err(e) = self.restore(index) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn release(&mut self) {
        self.slots.clear();
    }
}

#[cfg(target_os = "windows")]
pub use protected::ProtectedWriter;

#[cfg(target_os = "windows")]
mod protected {
    use std::ffi::c_void;

    use windows::Win32::System::Diagnostics::Debug::FlushInstructionCache;
    use windows::Win32::System::Memory::{
        PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS, VirtualProtect,
    };
    use windows::Win32::System::Threading::GetCurrentProcess;

    use tracing::warn;

    use super::WriteMemory;
    use crate::instrument::{EngineError, EngineResult};

    /// Writes into the current process's code pages, lifting page protection
    /// for the duration of each write.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ProtectedWriter;

    fn memory_error(address: u64, e: windows::core::Error) -> EngineError {
        EngineError::Memory {
            address,
            message: e.to_string(),
        }
    }

    impl WriteMemory for ProtectedWriter {
        fn read(&self, address: u64, len: usize) -> EngineResult<Vec<u8>> {
            if address == 0 {
                return Err(EngineError::Memory {
                    address,
                    message: "null address".to_string(),
                });
            }
            // SAFETY: patch targets are scan results inside a loaded image.
            let bytes =
                unsafe { std::slice::from_raw_parts(address as usize as *const u8, len) };
            Ok(bytes.to_vec())
        }

        /// Once the bytes are copied the write counts as done. Failing to
        /// restore the protection or flush the cache afterwards is logged.
        fn write(&mut self, address: u64, data: &[u8]) -> EngineResult<()> {
            let target = address as usize as *mut c_void;
            let len = data.len();
            let mut old = PAGE_PROTECTION_FLAGS::default();

            // SAFETY: target spans len bytes of a loaded image; the original
            // protection is restored before returning.
            unsafe {
                VirtualProtect(target, len, PAGE_EXECUTE_READWRITE, &mut old)
                    .map_err(|e| memory_error(address, e))?;
                std::ptr::copy_nonoverlapping(data.as_ptr(), target.cast::<u8>(), len);

                let mut unused = PAGE_PROTECTION_FLAGS::default();
                if let Err(e) = VirtualProtect(target, len, old, &mut unused) {
                    warn!("Failed to restore page protection at 0x{:X}: {}", address, e);
                }
                if let Err(e) =
                    FlushInstructionCache(GetCurrentProcess(), Some(target.cast_const()), len)
                {
                    warn!("Failed to flush instruction cache at 0x{:X}: {}", address, e);
                }
            }
            Ok(())
        }
    }

}
