//! Images loaded into the current process.
//!
//! This is the only place that turns addresses back into pointers for
//! reading. Regions handed to [`ReadMemory::view`] come from the loader's own
//! section tables, so they are mapped for as long as the module stays loaded.

use std::ffi::CString;

use windows::Win32::System::LibraryLoader::GetModuleHandleA;
use windows::Win32::System::ProcessStatus::{GetModuleInformation, MODULEINFO};
use windows::Win32::System::Threading::GetCurrentProcess;
use windows::core::PCSTR;

use crate::diag;
use crate::error::Result;
use crate::memory::ReadMemory;
use crate::module::{ImageLoader, ModuleHandle, module_label};

/// The process this code is running in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcess;

impl ReadMemory for LocalProcess {
    fn view(&self, address: u64, len: usize) -> Result<&[u8]> {
        if address == 0 {
            return Err(diag!(MemoryAccess, "Attempted to read 0x{:X} bytes at null", len));
        }
        // SAFETY: callers only pass ranges taken from a loaded image's
        // headers or section table, which stay mapped while the module is
        // loaded.
        Ok(unsafe { std::slice::from_raw_parts(address as usize as *const u8, len) })
    }
}

impl ImageLoader for LocalProcess {
    fn module_handle(&self, name: Option<&str>) -> Result<ModuleHandle> {
        let c_name = name
            .map(CString::new)
            .transpose()
            .map_err(|e| diag!(ModuleNotFound, "Invalid module name {:?}: {}", name, e))?;
        let name_ptr = c_name
            .as_ref()
            .map_or(PCSTR::null(), |c| PCSTR(c.as_ptr().cast()));

        // SAFETY: name_ptr is null or a NUL-terminated string that outlives the call.
        let module = unsafe { GetModuleHandleA(name_ptr) }.map_err(|e| {
            diag!(
                ModuleNotFound,
                "GetModuleHandleA failed for module {}: {}",
                module_label(name),
                e
            )
        })?;

        let mut info = MODULEINFO::default();
        // SAFETY: info is a valid out pointer of the size passed.
        unsafe {
            GetModuleInformation(
                GetCurrentProcess(),
                module,
                &mut info,
                std::mem::size_of::<MODULEINFO>() as u32,
            )
        }
        .map_err(|e| {
            diag!(
                ModuleNotFound,
                "GetModuleInformation failed for module {}: {}",
                module_label(name),
                e
            )
        })?;

        Ok(ModuleHandle::from_base(info.lpBaseOfDll as usize as u64))
    }
}
