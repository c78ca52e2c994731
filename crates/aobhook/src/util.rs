//! Host process helpers: where the injected module lives, what the host is
//! called, and how to tell the user about a fatal error when there is no
//! console.

use std::ffi::CString;
use std::path::Path;

#[cfg(target_os = "windows")]
pub use local::{
    current_module_name, current_module_path, process_name, show_error, wait_for_process,
};

/// File name without extension, e.g. `trainer` for `C:\mods\trainer.dll`.
pub fn module_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// `text` as a C string. Interior NULs would truncate the message, so they
/// become spaces.
pub fn message_text(text: &str) -> CString {
    let bytes: Vec<u8> = text
        .bytes()
        .map(|b| if b == 0 { b' ' } else { b })
        .collect();
    CString::new(bytes).unwrap_or_default()
}

#[cfg(target_os = "windows")]
mod local {
    use std::path::PathBuf;

    use tracing::debug;
    use windows::Win32::Foundation::{HMODULE, HWND};
    use windows::Win32::System::LibraryLoader::{
        GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
        GetModuleFileNameA, GetModuleHandleExA,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, INFINITE};
    use windows::Win32::UI::WindowsAndMessaging::{
        MB_ICONERROR, MB_OK, MB_SYSTEMMODAL, MessageBoxA, WaitForInputIdle,
    };
    use windows::core::PCSTR;

    use super::{message_text, module_stem};
    use crate::diag;
    use crate::error::{Diagnostic, Result};

    /// Any address inside this crate's code or data resolves to the module
    /// it was linked into.
    static MARKER: u8 = 0;

    const MAX_PATH_LEN: usize = 32 * 1024;

    fn module_file_name(module: HMODULE) -> Result<PathBuf> {
        let mut buffer = vec![0u8; 260];
        loop {
            // SAFETY: buffer is writable for its full length.
            let len = unsafe { GetModuleFileNameA(module, &mut buffer) } as usize;
            if len == 0 {
                return Err(diag!(
                    ModuleNotFound,
                    "GetModuleFileNameA failed: {}",
                    windows::core::Error::from_win32()
                ));
            }
            if len < buffer.len() {
                buffer.truncate(len);
                return Ok(PathBuf::from(String::from_utf8_lossy(&buffer).into_owned()));
            }
            if buffer.len() >= MAX_PATH_LEN {
                return Err(diag!(
                    ModuleNotFound,
                    "Module path longer than {} bytes",
                    MAX_PATH_LEN
                ));
            }
            buffer.resize(buffer.len() * 2, 0);
        }
    }

    /// Full path of the module this crate is linked into, e.g. the injected
    /// DLL rather than the host executable.
    pub fn current_module_path() -> Result<PathBuf> {
        let mut module = HMODULE::default();
        let flags =
            GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT;
        // SAFETY: MARKER is a static, so its address lies inside this module.
        unsafe { GetModuleHandleExA(flags, PCSTR(&MARKER as *const u8), &mut module) }
        .map_err(|e| diag!(ModuleNotFound, "Failed to find the current module: {}", e))?;
        module_file_name(module)
    }

    /// Current module file name without extension.
    pub fn current_module_name() -> Result<String> {
        let path = current_module_path()?;
        module_stem(&path).ok_or_else(|| {
            diag!(ModuleNotFound, "Module path {} has no file name", path.display())
        })
    }

    /// File name of the host executable, e.g. `game.exe`.
    pub fn process_name() -> Result<String> {
        let path = module_file_name(HMODULE::default())?;
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                diag!(ModuleNotFound, "Process path {} has no file name", path.display())
            })
    }

    /// Blocks until the host has finished initializing and is waiting for
    /// input. Returns immediately for hosts without a message loop.
    pub fn wait_for_process() {
        // SAFETY: the pseudo handle of the current process is always valid.
        let status = unsafe { WaitForInputIdle(GetCurrentProcess(), INFINITE) };
        if status != 0 {
            debug!("WaitForInputIdle returned 0x{:X}", status);
        }
    }

    /// Shows the rendered diagnostic in a modal error box titled with the
    /// current module name.
    pub fn show_error(diagnostic: &Diagnostic) {
        let title =
            current_module_name().unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());
        show_message(&diagnostic.render(), &title);
    }

    fn show_message(text: &str, title: &str) {
        let text = message_text(text);
        let title = message_text(title);
        // SAFETY: both strings are NUL-terminated and outlive the call.
        unsafe {
            MessageBoxA(
                HWND::default(),
                PCSTR(text.as_ptr().cast()),
                PCSTR(title.as_ptr().cast()),
                MB_OK | MB_ICONERROR | MB_SYSTEMMODAL,
            );
        }
    }

}
