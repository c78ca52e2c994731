//! File logging for hosts without a console.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::diag;
use crate::error::Result;

/// Installs a global subscriber that writes to `path`, truncating it.
///
/// `default_directive` (e.g. `"aobhook=debug"`) is added on top of
/// `RUST_LOG`. Fails if the file cannot be created or a subscriber is
/// already installed.
pub fn init_file<P: AsRef<Path>>(path: P, default_directive: &str) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| diag!(Io, "Failed to create log file {}: {}", path.display(), e))?;
    let directive = default_directive
        .parse()
        .map_err(|e| diag!(Io, "Invalid log directive '{}': {}", default_directive, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| diag!(Io, "Failed to install log subscriber: {}", e))
}

/// `<module>.log` next to the module file, e.g. `C:\mods\trainer.dll`
/// becomes `C:\mods\trainer.log`.
pub fn log_path_beside<P: AsRef<Path>>(module: P) -> PathBuf {
    module.as_ref().with_extension("log")
}

/// [`init_file`] writing to `<module>.log` beside the module this crate is
/// linked into. Returns the log path.
#[cfg(target_os = "windows")]
pub fn init_beside_module(default_directive: &str) -> Result<PathBuf> {
    let path = log_path_beside(crate::util::current_module_path()?);
    init_file(&path, default_directive)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_beside() {
        assert_eq!(log_path_beside("mods/trainer.dll"), PathBuf::from("mods/trainer.log"));
        assert_eq!(log_path_beside("trainer"), PathBuf::from("trainer.log"));
    }

    #[test]
    fn test_init_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let err = init_file(dir.path().join("missing/dir/out.log"), "aobhook=info").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);

        let err = init_file(dir.path().join("out.log"), "aobhook=notalevel").unwrap_err();
        assert!(err.message().contains("notalevel"));
    }

    #[test]
    fn test_init_file_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");

        init_file(&path, "aobhook=info").unwrap();
        tracing::info!("written to file");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("written to file"));
    }
}
