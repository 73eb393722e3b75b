use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use cask_core::StoreError;
use tracing::debug;

/// Permissions for directories holding the credential file.
pub const OWNER_ONLY: u32 = 0o700;

#[cfg(windows)]
pub const FOLDER_NAME: &str = "cask$";
#[cfg(not(windows))]
pub const FOLDER_NAME: &str = ".cask";

#[cfg(windows)]
pub const FILE_NAME: &str = "zy2_no81a7cyz";
#[cfg(not(windows))]
pub const FILE_NAME: &str = ".zy2_no81a7cyz";

/// Platform folder lookup used to place the credential file.
pub trait FolderResolver: Send + Sync {
    fn home_directory(&self) -> Option<PathBuf>;

    /// Create `path` (and parents) if missing. `mode` is honoured on Unix.
    fn ensure_directory(&self, path: &Path, mode: u32) -> io::Result<()>;
}

/// Resolver backed by the running user's home directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFolders;

impl FolderResolver for SystemFolders {
    fn home_directory(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn ensure_directory(&self, path: &Path, mode: u32) -> io::Result<()> {
        create_private_dir(path, mode)
    }
}

/// `<home>/<FOLDER_NAME>/<FILE_NAME>`, creating the folder owner-only if absent.
pub fn default_store_path(resolver: &dyn FolderResolver) -> Result<PathBuf, StoreError> {
    let home = resolver
        .home_directory()
        .ok_or_else(|| StoreError::Configuration {
            reason: "no home directory available".to_string(),
        })?;

    let folder = home.join(FOLDER_NAME);
    resolver
        .ensure_directory(&folder, OWNER_ONLY)
        .map_err(|e| StoreError::Configuration {
            reason: format!("cannot create {}: {e}", folder.display()),
        })?;

    debug!(?folder, "resolved credential folder");
    Ok(folder.join(FILE_NAME))
}

/// Create a directory tree with restricted permissions. Existing directories are left alone.
pub fn create_private_dir(path: &Path, mode: u32) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

/// Flush a directory entry so a rename into it survives a crash. No-op off Unix.
pub fn sync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    fs::File::open(path)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
