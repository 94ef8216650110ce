//! Scoped temporary workspace for signed copies and extracted sections.
//!
//! The directory lives exactly as long as its [`Workspace`] value. Dropping
//! the value removes it, so an early return through `?` still cleans up.

use crate::error::{Result, SignerError};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "sign-uefi-";

/// A temporary directory owned by one signing run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    path: Utf8PathBuf,
}

impl Workspace {
    /// Creates a fresh workspace in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or its path is
    /// not valid UTF-8.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()?;
        Self::from_temp_dir(dir)
    }

    /// Creates a workspace below `parent` instead of the system default.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or its path is
    /// not valid UTF-8.
    pub fn new_in(parent: &Utf8Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)?;
        Self::from_temp_dir(dir)
    }

    fn from_temp_dir(dir: TempDir) -> Result<Self> {
        let path = Utf8PathBuf::try_from(dir.path().to_owned()).map_err(|e| {
            SignerError::NonUtf8Path {
                path: e.into_path_buf().display().to_string(),
            }
        })?;
        debug!("created workspace {path}");
        Ok(Self { dir, path })
    }

    /// Returns the workspace directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the path of `name` inside the workspace.
    #[must_use]
    pub fn file(&self, name: &str) -> Utf8PathBuf {
        self.path.join(name)
    }

    /// Removes the workspace, reporting any cleanup failure.
    ///
    /// Dropping the workspace also removes it but silently ignores errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> Result<()> {
        debug!("removing workspace {}", self.path);
        self.dir.close().map_err(SignerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_dir() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("failed to create temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        (temp, path)
    }

    #[test]
    fn workspace_is_created_with_prefix() {
        let (_temp, parent) = parent_dir();
        let workspace = Workspace::new_in(&parent).expect("workspace should be created");

        assert!(workspace.path().is_dir());
        assert!(
            workspace
                .path()
                .file_name()
                .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX))
        );
        assert_eq!(workspace.file("sbat.csv"), workspace.path().join("sbat.csv"));
    }

    #[test]
    fn dropping_workspace_removes_contents() {
        let (_temp, parent) = parent_dir();
        let workspace = Workspace::new_in(&parent).expect("workspace should be created");
        let path = workspace.path().to_owned();
        std::fs::write(workspace.file("bootx64.efi"), b"signed").expect("write should succeed");

        drop(workspace);

        assert!(!path.exists());
    }

    #[test]
    fn close_removes_directory() {
        let (_temp, parent) = parent_dir();
        let workspace = Workspace::new_in(&parent).expect("workspace should be created");
        let path = workspace.path().to_owned();

        workspace.close().expect("close should succeed");

        assert!(!path.exists());
    }
}
