//! Artefact discovery below a boot directory.
//!
//! A boot directory is either the root of an EFI system partition or
//! `/boot` of a root filesystem. Both share the same layout:
//!
//! ```text
//! <target>/efi/boot/<efi_glob>   bootloaders
//! <target>/syslinux/vmlinuz.?    syslinux kernels
//! <target>/vmlinuz               root kernel (usually a symlink)
//! ```

use crate::error::{Result, SignerError};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::fmt;

/// Bootloader directory relative to the boot directory.
pub const BOOTLOADER_SUBDIR: &str = "efi/boot";
/// Syslinux directory relative to the boot directory.
pub const SYSLINUX_SUBDIR: &str = "syslinux";
/// Root kernel link relative to the boot directory.
pub const ROOT_KERNEL_NAME: &str = "vmlinuz";
/// Pattern selecting syslinux kernels.
pub const SYSLINUX_KERNEL_PATTERN: &str = "vmlinuz.?";

/// Which part of the boot directory an artefact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactGroup {
    /// Matched the caller's bootloader glob.
    Bootloader,
    /// A crdyboot candidate name in the bootloader directory.
    Crdyboot,
    /// A syslinux kernel.
    SyslinuxKernel,
    /// The kernel `vmlinuz` resolves to.
    RootKernel,
}

impl fmt::Display for ArtifactGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bootloader => "bootloader",
            Self::Crdyboot => "crdyboot",
            Self::SyslinuxKernel => "syslinux kernel",
            Self::RootKernel => "root kernel",
        };
        f.write_str(label)
    }
}

/// A file selected for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path of the file.
    pub path: Utf8PathBuf,
    /// Group the file was discovered in.
    pub group: ArtifactGroup,
}

impl Artifact {
    /// Creates an artefact record.
    #[must_use]
    pub fn new(path: Utf8PathBuf, group: ArtifactGroup) -> Self {
        Self { path, group }
    }
}

/// Returns the final path component of an artefact.
///
/// # Errors
///
/// Returns [`SignerError::InvalidArtifactPath`] if the path ends in `..` or
/// is a filesystem root.
pub fn artifact_file_name(path: &Utf8Path) -> Result<&str> {
    path.file_name()
        .ok_or_else(|| SignerError::InvalidArtifactPath {
            path: path.to_owned(),
        })
}

/// A validated glob pattern evaluated relative to a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactGlob {
    pattern: String,
}

impl ArtifactGlob {
    /// Validates `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::InvalidGlob`] if the pattern cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use uefi_signer::locator::ArtifactGlob;
    ///
    /// assert!(ArtifactGlob::new("*.efi").is_ok());
    /// assert!(ArtifactGlob::new("[.efi").is_err());
    /// ```
    pub fn new(pattern: &str) -> Result<Self> {
        glob::Pattern::new(pattern).map_err(|e| SignerError::InvalidGlob {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_owned(),
        })
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Returns the regular files below `dir` matching this pattern, sorted
    /// by path.
    ///
    /// A missing `dir` yields no matches. Entries that cannot be read or
    /// whose names are not UTF-8 are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::InvalidGlob`] if the joined pattern cannot be
    /// parsed.
    pub fn matching_files(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
        let full = format!("{}/{}", glob::Pattern::escape(dir.as_str()), self.pattern);
        let entries = glob::glob(&full).map_err(|e| SignerError::InvalidGlob {
            pattern: full.clone(),
            reason: e.to_string(),
        })?;

        let mut files: Vec<Utf8PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => match Utf8PathBuf::try_from(path) {
                    Ok(utf8) => Some(utf8),
                    Err(e) => {
                        warn!("skipping non-UTF-8 path {}", e.as_path().display());
                        None
                    }
                },
                Err(e) => {
                    warn!("skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

impl fmt::Display for ArtifactGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Paths consumed below a boot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootLayout {
    target_dir: Utf8PathBuf,
}

impl BootLayout {
    /// Creates a layout rooted at `target_dir`.
    #[must_use]
    pub fn new(target_dir: &Utf8Path) -> Self {
        Self {
            target_dir: target_dir.to_owned(),
        }
    }

    /// `<target>/efi/boot`
    #[must_use]
    pub fn bootloader_dir(&self) -> Utf8PathBuf {
        self.target_dir.join(BOOTLOADER_SUBDIR)
    }

    /// `<target>/syslinux`
    #[must_use]
    pub fn syslinux_dir(&self) -> Utf8PathBuf {
        self.target_dir.join(SYSLINUX_SUBDIR)
    }

    /// `<target>/vmlinuz`, before symlink resolution.
    #[must_use]
    pub fn root_kernel_link(&self) -> Utf8PathBuf {
        self.target_dir.join(ROOT_KERNEL_NAME)
    }

    /// Bootloaders matching `glob`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the glob cannot be evaluated.
    pub fn bootloaders(&self, glob: &ArtifactGlob) -> Result<Vec<Artifact>> {
        Ok(glob
            .matching_files(&self.bootloader_dir())?
            .into_iter()
            .map(|path| Artifact::new(path, ArtifactGroup::Bootloader))
            .collect())
    }

    /// Crdyboot candidates present as regular files, in `names` order.
    #[must_use]
    pub fn crdyboot_candidates(&self, names: &[String]) -> Vec<Artifact> {
        let dir = self.bootloader_dir();
        names
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| {
                let present = path.is_file();
                if !present {
                    debug!("crdyboot candidate {path} not present");
                }
                present
            })
            .map(|path| Artifact::new(path, ArtifactGroup::Crdyboot))
            .collect()
    }

    /// Syslinux kernels matching `glob`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the glob cannot be evaluated.
    pub fn syslinux_kernels(&self, glob: &ArtifactGlob) -> Result<Vec<Artifact>> {
        Ok(glob
            .matching_files(&self.syslinux_dir())?
            .into_iter()
            .map(|path| Artifact::new(path, ArtifactGroup::SyslinuxKernel))
            .collect())
    }

    /// The file `vmlinuz` resolves to, if it resolves to a regular file.
    #[must_use]
    pub fn root_kernel(&self) -> Option<Artifact> {
        let link = self.root_kernel_link();
        let resolved = match link.canonicalize_utf8() {
            Ok(path) => path,
            Err(e) => {
                debug!("root kernel {link} not resolvable: {e}");
                return None;
            }
        };
        resolved
            .is_file()
            .then(|| Artifact::new(resolved, ArtifactGroup::RootKernel))
    }
}
