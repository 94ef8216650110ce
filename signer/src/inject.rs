//! Replacement of the embedded `.vbpubk` key in crdyboot builds.
//!
//! crdyboot ships with a development kernel subkey in its `.vbpubk`
//! section. Before signing, that section is overwritten with the real
//! kernel subkey from the key directory. Unlike SBAT extraction, every
//! failure here is fatal: signing a half-updated binary would produce a
//! valid signature over the wrong key.

use crate::error::{Result, SignerError};
use crate::exec::check;
use crate::locator::artifact_file_name;
use crate::tools::Tools;
use camino::{Utf8Path, Utf8PathBuf};
use log::info;

/// Section holding the embedded public key.
pub const VBPUBK_SECTION: &str = ".vbpubk";
/// Location of the trusted key relative to the UEFI key directory.
pub const VBPUBK_RELATIVE_PATH: &str = "../kernel_subkey.vbpubk";

/// Trusted kernel subkey injected into crdyboot builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbpubkPayload {
    path: Utf8PathBuf,
}

impl VbpubkPayload {
    /// Locates the payload for the given UEFI key directory.
    ///
    /// The path is joined, not normalised, so `key_dir` may itself be a
    /// symlink.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use uefi_signer::inject::VbpubkPayload;
    ///
    /// let payload = VbpubkPayload::locate(Utf8Path::new("/keys/uefi"));
    /// assert_eq!(payload.path().as_str(), "/keys/uefi/../kernel_subkey.vbpubk");
    /// ```
    #[must_use]
    pub fn locate(key_dir: &Utf8Path) -> Self {
        Self {
            path: key_dir.join(VBPUBK_RELATIVE_PATH),
        }
    }

    /// Path of the key material.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Overwrites the `.vbpubk` section of `artifact` with the trusted key.
///
/// The updated binary is written to `<workspace>/<name>.injected` and then
/// copied over `artifact` with `sudo cp`.
///
/// # Errors
///
/// Returns [`SignerError::InjectionFailed`] if either the section update or
/// the copy fails.
pub fn inject_vbpubk(
    tools: &Tools<'_>,
    artifact: &Utf8Path,
    key_dir: &Utf8Path,
    workspace: &Utf8Path,
) -> Result<()> {
    let name = artifact_file_name(artifact)?;
    let injected = workspace.join(format!("{name}.injected"));
    let payload = VbpubkPayload::locate(key_dir);

    info!("adding new section {VBPUBK_SECTION} to {name}");
    check(tools.update_section(artifact, VBPUBK_SECTION, payload.path(), &injected))
        .map_err(|message| injection_failed(artifact, "update-section", message))?;

    check(tools.privileged_copy(&injected, artifact, false))
        .map_err(|message| injection_failed(artifact, "copy", message))
}

fn injection_failed(artifact: &Utf8Path, step: &'static str, message: String) -> SignerError {
    SignerError::InjectionFailed {
        artifact: artifact.to_owned(),
        step,
        message,
    }
}
