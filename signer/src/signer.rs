//! The per-file sign/verify protocol.
//!
//! Each artefact goes through four steps:
//!
//! 1. strip any existing signature in place (failure ignored),
//! 2. sign into the workspace (failure skips this artefact),
//! 3. copy the signed file back over the artefact (failure is fatal),
//! 4. verify the installed file (failure is fatal).
//!
//! Step 1 runs before step 2 can fail, so an artefact whose signing fails
//! is left unsigned even if it carried a valid signature before the run.

use crate::credentials::CredentialSet;
use crate::error::{Result, SignerError};
use crate::exec::check;
use crate::locator::artifact_file_name;
use crate::tools::Tools;
use crate::workspace::Workspace;
use camino::Utf8Path;
use log::{debug, info, warn};

/// Result of a non-fatal signing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    /// The artefact was signed, installed, and verified.
    Signed,
    /// `sbsign` failed; the artefact was left as is.
    Skipped,
}

/// Signs artefacts with one set of credentials and one workspace.
pub struct Signer<'a> {
    tools: Tools<'a>,
    credentials: CredentialSet,
    workspace: Workspace,
}

impl<'a> Signer<'a> {
    /// Creates a signer that owns `workspace` for its lifetime.
    #[must_use]
    pub fn new(tools: Tools<'a>, credentials: CredentialSet, workspace: Workspace) -> Self {
        Self {
            tools,
            credentials,
            workspace,
        }
    }

    /// The tools this signer runs.
    #[must_use]
    pub fn tools(&self) -> &Tools<'a> {
        &self.tools
    }

    /// The workspace directory.
    #[must_use]
    pub fn workspace(&self) -> &Utf8Path {
        self.workspace.path()
    }

    /// Signs `target` in place.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::InstallFailed`] if the signed copy cannot be
    /// copied back and [`SignerError::VerificationFailed`] if the installed
    /// file does not verify. Both must stop the run.
    pub fn sign_efi_file(&self, target: &Utf8Path) -> Result<SignOutcome> {
        info!("signing efi file {target}");
        let signed_file = self.workspace.file(artifact_file_name(target)?);

        // May fail when there is no current signature.
        if let Err(message) = check(self.tools.strip_signature(target)) {
            debug!("no signature removed from {target}: {message}");
        }

        if let Err(message) = check(self.tools.sign(
            self.credentials.priv_key(),
            self.credentials.sign_cert(),
            &signed_file,
            target,
        )) {
            warn!("cannot sign {target}");
            debug!("sbsign: {message}");
            return Ok(SignOutcome::Skipped);
        }

        check(self.tools.privileged_copy(&signed_file, target, true)).map_err(|message| {
            SignerError::InstallFailed {
                artifact: target.to_owned(),
                message,
            }
        })?;

        check(self.tools.verify(self.credentials.verify_cert(), target)).map_err(|message| {
            SignerError::VerificationFailed {
                artifact: target.to_owned(),
                message,
            }
        })?;

        Ok(SignOutcome::Signed)
    }

    /// Releases the workspace, reporting cleanup failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be removed.
    pub fn finish(self) -> Result<()> {
        self.workspace.close()
    }
}

#[cfg(test)]
#[path = "signer_tests.rs"]
mod tests;
