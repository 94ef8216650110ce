//! Error types for the UEFI signing pipeline.
//!
//! Only conditions that must stop a run are represented here. Tolerated
//! outcomes (a missing `.sbat` section, an artefact without a prior
//! signature) and recoverable ones (a failed `sbsign` call) are handled
//! where they occur and never surface as a [`SignerError`].

use crate::credentials::CredentialKind;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that abort a signing run.
#[derive(Debug, Error)]
pub enum SignerError {
    /// A credential file is absent from the key directory.
    #[error("No {kind}: {path}")]
    MissingCredential {
        /// Which credential is missing.
        kind: CredentialKind,
        /// Path where the credential was expected.
        path: Utf8PathBuf,
    },

    /// A required external tool could not be found on `PATH`.
    #[error("Cannot sign UEFI binaries ({tool} not found)")]
    ToolNotFound {
        /// Program name of the missing tool.
        tool: String,
    },

    /// A freshly installed artefact failed signature verification.
    #[error("Verification failed for {artifact}: {message}")]
    VerificationFailed {
        /// Artefact whose signature did not verify.
        artifact: Utf8PathBuf,
        /// Tool output or spawn error describing the failure.
        message: String,
    },

    /// The signed copy could not be copied back over the artefact.
    #[error("failed to install signed copy of {artifact}: {message}")]
    InstallFailed {
        /// Artefact that could not be replaced.
        artifact: Utf8PathBuf,
        /// Tool output or spawn error describing the failure.
        message: String,
    },

    /// Replacing the `.vbpubk` section failed.
    #[error("vbpubk injection into {artifact} failed during {step}: {message}")]
    InjectionFailed {
        /// Artefact being updated.
        artifact: Utf8PathBuf,
        /// The step that failed (`update-section` or `copy`).
        step: &'static str,
        /// Tool output or spawn error describing the failure.
        message: String,
    },

    /// The bootloader glob supplied on the command line is malformed.
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob {
        /// The rejected pattern.
        pattern: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// An artefact path has no usable file name component.
    #[error("artefact path {path} has no file name")]
    InvalidArtifactPath {
        /// The offending path.
        path: Utf8PathBuf,
    },

    /// A filesystem path is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`SignerError`].
pub type Result<T> = std::result::Result<T, SignerError>;
