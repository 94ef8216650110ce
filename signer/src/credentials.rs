//! Signing credentials resolved from the key directory.

use crate::error::{Result, SignerError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Location of the verification certificate below the key directory.
pub const VERIFY_CERT_PATH: &str = "db/db.pem";
/// Location of the signing certificate below the key directory.
pub const SIGN_CERT_PATH: &str = "db/db.children/db_child.pem";
/// Location of the signing private key below the key directory.
pub const SIGN_KEY_PATH: &str = "db/db.children/db_child.rsa";

/// The three credential files a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Certificate used by `sbverify`.
    VerificationCert,
    /// Certificate used by `sbsign`.
    SigningCert,
    /// Private key used by `sbsign`.
    SigningKey,
}

impl CredentialKind {
    /// Precondition check order.
    pub const ALL: [Self; 3] = [Self::VerificationCert, Self::SigningCert, Self::SigningKey];

    /// Path of this credential relative to the key directory.
    #[must_use]
    pub const fn relative_path(self) -> &'static str {
        match self {
            Self::VerificationCert => VERIFY_CERT_PATH,
            Self::SigningCert => SIGN_CERT_PATH,
            Self::SigningKey => SIGN_KEY_PATH,
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VerificationCert => "verification cert",
            Self::SigningCert => "signing cert",
            Self::SigningKey => "signing key",
        };
        f.write_str(label)
    }
}

/// Verification certificate, signing certificate, and signing key paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSet {
    verify_cert: Utf8PathBuf,
    sign_cert: Utf8PathBuf,
    priv_key: Utf8PathBuf,
}

impl CredentialSet {
    /// Computes the credential paths for `key_dir` without touching the
    /// filesystem.
    #[must_use]
    pub fn locate(key_dir: &Utf8Path) -> Self {
        Self {
            verify_cert: key_dir.join(VERIFY_CERT_PATH),
            sign_cert: key_dir.join(SIGN_CERT_PATH),
            priv_key: key_dir.join(SIGN_KEY_PATH),
        }
    }

    /// Locates the credentials and checks that each one is a regular file.
    ///
    /// Files are checked in [`CredentialKind::ALL`] order.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::MissingCredential`] for the first credential
    /// that does not exist as a regular file.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use uefi_signer::credentials::{CredentialKind, CredentialSet};
    /// use uefi_signer::error::SignerError;
    ///
    /// let err = CredentialSet::resolve(Utf8Path::new("/nonexistent/keys")).unwrap_err();
    /// assert!(matches!(
    ///     err,
    ///     SignerError::MissingCredential { kind: CredentialKind::VerificationCert, .. }
    /// ));
    /// ```
    pub fn resolve(key_dir: &Utf8Path) -> Result<Self> {
        let credentials = Self::locate(key_dir);
        for kind in CredentialKind::ALL {
            let path = credentials.path(kind);
            if !path.is_file() {
                return Err(SignerError::MissingCredential {
                    kind,
                    path: path.to_owned(),
                });
            }
        }
        Ok(credentials)
    }

    /// Returns the path of the given credential.
    #[must_use]
    pub fn path(&self, kind: CredentialKind) -> &Utf8Path {
        match kind {
            CredentialKind::VerificationCert => &self.verify_cert,
            CredentialKind::SigningCert => &self.sign_cert,
            CredentialKind::SigningKey => &self.priv_key,
        }
    }

    /// Certificate passed to `sbverify`.
    #[must_use]
    pub fn verify_cert(&self) -> &Utf8Path {
        &self.verify_cert
    }

    /// Certificate passed to `sbsign`.
    #[must_use]
    pub fn sign_cert(&self) -> &Utf8Path {
        &self.sign_cert
    }

    /// Private key passed to `sbsign`.
    #[must_use]
    pub fn priv_key(&self) -> &Utf8Path {
        &self.priv_key
    }
}
