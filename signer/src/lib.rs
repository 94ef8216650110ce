//! UEFI signer library.
//!
//! This crate signs the UEFI executables and kernels of a boot directory
//! with `sbsign`, installs the signed copies in place, and checks them with
//! `sbverify`. Builds of the crdyboot bootloader additionally get their
//! embedded `.vbpubk` key replaced before signing. It is used by the
//! `sign-uefi` CLI binary and can be driven programmatically with
//! substitute executors for testing.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`credentials`] - Signing key and certificate resolution
//! - [`error`] - Semantic error types
//! - [`exec`] - External command execution abstraction
//! - [`inject`] - `.vbpubk` section replacement for crdyboot builds
//! - [`locator`] - Artefact discovery below a boot directory
//! - [`logging`] - Log level selection and logger setup
//! - [`pipeline`] - Signing run orchestration
//! - [`sbat`] - SBAT section extraction and crdyboot detection
//! - [`signer`] - Per-file strip, sign, install, verify protocol
//! - [`tools`] - Command lines for `objcopy` and the sbsigntools
//! - [`workspace`] - Scratch directory for intermediate files

pub mod cli;
pub mod credentials;
pub mod error;
pub mod exec;
pub mod inject;
pub mod locator;
pub mod logging;
pub mod pipeline;
pub mod sbat;
pub mod signer;
pub mod tools;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
