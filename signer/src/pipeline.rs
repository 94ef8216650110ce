//! Signing pipeline orchestration.
//!
//! A run walks the boot directory in a fixed order and hands each artefact
//! to an [`ArtifactOps`] implementation:
//!
//! 1. bootloaders matching the caller's glob (sorted),
//! 2. crdyboot candidates, in list order, that classify as crdyboot: these
//!    get their `.vbpubk` section replaced before signing,
//! 3. syslinux kernels (sorted),
//! 4. the root kernel.
//!
//! The first fatal error stops the run; nothing after it is touched.

use crate::credentials::CredentialSet;
use crate::error::Result;
use crate::exec::CommandExecutor;
use crate::inject::inject_vbpubk;
use crate::locator::{Artifact, ArtifactGlob, BootLayout, SYSLINUX_KERNEL_PATTERN};
use crate::sbat::is_crdyboot_file;
use crate::signer::{SignOutcome, Signer};
use crate::tools::{ToolNames, Tools};
use crate::workspace::Workspace;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

/// File names crdyboot may be installed under.
pub const CRDYBOOT_FILE_NAMES: [&str; 4] = [
    // First-stage boot loader.
    "bootia32.efi",
    "bootx64.efi",
    // Second-stage boot loader.
    "crdybootia32.efi",
    "crdybootx64.efi",
];

/// Per-artefact operations the orchestrator sequences.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactOps {
    /// Returns true if `artifact` is a crdyboot build.
    fn is_crdyboot_file(&self, artifact: &Utf8Path) -> bool;

    /// Replaces the embedded `.vbpubk` key of `artifact`.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn inject_vbpubk(&self, artifact: &Utf8Path) -> Result<()>;

    /// Signs `artifact` in place.
    ///
    /// # Errors
    ///
    /// Any error aborts the run; recoverable failures are reported as
    /// [`SignOutcome::Skipped`].
    fn sign_efi_file(&self, artifact: &Utf8Path) -> Result<SignOutcome>;
}

/// What to select from the boot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPlan {
    efi_glob: ArtifactGlob,
    syslinux_glob: ArtifactGlob,
    crdyboot_candidates: Vec<String>,
}

impl SigningPlan {
    /// Creates the default plan for the given bootloader glob.
    ///
    /// # Errors
    ///
    /// Returns an error if `efi_glob` is not a valid pattern.
    ///
    /// # Examples
    ///
    /// ```
    /// use uefi_signer::pipeline::{CRDYBOOT_FILE_NAMES, SigningPlan};
    ///
    /// let plan = SigningPlan::new("*.efi")?;
    /// assert_eq!(plan.efi_glob().as_str(), "*.efi");
    /// assert_eq!(plan.crdyboot_candidates(), CRDYBOOT_FILE_NAMES);
    /// # Ok::<(), uefi_signer::error::SignerError>(())
    /// ```
    pub fn new(efi_glob: &str) -> Result<Self> {
        Ok(Self {
            efi_glob: ArtifactGlob::new(efi_glob)?,
            syslinux_glob: ArtifactGlob::new(SYSLINUX_KERNEL_PATTERN)?,
            crdyboot_candidates: CRDYBOOT_FILE_NAMES.map(str::to_owned).to_vec(),
        })
    }

    /// Replaces the crdyboot candidate list.
    #[must_use]
    pub fn with_crdyboot_candidates(mut self, names: Vec<String>) -> Self {
        self.crdyboot_candidates = names;
        self
    }

    /// Glob selecting bootloaders.
    #[must_use]
    pub fn efi_glob(&self) -> &ArtifactGlob {
        &self.efi_glob
    }

    /// Glob selecting syslinux kernels.
    #[must_use]
    pub fn syslinux_glob(&self) -> &ArtifactGlob {
        &self.syslinux_glob
    }

    /// Names checked for crdyboot, in order.
    #[must_use]
    pub fn crdyboot_candidates(&self) -> &[String] {
        &self.crdyboot_candidates
    }
}

/// Artefacts touched by a completed run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Signed, installed, and verified.
    pub signed: Vec<Artifact>,
    /// Left unsigned because `sbsign` failed.
    pub skipped: Vec<Artifact>,
    /// Had their `.vbpubk` section replaced.
    pub injected: Vec<Artifact>,
}

impl RunSummary {
    /// One-line description for the final log message.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "signed {} file(s), skipped {}, injected vbpubk into {}",
            self.signed.len(),
            self.skipped.len(),
            self.injected.len()
        )
    }

    fn record(&mut self, artifact: &Artifact, outcome: SignOutcome) {
        match outcome {
            SignOutcome::Signed => self.signed.push(artifact.clone()),
            SignOutcome::Skipped => self.skipped.push(artifact.clone()),
        }
    }
}

/// Inputs for one run.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    /// Root of the ESP or `/boot` of the root filesystem.
    pub target_dir: &'a Utf8Path,
    /// UEFI key directory.
    pub key_dir: &'a Utf8Path,
    /// Glob selecting bootloaders below `efi/boot`.
    pub efi_glob: &'a str,
    /// External program names.
    pub tools: &'a ToolNames,
}

/// [`ArtifactOps`] backed by real tools.
pub struct SigningSession<'a> {
    signer: Signer<'a>,
    key_dir: Utf8PathBuf,
}

impl<'a> SigningSession<'a> {
    /// Pairs a signer with the key directory used for injection.
    #[must_use]
    pub fn new(signer: Signer<'a>, key_dir: &Utf8Path) -> Self {
        Self {
            signer,
            key_dir: key_dir.to_owned(),
        }
    }

    /// Releases the signer's workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be removed.
    pub fn finish(self) -> Result<()> {
        self.signer.finish()
    }
}

impl ArtifactOps for SigningSession<'_> {
    fn is_crdyboot_file(&self, artifact: &Utf8Path) -> bool {
        is_crdyboot_file(self.signer.tools(), artifact, self.signer.workspace())
    }

    fn inject_vbpubk(&self, artifact: &Utf8Path) -> Result<()> {
        inject_vbpubk(
            self.signer.tools(),
            artifact,
            &self.key_dir,
            self.signer.workspace(),
        )
    }

    fn sign_efi_file(&self, artifact: &Utf8Path) -> Result<SignOutcome> {
        self.signer.sign_efi_file(artifact)
    }
}

/// Signs every selected artefact below `request.target_dir`.
///
/// Credentials are checked before anything else is touched. The workspace
/// is created once for the run and removed when the run ends, whether it
/// succeeds or not.
///
/// # Errors
///
/// Returns an error if the glob is invalid, a credential is missing, the
/// workspace cannot be created, or an artefact hits a fatal failure.
pub fn sign_target_dir(
    request: &SignRequest<'_>,
    executor: &dyn CommandExecutor,
) -> Result<RunSummary> {
    let plan = SigningPlan::new(request.efi_glob)?;
    let credentials = CredentialSet::resolve(request.key_dir)?;
    let workspace = Workspace::new()?;
    let tools = Tools::new(executor, request.tools);
    let session = SigningSession::new(
        Signer::new(tools, credentials, workspace),
        request.key_dir,
    );

    let summary = sign_target_dir_with(&BootLayout::new(request.target_dir), &plan, &session)?;
    session.finish()?;
    Ok(summary)
}

/// Sequences `ops` over the artefacts `plan` selects from `layout`.
///
/// # Errors
///
/// Returns the first error reported by `ops` or by glob evaluation.
pub fn sign_target_dir_with(
    layout: &BootLayout,
    plan: &SigningPlan,
    ops: &dyn ArtifactOps,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for artifact in layout.bootloaders(plan.efi_glob())? {
        sign_artifact(ops, &artifact, &mut summary)?;
    }

    for artifact in layout.crdyboot_candidates(plan.crdyboot_candidates()) {
        if !ops.is_crdyboot_file(&artifact.path) {
            debug!("{} is not crdyboot", artifact.path);
            continue;
        }
        ops.inject_vbpubk(&artifact.path)?;
        summary.injected.push(artifact.clone());
        sign_artifact(ops, &artifact, &mut summary)?;
    }

    for artifact in layout.syslinux_kernels(plan.syslinux_glob())? {
        sign_artifact(ops, &artifact, &mut summary)?;
    }

    if let Some(artifact) = layout.root_kernel() {
        sign_artifact(ops, &artifact, &mut summary)?;
    }

    info!("{}", summary.describe());
    Ok(summary)
}

fn sign_artifact(
    ops: &dyn ArtifactOps,
    artifact: &Artifact,
    summary: &mut RunSummary,
) -> Result<()> {
    debug!("{} {}", artifact.group, artifact.path);
    let outcome = ops.sign_efi_file(&artifact.path)?;
    summary.record(artifact, outcome);
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
