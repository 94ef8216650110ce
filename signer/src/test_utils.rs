//! Shared test utilities for the signer crate.

use crate::credentials::CredentialKind;
use crate::error::{Result, SignerError};
use crate::exec::CommandExecutor;
use crate::pipeline::ArtifactOps;
use crate::signer::SignOutcome;
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::process::{ExitStatus, Output};
use tempfile::TempDir;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Renders an invocation as a single space-separated line.
pub fn command_line(cmd: &str, args: &[&str]) -> String {
    std::iter::once(cmd)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "sbsign").
    pub cmd: String,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Creates an expectation for `cmd args...` answering with `result`.
    pub fn new<S: AsRef<str>>(cmd: &str, args: &[S], result: Result<Output>) -> Self {
        Self {
            cmd: cmd.to_owned(),
            args: args.iter().map(|arg| arg.as_ref().to_owned()).collect(),
            result,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Answers an ordered list of expected invocations. A mismatched or surplus
/// invocation returns [`SignerError::StubMismatch`] and is remembered, so
/// [`StubExecutor::assert_finished`] still fails when the caller swallows
/// the error.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    mismatches: RefCell<Vec<String>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            mismatches: RefCell::new(Vec::new()),
        }
    }

    /// Asserts that all expected invocations were consumed and matched.
    ///
    /// # Panics
    ///
    /// Panics if expected calls remain or any invocation mismatched.
    pub fn assert_finished(&self) {
        assert!(
            self.mismatches.borrow().is_empty(),
            "mismatched command invocations: {:?}",
            self.mismatches.borrow()
        );
        let remaining: Vec<String> = self
            .expected
            .borrow()
            .iter()
            .map(|call| {
                let args: Vec<&str> = call.args.iter().map(String::as_str).collect();
                command_line(&call.cmd, &args)
            })
            .collect();
        assert!(
            remaining.is_empty(),
            "expected further command invocations: {remaining:?}"
        );
    }

    fn mismatch(&self, message: String) -> SignerError {
        self.mismatches.borrow_mut().push(message.clone());
        SignerError::StubMismatch { message }
    }
}

impl CommandExecutor for StubExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output> {
        let received = command_line(cmd, args);
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(self.mismatch(format!("unexpected invocation: {received}")));
        };

        let matches =
            call.cmd == cmd && call.args.iter().map(String::as_str).eq(args.iter().copied());
        if !matches {
            let wanted: Vec<&str> = call.args.iter().map(String::as_str).collect();
            return Err(self.mismatch(format!(
                "expected `{}`, received `{received}`",
                command_line(&call.cmd, &wanted)
            )));
        }

        call.result
    }
}

type Responder = Box<dyn Fn(&str, &[&str]) -> Result<Output>>;

/// A `CommandExecutor` that records every invocation and answers through a
/// responder closure.
pub struct RecordingExecutor {
    responder: Responder,
    calls: RefCell<Vec<String>>,
}

impl RecordingExecutor {
    /// Creates an executor answering with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &[&str]) -> Result<Output> + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Creates an executor where every command succeeds.
    pub fn succeeding() -> Self {
        Self::new(|_, _| Ok(success_output()))
    }

    /// Returns the recorded invocations as command lines.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Returns the recorded invocations whose command line starts with
    /// `prefix`.
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output> {
        self.calls.borrow_mut().push(command_line(cmd, args));
        (self.responder)(cmd, args)
    }
}

/// A call made by the orchestrator to [`RecordingOps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpsCall {
    /// `is_crdyboot_file`
    Classify(Utf8PathBuf),
    /// `inject_vbpubk`
    Inject(Utf8PathBuf),
    /// `sign_efi_file`
    Sign(Utf8PathBuf),
}

type Classifier = Box<dyn Fn(&Utf8Path) -> bool>;

/// An `ArtifactOps` fake that records calls and fails on request.
pub struct RecordingOps {
    classifier: Classifier,
    sign_failures: Vec<String>,
    verify_failures: Vec<String>,
    inject_failures: Vec<String>,
    calls: RefCell<Vec<OpsCall>>,
}

impl RecordingOps {
    /// Creates a fake classifying artefacts with `classifier`.
    pub fn new<F>(classifier: F) -> Self
    where
        F: Fn(&Utf8Path) -> bool + 'static,
    {
        Self {
            classifier: Box::new(classifier),
            sign_failures: Vec::new(),
            verify_failures: Vec::new(),
            inject_failures: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Classifies files whose name starts with `crdyboot` as crdyboot.
    pub fn crdyboot_by_name() -> Self {
        Self::new(|path| {
            path.file_name()
                .is_some_and(|name| name.starts_with("crdyboot"))
        })
    }

    /// Reports a recoverable signing failure for `name`.
    #[must_use]
    pub fn with_sign_failure(mut self, name: &str) -> Self {
        self.sign_failures.push(name.to_owned());
        self
    }

    /// Reports a verification failure for `name`.
    #[must_use]
    pub fn with_verify_failure(mut self, name: &str) -> Self {
        self.verify_failures.push(name.to_owned());
        self
    }

    /// Reports an injection failure for `name`.
    #[must_use]
    pub fn with_inject_failure(mut self, name: &str) -> Self {
        self.inject_failures.push(name.to_owned());
        self
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<OpsCall> {
        self.calls.borrow().clone()
    }

    /// File names passed to `sign_efi_file`, in order.
    pub fn signed_names(&self) -> Vec<String> {
        self.names(|call| match call {
            OpsCall::Sign(path) => Some(path),
            _ => None,
        })
    }

    /// File names passed to `inject_vbpubk`, in order.
    pub fn injected_names(&self) -> Vec<String> {
        self.names(|call| match call {
            OpsCall::Inject(path) => Some(path),
            _ => None,
        })
    }

    /// File names passed to `is_crdyboot_file`, in order.
    pub fn classified_names(&self) -> Vec<String> {
        self.names(|call| match call {
            OpsCall::Classify(path) => Some(path),
            _ => None,
        })
    }

    fn names<F>(&self, select: F) -> Vec<String>
    where
        F: Fn(&OpsCall) -> Option<&Utf8PathBuf>,
    {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| select(call))
            .filter_map(|path| path.file_name().map(str::to_owned))
            .collect()
    }

    fn listed(names: &[String], path: &Utf8Path) -> bool {
        path.file_name()
            .is_some_and(|name| names.iter().any(|listed| listed == name))
    }
}

impl ArtifactOps for RecordingOps {
    fn is_crdyboot_file(&self, artifact: &Utf8Path) -> bool {
        self.calls
            .borrow_mut()
            .push(OpsCall::Classify(artifact.to_owned()));
        (self.classifier)(artifact)
    }

    fn inject_vbpubk(&self, artifact: &Utf8Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(OpsCall::Inject(artifact.to_owned()));
        if Self::listed(&self.inject_failures, artifact) {
            return Err(SignerError::InjectionFailed {
                artifact: artifact.to_owned(),
                step: "update-section",
                message: "stubbed failure".to_owned(),
            });
        }
        Ok(())
    }

    fn sign_efi_file(&self, artifact: &Utf8Path) -> Result<SignOutcome> {
        self.calls
            .borrow_mut()
            .push(OpsCall::Sign(artifact.to_owned()));
        if Self::listed(&self.verify_failures, artifact) {
            return Err(SignerError::VerificationFailed {
                artifact: artifact.to_owned(),
                message: "stubbed failure".to_owned(),
            });
        }
        if Self::listed(&self.sign_failures, artifact) {
            return Ok(SignOutcome::Skipped);
        }
        Ok(SignOutcome::Signed)
    }
}

/// Bootloader names created by [`BootFixture::standard`].
pub const STANDARD_BOOTLOADERS: [&str; 6] = [
    "bootia32.efi",
    "bootx64.efi",
    "testia32.efi",
    "testx64.efi",
    "crdybootia32.efi",
    "crdybootx64.efi",
];

/// Kernel `vmlinuz` points at in [`BootFixture::standard`].
pub const STANDARD_KERNEL: &str = "vmlinuz-5.10.156";

/// A temporary boot directory and key directory.
///
/// Layout below the temporary root:
///
/// ```text
/// boot/                         target directory
/// keys/uefi/                    key directory
/// keys/uefi/db/db.pem
/// keys/uefi/db/db.children/db_child.pem
/// keys/uefi/db/db.children/db_child.rsa
/// keys/kernel_subkey.vbpubk
/// ```
pub struct BootFixture {
    _temp: TempDir,
    root: Utf8PathBuf,
    target_dir: Utf8PathBuf,
    key_dir: Utf8PathBuf,
}

impl BootFixture {
    /// Creates the key directory with all credentials and an empty boot
    /// directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary tree cannot be created.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        let target_dir = root.join("boot");
        let key_dir = root.join("keys").join("uefi");
        fs::create_dir_all(&target_dir).expect("failed to create boot dir");

        let fixture = Self {
            _temp: temp,
            root,
            target_dir,
            key_dir,
        };
        for kind in CredentialKind::ALL {
            fixture.write_key_file(kind.relative_path(), b"");
        }
        fixture.write_key_file("../kernel_subkey.vbpubk", b"vbpubk");
        fixture
    }

    /// Creates the tree used by the end-to-end ordering scenario.
    ///
    /// # Panics
    ///
    /// Panics if the temporary tree cannot be created.
    pub fn standard() -> Self {
        let fixture = Self::new();
        for name in STANDARD_BOOTLOADERS {
            fixture.write_file(&format!("efi/boot/{name}"), b"");
        }
        fixture.write_file("syslinux/vmlinuz.A", b"");
        fixture.write_file("syslinux/vmlinuz.B", b"");
        fixture.write_file(STANDARD_KERNEL, b"");
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            fixture.target_dir.join(STANDARD_KERNEL),
            fixture.target_dir.join("vmlinuz"),
        )
        .expect("failed to create vmlinuz symlink");
        fixture
    }

    /// Temporary root holding both trees.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The boot directory.
    pub fn target_dir(&self) -> &Utf8Path {
        &self.target_dir
    }

    /// The UEFI key directory.
    pub fn key_dir(&self) -> &Utf8Path {
        &self.key_dir
    }

    /// `<target>/efi/boot`
    pub fn bootloader_dir(&self) -> Utf8PathBuf {
        self.target_dir.join("efi").join("boot")
    }

    /// Writes `contents` to `relative` below the boot directory, creating
    /// parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_file(&self, relative: &str, contents: &[u8]) -> Utf8PathBuf {
        write_with_parents(&self.target_dir.join(relative), contents)
    }

    /// Deletes one credential file.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be removed.
    pub fn remove_credential(&self, kind: CredentialKind) {
        fs::remove_file(self.key_dir.join(kind.relative_path()))
            .expect("failed to remove credential");
    }

    fn write_key_file(&self, relative: &str, contents: &[u8]) -> Utf8PathBuf {
        write_with_parents(&self.key_dir.join(relative), contents)
    }
}

impl Default for BootFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn write_with_parents(path: &Utf8Path, contents: &[u8]) -> Utf8PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dir");
    }
    fs::write(path, contents).expect("failed to write fixture file");
    path.to_owned()
}
