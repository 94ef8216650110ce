//! Unit tests for the per-file sign/verify protocol.

use super::*;
use crate::test_utils::{BootFixture, ExpectedCall, StubExecutor, failure_output, success_output};
use crate::tools::ToolNames;
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};

const TARGET: &str = "/boot/efi/boot/testx64.efi";

struct Harness {
    fixture: BootFixture,
    workspace: Workspace,
    names: ToolNames,
}

impl Harness {
    fn signed_copy(&self) -> Utf8PathBuf {
        self.workspace.file("testx64.efi")
    }

    fn key_path(&self, relative: &str) -> String {
        self.fixture.key_dir().join(relative).into_string()
    }

    fn strip(&self, result: Result<std::process::Output>) -> ExpectedCall {
        ExpectedCall::new("sudo", &["sbattach", "--remove", TARGET], result)
    }

    fn sign(&self, result: Result<std::process::Output>) -> ExpectedCall {
        ExpectedCall::new(
            "sbsign",
            &[
                "--key".to_owned(),
                self.key_path("db/db.children/db_child.rsa"),
                "--cert".to_owned(),
                self.key_path("db/db.children/db_child.pem"),
                "--output".to_owned(),
                self.signed_copy().into_string(),
                TARGET.to_owned(),
            ],
            result,
        )
    }

    fn install(&self, result: Result<std::process::Output>) -> ExpectedCall {
        ExpectedCall::new(
            "sudo",
            &[
                "cp".to_owned(),
                "--force".to_owned(),
                self.signed_copy().into_string(),
                TARGET.to_owned(),
            ],
            result,
        )
    }

    fn verify(&self, result: Result<std::process::Output>) -> ExpectedCall {
        ExpectedCall::new(
            "sbverify",
            &[
                "--cert".to_owned(),
                self.key_path("db/db.pem"),
                TARGET.to_owned(),
            ],
            result,
        )
    }

    fn run(self, executor: &StubExecutor) -> Result<SignOutcome> {
        let credentials =
            CredentialSet::resolve(self.fixture.key_dir()).expect("fixture has credentials");
        let tools = Tools::new(executor, &self.names);
        let signer = Signer::new(tools, credentials, self.workspace);
        let outcome = signer.sign_efi_file(Utf8Path::new(TARGET));
        signer.finish().expect("workspace should be removed");
        outcome
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        fixture: BootFixture::new(),
        workspace: Workspace::new().expect("failed to create workspace"),
        names: ToolNames::default(),
    }
}

#[rstest]
fn signs_installs_and_verifies_in_order(harness: Harness) {
    let executor = StubExecutor::new(vec![
        harness.strip(Ok(success_output())),
        harness.sign(Ok(success_output())),
        harness.install(Ok(success_output())),
        harness.verify(Ok(success_output())),
    ]);

    let outcome = harness.run(&executor).expect("signing should succeed");

    assert_eq!(outcome, SignOutcome::Signed);
    executor.assert_finished();
}

#[rstest]
#[case::no_signature(Ok(failure_output("sbattach: no signature table present")))]
#[case::spawn_error(Err(std::io::Error::other("sudo: not found").into()))]
fn strip_failure_is_ignored(harness: Harness, #[case] strip: Result<std::process::Output>) {
    let executor = StubExecutor::new(vec![
        harness.strip(strip),
        harness.sign(Ok(success_output())),
        harness.install(Ok(success_output())),
        harness.verify(Ok(success_output())),
    ]);

    let outcome = harness.run(&executor).expect("signing should succeed");

    assert_eq!(outcome, SignOutcome::Signed);
    executor.assert_finished();
}

#[rstest]
#[case::rejected(Ok(failure_output("Invalid DOS header magic")))]
#[case::spawn_error(Err(std::io::Error::other("sbsign: not found").into()))]
fn sign_failure_skips_install_and_verify(
    harness: Harness,
    #[case] sign: Result<std::process::Output>,
) {
    let executor = StubExecutor::new(vec![
        harness.strip(Ok(success_output())),
        harness.sign(sign),
    ]);

    let outcome = harness.run(&executor).expect("sign failure is recoverable");

    assert_eq!(outcome, SignOutcome::Skipped);
    executor.assert_finished();
}

#[rstest]
fn install_failure_is_fatal(harness: Harness) {
    let executor = StubExecutor::new(vec![
        harness.strip(Ok(success_output())),
        harness.sign(Ok(success_output())),
        harness.install(Ok(failure_output("cp: Read-only file system"))),
    ]);

    let err = harness.run(&executor).expect_err("install failure is fatal");

    assert!(matches!(
        err,
        SignerError::InstallFailed { ref message, .. } if message == "cp: Read-only file system"
    ));
    executor.assert_finished();
}

#[rstest]
fn verify_failure_is_fatal(harness: Harness) {
    let executor = StubExecutor::new(vec![
        harness.strip(Ok(success_output())),
        harness.sign(Ok(success_output())),
        harness.install(Ok(success_output())),
        harness.verify(Ok(failure_output("Signature verification failed"))),
    ]);

    let err = harness.run(&executor).expect_err("verify failure is fatal");

    match err {
        SignerError::VerificationFailed { artifact, message } => {
            assert_eq!(artifact, TARGET);
            assert_eq!(message, "Signature verification failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    executor.assert_finished();
}

#[rstest]
fn verify_spawn_error_is_fatal(harness: Harness) {
    let executor = StubExecutor::new(vec![
        harness.strip(Ok(success_output())),
        harness.sign(Ok(success_output())),
        harness.install(Ok(success_output())),
        harness.verify(Err(std::io::Error::other("sbverify: not found").into())),
    ]);

    let err = harness.run(&executor).expect_err("verify spawn error is fatal");

    match err {
        SignerError::VerificationFailed { artifact, message } => {
            assert_eq!(artifact, TARGET);
            assert!(message.contains("sbverify: not found"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    executor.assert_finished();
}

#[rstest]
fn root_path_is_rejected_before_any_command(harness: Harness) {
    let executor = StubExecutor::new(Vec::new());
    let credentials =
        CredentialSet::resolve(harness.fixture.key_dir()).expect("fixture has credentials");
    let signer = Signer::new(
        Tools::new(&executor, &harness.names),
        credentials,
        harness.workspace,
    );

    let err = signer
        .sign_efi_file(Utf8Path::new("/"))
        .expect_err("root has no file name");

    assert!(matches!(err, SignerError::InvalidArtifactPath { .. }));
    executor.assert_finished();
}
