//! Command lines for the external signing and section tools.
//!
//! [`Tools`] turns each capability the pipeline needs into one blocking
//! [`CommandExecutor`] call. It makes no policy decisions: callers decide
//! whether a failed call is tolerated, recoverable, or fatal.

use crate::error::{Result, SignerError};
use crate::exec::CommandExecutor;
use camino::Utf8Path;
use log::debug;
use std::process::Output;

/// Program names used for each external capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolNames {
    /// Binary section dump and update.
    pub objcopy: String,
    /// Detached signature removal.
    pub sbattach: String,
    /// Detached signature creation.
    pub sbsign: String,
    /// Detached signature verification.
    pub sbverify: String,
    /// Privilege escalation for writes into the boot directory.
    pub sudo: String,
    /// File copy run under `sudo`.
    pub cp: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            objcopy: "objcopy".to_owned(),
            sbattach: "sbattach".to_owned(),
            sbsign: "sbsign".to_owned(),
            sbverify: "sbverify".to_owned(),
            sudo: "sudo".to_owned(),
            cp: "cp".to_owned(),
        }
    }
}

impl ToolNames {
    /// Tools that must be present before a run starts.
    ///
    /// `sudo` and `cp` are assumed to exist on any host able to write to a
    /// boot directory.
    #[must_use]
    pub fn required(&self) -> [&str; 4] {
        [
            self.objcopy.as_str(),
            self.sbattach.as_str(),
            self.sbsign.as_str(),
            self.sbverify.as_str(),
        ]
    }
}

/// Checks that every required tool resolves on `PATH`.
///
/// # Errors
///
/// Returns [`SignerError::ToolNotFound`] naming the first missing tool.
pub fn ensure_tools_available(names: &ToolNames) -> Result<()> {
    ensure_tools_available_with(names, |tool| which::which(tool).is_ok())
}

/// Internal implementation with injectable lookup for testability.
fn ensure_tools_available_with<F>(names: &ToolNames, is_available: F) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    match names.required().into_iter().find(|tool| !is_available(tool)) {
        Some(tool) => Err(SignerError::ToolNotFound {
            tool: tool.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Binds an executor to a set of tool names.
#[derive(Clone, Copy)]
pub struct Tools<'a> {
    executor: &'a dyn CommandExecutor,
    names: &'a ToolNames,
}

impl<'a> Tools<'a> {
    /// Creates a tool set that runs commands through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, names: &'a ToolNames) -> Self {
        Self { executor, names }
    }

    /// `objcopy --dump-section=<section>=<dest> <artifact> <scratch>`
    ///
    /// `scratch` receives an unused copy of the artefact; without an output
    /// file `objcopy` tries to rewrite the input and warns when it lacks
    /// write permission.
    ///
    /// # Errors
    ///
    /// Returns an error only if `objcopy` cannot be spawned.
    pub fn dump_section(
        &self,
        artifact: &Utf8Path,
        section: &str,
        dest: &Utf8Path,
        scratch: &Utf8Path,
    ) -> Result<Output> {
        let dump = format!("--dump-section={section}={dest}");
        self.run(
            &self.names.objcopy,
            &[dump.as_str(), artifact.as_str(), scratch.as_str()],
        )
    }

    /// `objcopy --update-section <section>=<data> <artifact> <output>`
    ///
    /// # Errors
    ///
    /// Returns an error only if `objcopy` cannot be spawned.
    pub fn update_section(
        &self,
        artifact: &Utf8Path,
        section: &str,
        data: &Utf8Path,
        output: &Utf8Path,
    ) -> Result<Output> {
        let update = format!("{section}={data}");
        self.run(
            &self.names.objcopy,
            &[
                "--update-section",
                update.as_str(),
                artifact.as_str(),
                output.as_str(),
            ],
        )
    }

    /// `sudo sbattach --remove <artifact>`
    ///
    /// # Errors
    ///
    /// Returns an error only if `sudo` cannot be spawned.
    pub fn strip_signature(&self, artifact: &Utf8Path) -> Result<Output> {
        self.run(
            &self.names.sudo,
            &[self.names.sbattach.as_str(), "--remove", artifact.as_str()],
        )
    }

    /// `sbsign --key <key> --cert <cert> --output <output> <artifact>`
    ///
    /// # Errors
    ///
    /// Returns an error only if `sbsign` cannot be spawned.
    pub fn sign(
        &self,
        key: &Utf8Path,
        cert: &Utf8Path,
        output: &Utf8Path,
        artifact: &Utf8Path,
    ) -> Result<Output> {
        self.run(
            &self.names.sbsign,
            &[
                "--key",
                key.as_str(),
                "--cert",
                cert.as_str(),
                "--output",
                output.as_str(),
                artifact.as_str(),
            ],
        )
    }

    /// `sbverify --cert <cert> <artifact>`
    ///
    /// # Errors
    ///
    /// Returns an error only if `sbverify` cannot be spawned.
    pub fn verify(&self, cert: &Utf8Path, artifact: &Utf8Path) -> Result<Output> {
        self.run(
            &self.names.sbverify,
            &["--cert", cert.as_str(), artifact.as_str()],
        )
    }

    /// `sudo cp [--force] <src> <dest>`
    ///
    /// # Errors
    ///
    /// Returns an error only if `sudo` cannot be spawned.
    pub fn privileged_copy(&self, src: &Utf8Path, dest: &Utf8Path, force: bool) -> Result<Output> {
        let cp = self.names.cp.as_str();
        if force {
            self.run(
                &self.names.sudo,
                &[cp, "--force", src.as_str(), dest.as_str()],
            )
        } else {
            self.run(&self.names.sudo, &[cp, src.as_str(), dest.as_str()])
        }
    }

    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("{cmd} {}", args.join(" "));
        self.executor.run(cmd, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockCommandExecutor;
    use crate::test_utils::success_output;
    use rstest::rstest;

    fn expect_call(executor: &mut MockCommandExecutor, cmd: &'static str, args: Vec<&'static str>) {
        executor
            .expect_run()
            .withf(move |c, a| c == cmd && a == args.as_slice())
            .times(1)
            .returning(|_, _| Ok(success_output()));
    }

    #[test]
    fn required_tools_exclude_sudo_and_cp() {
        let names = ToolNames::default();
        assert_eq!(
            names.required(),
            ["objcopy", "sbattach", "sbsign", "sbverify"]
        );
    }

    #[rstest]
    #[case::all_present(&[], None)]
    #[case::objcopy_missing(&["objcopy"], Some("objcopy"))]
    #[case::first_missing_wins(&["sbsign", "sbverify"], Some("sbsign"))]
    fn ensure_tools_reports_first_missing_tool(
        #[case] missing: &[&str],
        #[case] expected: Option<&str>,
    ) {
        let names = ToolNames::default();
        let result = ensure_tools_available_with(&names, |tool| !missing.contains(&tool));
        match expected {
            None => assert!(result.is_ok()),
            Some(tool) => assert!(matches!(
                result,
                Err(SignerError::ToolNotFound { tool: ref t }) if t == tool
            )),
        }
    }

    #[test]
    fn dump_section_passes_scratch_output() {
        let mut executor = MockCommandExecutor::new();
        expect_call(
            &mut executor,
            "objcopy",
            vec![
                "--dump-section=.sbat=/ws/sbat.csv",
                "/boot/efi/boot/bootx64.efi",
                "/ws/bootx64.efi.tmp",
            ],
        );
        let names = ToolNames::default();
        let tools = Tools::new(&executor, &names);

        let output = tools
            .dump_section(
                Utf8Path::new("/boot/efi/boot/bootx64.efi"),
                ".sbat",
                Utf8Path::new("/ws/sbat.csv"),
                Utf8Path::new("/ws/bootx64.efi.tmp"),
            )
            .expect("stub should answer");
        assert!(output.status.success());
    }

    #[test]
    fn strip_signature_runs_under_sudo() {
        let mut executor = MockCommandExecutor::new();
        expect_call(
            &mut executor,
            "sudo",
            vec!["sbattach", "--remove", "/boot/vmlinuz-5.10.156"],
        );
        let names = ToolNames::default();
        let tools = Tools::new(&executor, &names);

        assert!(
            tools
                .strip_signature(Utf8Path::new("/boot/vmlinuz-5.10.156"))
                .is_ok()
        );
    }

    #[rstest]
    #[case::forced(true, vec!["cp", "--force", "/ws/a.efi", "/boot/a.efi"])]
    #[case::plain(false, vec!["cp", "/ws/a.efi", "/boot/a.efi"])]
    fn privileged_copy_honours_force(#[case] force: bool, #[case] args: Vec<&'static str>) {
        let mut executor = MockCommandExecutor::new();
        expect_call(&mut executor, "sudo", args);
        let names = ToolNames::default();
        let tools = Tools::new(&executor, &names);

        assert!(
            tools
                .privileged_copy(
                    Utf8Path::new("/ws/a.efi"),
                    Utf8Path::new("/boot/a.efi"),
                    force
                )
                .is_ok()
        );
    }

    #[test]
    fn custom_tool_names_are_used() {
        let mut executor = MockCommandExecutor::new();
        expect_call(
            &mut executor,
            "/opt/sbsigntools/sbverify",
            vec!["--cert", "/keys/db/db.pem", "/boot/a.efi"],
        );
        let names = ToolNames {
            sbverify: "/opt/sbsigntools/sbverify".to_owned(),
            ..ToolNames::default()
        };
        let tools = Tools::new(&executor, &names);

        assert!(
            tools
                .verify(Utf8Path::new("/keys/db/db.pem"), Utf8Path::new("/boot/a.efi"))
                .is_ok()
        );
    }
}
