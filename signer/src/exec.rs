//! Blocking invocation of external programs.
//!
//! Every tool the pipeline relies on (`objcopy`, `sbattach`, `sbsign`,
//! `sbverify`, `sudo cp`) is reached through [`CommandExecutor`], so the
//! classifier, injector, and signer can be exercised with substitute
//! executors instead of spawning real processes.

use crate::error::{Result, SignerError};
use log::trace;
use std::process::{Command, Output};

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command with arguments, waits for it, and returns the captured
    /// output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command. A non-zero exit status is not an error at this level.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uefi_signer::exec::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("objcopy", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), uefi_signer::error::SignerError>(())
    /// ```
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output> {
        trace!("running {cmd} {}", args.join(" "));
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(SignerError::from)
    }
}

/// Describes why a command did not succeed, for inclusion in error messages.
///
/// Prefers the trimmed stderr text and falls back to the exit status when
/// the tool printed nothing.
#[must_use]
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        output.status.to_string()
    } else {
        trimmed.to_owned()
    }
}

/// Folds a spawn error and a non-zero exit into the same `Err(message)`
/// shape, for steps whose failure must be reported.
pub(crate) fn check(result: Result<Output>) -> std::result::Result<(), String> {
    match result {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(failure_message(&output)),
        Err(err) => Err(err.to_string()),
    }
}
