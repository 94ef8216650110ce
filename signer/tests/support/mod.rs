//! Test support utilities for signer behavioural tests.
//!
//! Provides a stand-in for the external tools that answers `objcopy`
//! section dumps with SBAT data and lets individual `sbsign`/`sbverify`
//! calls fail.

use camino::Utf8Path;
use std::process::Output;
use uefi_signer::error::Result;
use uefi_signer::test_utils::{failure_output, success_output};

/// SBAT table of a crdyboot build.
pub const CRDYBOOT_SBAT: &str = concat!(
    "sbat,1,SBAT Version,sbat,1,https://github.com/rhboot/shim/blob/main/SBAT.md\n",
    "crdyboot,1,Google,crdyboot,1.0.0,https://chromium.googlesource.com\n",
);

/// Failures the fake tools should report.
#[derive(Debug, Clone, Default)]
pub struct ToolFaults {
    /// File names `sbsign` refuses to sign.
    pub sign_rejects: Vec<String>,
    /// Whether `sbverify` rejects everything.
    pub verify_rejects_all: bool,
}

impl ToolFaults {
    /// Answers one invocation.
    ///
    /// `objcopy --dump-section` writes [`CRDYBOOT_SBAT`] for files named
    /// `crdyboot*` and fails for everything else.
    pub fn respond(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let last_name = args
            .last()
            .and_then(|arg| Utf8Path::new(arg).file_name())
            .unwrap_or_default();
        match cmd {
            "objcopy" => dump_sbat(args),
            "sbsign" if self.sign_rejects.iter().any(|name| name == last_name) => {
                Ok(failure_output("Invalid DOS header magic"))
            }
            "sbverify" if self.verify_rejects_all => {
                Ok(failure_output("Signature verification failed"))
            }
            _ => Ok(success_output()),
        }
    }
}

fn dump_sbat(args: &[&str]) -> Result<Output> {
    let Some(dest) = args
        .first()
        .and_then(|arg| arg.strip_prefix("--dump-section=.sbat="))
    else {
        return Ok(success_output());
    };
    let is_crdyboot = args
        .get(1)
        .and_then(|artifact| Utf8Path::new(artifact).file_name())
        .is_some_and(|name| name.starts_with("crdyboot"));
    if !is_crdyboot {
        return Ok(failure_output("objcopy: can't dump section '.sbat'"));
    }
    std::fs::write(dest, CRDYBOOT_SBAT)?;
    Ok(success_output())
}

/// File name of the last argument of each call starting with `prefix`.
pub fn targets_of(calls: &[String], prefix: &str) -> Vec<String> {
    calls
        .iter()
        .filter(|call| call.starts_with(prefix))
        .filter_map(|call| call.rsplit('/').next().map(str::to_owned))
        .collect()
}

/// Value following `flag` in a recorded command line.
pub fn flag_value<'a>(call: &'a str, flag: &str) -> Option<&'a str> {
    call.split(' ').skip_while(|arg| *arg != flag).nth(1)
}
