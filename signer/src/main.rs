//! `sign-uefi` CLI entrypoint.
//!
//! Signs the UEFI executables and kernels of a boot directory in place and
//! exits non-zero on the first fatal failure.

use clap::Parser;
use std::io::Write;
use uefi_signer::cli::Cli;
use uefi_signer::error::Result;
use uefi_signer::exec::SystemCommandExecutor;
use uefi_signer::logging;
use uefi_signer::pipeline::sign_target_dir;
use uefi_signer::tools::{ToolNames, ensure_tools_available};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbosity, cli.quiet);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let tools = ToolNames::default();
    ensure_tools_available(&tools)?;
    sign_target_dir(&cli.request(&tools), &SystemCommandExecutor)?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Nowhere left to report to.
    }
}
