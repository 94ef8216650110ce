//! CLI argument definitions for the UEFI signer.
//!
//! Kept apart from the entrypoint so the binary only orchestrates.

use crate::pipeline::SignRequest;
use crate::tools::ToolNames;
use camino::Utf8PathBuf;
use clap::Parser;

/// Sign UEFI executables and kernels in a boot directory.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "sign-uefi")]
#[command(version, about)]
#[command(long_about = concat!(
    "Sign UEFI executables and kernels in a boot directory.\n\n",
    "Bootloaders matching EFI_GLOB below <TARGET_DIR>/efi/boot, crdyboot builds, ",
    "syslinux kernels, and the kernel <TARGET_DIR>/vmlinuz points at are signed in ",
    "place with sbsign and checked with sbverify. crdyboot builds get their ",
    ".vbpubk section replaced with <KEY_DIR>/../kernel_subkey.vbpubk first.\n\n",
    "Writes into TARGET_DIR go through sudo.",
))]
#[command(after_help = concat!(
    "KEY DIRECTORY LAYOUT:\n",
    "  db/db.pem                      verification certificate\n",
    "  db/db.children/db_child.pem    signing certificate\n",
    "  db/db.children/db_child.rsa    signing key\n\n",
    "EXAMPLES:\n",
    "  Sign an EFI system partition mounted at /mnt/esp:\n",
    "    $ sign-uefi /mnt/esp /keys/uefi '*.efi'\n\n",
    "  Sign a root filesystem's /boot with debug output:\n",
    "    $ sign-uefi -v /mnt/root/boot /keys/uefi 'boot*.efi'",
))]
pub struct Cli {
    /// Root of the EFI system partition or /boot of a root filesystem.
    #[arg(value_name = "TARGET_DIR")]
    pub target_dir: Utf8PathBuf,

    /// Directory holding the UEFI signing keys.
    #[arg(value_name = "KEY_DIR")]
    pub key_dir: Utf8PathBuf,

    /// Glob selecting bootloaders below TARGET_DIR/efi/boot.
    #[arg(value_name = "EFI_GLOB")]
    pub efi_glob: String,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// Builds a run request from the parsed arguments.
    #[must_use]
    pub fn request<'a>(&'a self, tools: &'a ToolNames) -> SignRequest<'a> {
        SignRequest {
            target_dir: &self.target_dir,
            key_dir: &self.key_dir,
            efi_glob: &self.efi_glob,
            tools,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
