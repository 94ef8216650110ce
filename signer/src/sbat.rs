//! SBAT section extraction and crdyboot detection.
//!
//! SBAT data is a small CSV table embedded in the `.sbat` section of a UEFI
//! executable. The first row describes the SBAT format itself; the second
//! names the component that produced the binary. See
//! <https://github.com/rhboot/shim/blob/main/SBAT.md> for the format.
//!
//! Most artefacts carry no `.sbat` section at all, so extraction failures
//! are expected and produce an empty table rather than an error.

use crate::error::Result;
use crate::locator::artifact_file_name;
use crate::tools::Tools;
use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, warn};
use std::fs;

/// Section holding SBAT metadata.
pub const SBAT_SECTION: &str = ".sbat";
/// File the section is extracted to inside the workspace.
pub const SBAT_FILE_NAME: &str = "sbat.csv";
/// Component name identifying a crdyboot build.
pub const CRDYBOOT_COMPONENT: &str = "crdyboot";

/// One SBAT row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbatRecord {
    fields: Vec<String>,
}

impl SbatRecord {
    /// The component name (first field).
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }

    /// All fields of the row.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl From<&StringRecord> for SbatRecord {
    fn from(record: &StringRecord) -> Self {
        Self {
            fields: record.iter().map(str::to_owned).collect(),
        }
    }
}

/// Parses SBAT text as CSV. Empty input yields no rows.
///
/// Quoted fields may contain commas and line breaks. Rows may differ in
/// length. Blank lines are skipped. Parsing stops at the first malformed
/// row, keeping the rows read so far.
///
/// # Examples
///
/// ```
/// use uefi_signer::sbat::parse_sbat;
///
/// let rows = parse_sbat("sbat,1,\"SBAT Version\"\ncrdyboot,1,Google\n");
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].fields()[2], "SBAT Version");
/// assert_eq!(rows[1].component(), Some("crdyboot"));
/// ```
#[must_use]
pub fn parse_sbat(contents: &str) -> Vec<SbatRecord> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(contents.as_bytes());
    reader
        .records()
        .map_while(|record| match record {
            Ok(record) => Some(SbatRecord::from(&record)),
            Err(err) => {
                debug!("stopping SBAT parse at malformed row: {err}");
                None
            }
        })
        .collect()
}

/// Returns true if the second row names the crdyboot component.
#[must_use]
pub fn is_crdyboot_sbat(records: &[SbatRecord]) -> bool {
    records
        .get(1)
        .and_then(SbatRecord::component)
        .is_some_and(|component| component == CRDYBOOT_COMPONENT)
}

/// Extracts the `.sbat` section of `artifact` to `<workspace>/sbat.csv`.
///
/// When `objcopy` fails, typically because the section does not exist,
/// the destination is truncated to an empty file instead. Either way the
/// returned path names a readable file.
///
/// # Errors
///
/// Returns an error only if the empty fallback file cannot be written or
/// the artefact path has no file name.
pub fn read_sbat_section(
    tools: &Tools<'_>,
    artifact: &Utf8Path,
    workspace: &Utf8Path,
) -> Result<Utf8PathBuf> {
    let sbat_path = workspace.join(SBAT_FILE_NAME);
    let scratch = workspace.join(format!("{}.tmp", artifact_file_name(artifact)?));

    let extracted = tools
        .dump_section(artifact, SBAT_SECTION, &sbat_path, &scratch)
        .is_ok_and(|output| output.status.success());

    if !extracted {
        debug!("no {SBAT_SECTION} section in {artifact}");
        fs::write(&sbat_path, b"")?;
    }
    Ok(sbat_path)
}

/// Returns true if `artifact` is a build of the crdyboot bootloader.
///
/// Never fails: an unreadable, empty, or malformed SBAT section classifies
/// as "not crdyboot".
pub fn is_crdyboot_file(tools: &Tools<'_>, artifact: &Utf8Path, workspace: &Utf8Path) -> bool {
    let sbat_path = match read_sbat_section(tools, artifact, workspace) {
        Ok(path) => path,
        Err(e) => {
            warn!("cannot read {SBAT_SECTION} of {artifact}: {e}");
            return false;
        }
    };
    let contents = match fs::read_to_string(&sbat_path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!("unreadable SBAT data for {artifact}: {e}");
            return false;
        }
    };
    let is_crdyboot = is_crdyboot_sbat(&parse_sbat(&contents));
    debug!("{artifact} crdyboot: {is_crdyboot}");
    is_crdyboot
}

#[cfg(test)]
#[path = "sbat_tests.rs"]
mod tests;
