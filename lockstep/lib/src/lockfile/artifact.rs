//! The upgrade artifact: one `name|old_version|new_version` record per line.
//!
//! This is a private interchange format between the differ and the changelog
//! aggregator. It has no header and no version marker.

use super::diff::{LockfileError, UpgradeRecord};
use std::path::Path;
use tracing::debug;

/// Serialize records, one per line.
pub fn encode(records: &[UpgradeRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}|{}|{}\n", r.dependency, r.old_version, r.new_version))
        .collect()
}

/// Parse artifact text. Blank or incomplete lines are skipped.
///
/// ## Examples
///
/// ```
/// use lockstep_lib::lockfile::artifact::decode;
///
/// let records = decode("rack|3.1.7|3.1.8\n\nbroken|1.0\n");
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].dependency, "rack");
/// ```
pub fn decode(text: &str) -> Vec<UpgradeRecord> {
    text.lines()
        .enumerate()
        .filter_map(|(number, line)| {
            let mut fields = line.trim().split('|');
            match (fields.next(), fields.next(), fields.next()) {
                (Some(name), Some(old), Some(new))
                    if !name.is_empty() && !old.is_empty() && !new.is_empty() =>
                {
                    Some(UpgradeRecord::new(name, old, new))
                }
                _ => {
                    if !line.trim().is_empty() {
                        debug!(line = number + 1, "Skipping malformed upgrade record");
                    }
                    None
                }
            }
        })
        .collect()
}

/// Write the artifact, replacing any previous content.
///
/// ## Errors
///
/// Returns `LockfileError::Write` on I/O failure.
pub fn write_artifact(path: &Path, records: &[UpgradeRecord]) -> Result<(), LockfileError> {
    std::fs::write(path, encode(records)).map_err(|source| LockfileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the artifact. A missing file is `Ok(None)`, not an error.
///
/// ## Errors
///
/// Returns `LockfileError::Read` if the file exists but cannot be read.
pub fn read_artifact(path: &Path) -> Result<Option<Vec<UpgradeRecord>>, LockfileError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(decode(&text))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LockfileError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
