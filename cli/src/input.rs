//! Target list loading.

use encoding_rs::GBK;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use surveyor_core::{Result, SurveyorError, Target};

/// Create an empty target file when none exists. Returns `true` if created.
pub fn ensure_target_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, "")?;
    tracing::info!("Created empty target file {}", path.display());
    Ok(true)
}

/// Read targets from a headerless `organization,hosts` CSV file.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let bytes = fs::read(path)?;
    let targets = parse_targets(&bytes)?;
    tracing::info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Parse CSV rows of `organization,hosts`.
///
/// A hosts cell may hold several newline-separated hosts; each becomes its
/// own target. Rows with fewer than two columns are skipped.
pub fn parse_targets(bytes: &[u8]) -> Result<Vec<Target>> {
    let text = decode_input(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut targets = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| SurveyorError::TargetInput(format!("row {}: {e}", line + 1)))?;
        let (Some(organization), Some(hosts)) = (row.get(0), row.get(1)) else {
            tracing::debug!(row = line + 1, "Skipping row without a hosts column");
            continue;
        };
        let organization = organization.trim();
        targets.extend(
            hosts
                .lines()
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .map(|host| Target::new(organization, host)),
        );
    }
    Ok(targets)
}

/// Decode target file bytes: UTF-8 when valid, otherwise GBK.
///
/// Bytes that are not valid GBK either become U+FFFD.
fn decode_input(bytes: &[u8]) -> Cow<'_, str> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    let (text, had_errors) = GBK.decode_without_bom_handling(bytes);
    if had_errors {
        tracing::warn!("Target file is neither UTF-8 nor GBK, undecodable bytes replaced");
    } else {
        tracing::debug!("Target file decoded as GBK");
    }
    text
}
