//! JSON persistence of extracted NFSe records.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NfseError, Result};
use crate::models::nfse::Nfse;

/// Saved file layout: `{"status": "success", "code": 200, "data": {"nfse": {...}}}`.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    status: String,
    code: u16,
    data: T,
}

#[derive(Debug, Serialize, Deserialize)]
struct NfseData<T> {
    nfse: T,
}

/// Path of the JSON file for an NFSe.
///
/// The file is named `<prefix><identifier>.json` and placed in `output_dir`,
/// or next to `input` when no directory is given. The directory is created
/// if needed. Characters outside `[A-Za-z0-9_-]` in the identifier become `_`
/// and the identifier is cut to [`MAX_IDENTIFIER_LEN`] characters.
pub fn output_path(
    input: &Path,
    identifier: &str,
    output_dir: Option<&Path>,
    prefix: &str,
) -> Result<PathBuf> {
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    if !dir.exists() {
        debug!("Creating output directory {}", dir.display());
        fs::create_dir_all(&dir)?;
    }

    Ok(dir.join(format!("{}{}.json", prefix, sanitize_identifier(identifier))))
}

/// Longest identifier kept in an output file name.
pub const MAX_IDENTIFIER_LEN: usize = 64;

fn sanitize_identifier(identifier: &str) -> String {
    let sanitized: String = identifier
        .trim()
        .chars()
        .take(MAX_IDENTIFIER_LEN)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// Write the NFSe wrapped in the success envelope.
pub fn save_json(nfse: &Nfse, path: &Path, pretty: bool) -> Result<()> {
    let envelope = Envelope {
        status: "success".to_string(),
        code: 200,
        data: NfseData { nfse },
    };

    let json = if pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    fs::write(path, json)?;
    Ok(())
}

/// Read an NFSe back from a file written by [`save_json`].
pub fn load_json(path: &Path) -> Result<Nfse> {
    let content = fs::read_to_string(path)?;
    let envelope: Envelope<NfseData<Nfse>> = serde_json::from_str(&content)?;
    if envelope.status != "success" {
        return Err(NfseError::Config(format!(
            "{}: unexpected status {:?} (code {})",
            path.display(),
            envelope.status,
            envelope.code
        )));
    }
    Ok(envelope.data.nfse)
}
