//! File ingestion and inventory type inference.
//!
//! Each submitted file is retrieved (HTTP download or local copy),
//! persisted under the session working directory, parsed as tabular data,
//! and classified as hardware or software inventory. A file that fails to
//! download or parse is logged and skipped; the run continues with
//! whatever tables it has.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ClassifierRules;
use crate::error::{Error, Result};
use crate::session::{Session, SubmittedFile};
use crate::table::Table;

/// Closed inventory classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryKind {
    Hardware,
    Software,
}

impl InventoryKind {
    pub fn label(&self) -> &'static str {
        match self {
            InventoryKind::Hardware => "hardware",
            InventoryKind::Software => "software",
        }
    }
}

/// Output of ingesting a session's files: one table per kind, each
/// possibly empty, plus the files that were skipped.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub hardware: Table,
    pub software: Table,
    pub skipped: Vec<(String, Error)>,
    /// Whether any file classified to each kind, even if it had zero rows.
    /// Distinguishes "inventory provided but empty" from "none provided".
    pub hardware_submitted: bool,
    pub software_submitted: bool,
}

/// Ingest every submitted file in submission order.
pub async fn ingest_files(
    session: &Session,
    client: &reqwest::Client,
    rules: &ClassifierRules,
    download_timeout: Duration,
) -> Result<IngestOutcome> {
    let workdir = session.workdir()?.to_path_buf();
    let mut outcome = IngestOutcome::default();

    for file in &session.files {
        let local = match retrieve(client, file, &workdir, download_timeout).await {
            Ok(path) => path,
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "skipping file: retrieval failed");
                outcome.skipped.push((file.file_name.clone(), e));
                continue;
            }
        };

        let table = match Table::from_csv_path(&local) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "skipping file: parse failed");
                outcome.skipped.push((file.file_name.clone(), e));
                continue;
            }
        };

        let kind = classify(
            file.declared_type.as_deref(),
            table.columns(),
            &file.file_name,
            rules,
            outcome.hardware_submitted,
        );
        info!(
            file = %file.file_name,
            kind = kind.label(),
            rows = table.row_count(),
            "classified inventory file"
        );

        match kind {
            InventoryKind::Hardware => {
                outcome.hardware.append(&table);
                outcome.hardware_submitted = true;
            }
            InventoryKind::Software => {
                outcome.software.append(&table);
                outcome.software_submitted = true;
            }
        }
    }

    Ok(outcome)
}

/// Fetch a file's bytes into the session working directory under its
/// original (basename-only) name.
async fn retrieve(
    client: &reqwest::Client,
    file: &SubmittedFile,
    workdir: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    let name = Path::new(&file.file_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Validation(format!("invalid file name: {}", file.file_name)))?;
    let dest = workdir.join(name);

    if file.file_url.starts_with("http://") || file.file_url.starts_with("https://") {
        let response = client
            .get(&file.file_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::DownloadFailed {
                url: file.file_url.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(Error::DownloadFailed {
                url: file.file_url.clone(),
                reason: format!("status {}", response.status()),
            });
        }
        let bytes = response.bytes().await.map_err(|e| Error::DownloadFailed {
            url: file.file_url.clone(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(&dest, &bytes).await?;
    } else {
        // Treated as a local path; bytes are copied verbatim.
        tokio::fs::copy(&file.file_url, &dest)
            .await
            .map_err(|e| Error::DownloadFailed {
                url: file.file_url.clone(),
                reason: e.to_string(),
            })?;
    }
    debug!(dest = %dest.display(), "persisted inventory file");
    Ok(dest)
}

/// Classify one file. Precedence: declared type, header signals, filename
/// keywords, then the ordinal fallback (first unsignaled file becomes
/// hardware unless a hardware table already exists).
pub fn classify(
    declared_type: Option<&str>,
    headers: &[String],
    file_name: &str,
    rules: &ClassifierRules,
    hardware_seen: bool,
) -> InventoryKind {
    if let Some(declared) = declared_type {
        let declared = declared.trim().to_lowercase();
        if rules.hardware_types.iter().any(|t| *t == declared) {
            return InventoryKind::Hardware;
        }
        if rules.software_types.iter().any(|t| *t == declared) {
            return InventoryKind::Software;
        }
    }

    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    if normalized
        .iter()
        .any(|h| rules.hardware_headers.iter().any(|s| s == h))
    {
        return InventoryKind::Hardware;
    }
    if normalized
        .iter()
        .any(|h| rules.software_headers.iter().any(|s| s == h))
    {
        return InventoryKind::Software;
    }
    // Last-resort header signal: any id-suffixed column reads as a device
    // register.
    if normalized.iter().any(|h| h.ends_with("id")) {
        return InventoryKind::Hardware;
    }

    let lower_name = file_name.to_lowercase();
    if rules
        .hardware_filename_hints
        .iter()
        .any(|k| lower_name.contains(k.as_str()))
    {
        return InventoryKind::Hardware;
    }
    if rules
        .software_filename_hints
        .iter()
        .any(|k| lower_name.contains(k.as_str()))
    {
        return InventoryKind::Software;
    }

    if hardware_seen {
        InventoryKind::Software
    } else {
        InventoryKind::Hardware
    }
}
