//! Evidence bundle metadata and output helpers.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::scenario::Timing;

/// Tool version emitted in evidence metadata.
pub(crate) const TOOL_VERSION: &str = "0.1.0";

/// Evidence directory name used under the output root.
pub(crate) const EVIDENCE_DIR: &str = "evidence";

/// Verification report written for each run.
#[derive(Serialize)]
pub(crate) struct Report {
    pub(crate) tool_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) scenario_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) scenario_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<MessageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) timing: Option<Timing>,
    pub(crate) outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) digest: Option<DigestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cycles: Option<u64>,
}

/// Message identity recorded in the report.
#[derive(Serialize)]
pub(crate) struct MessageReport {
    pub(crate) bytes: u64,
    pub(crate) sha256: String,
}

/// Expected and reconstructed digests, recorded whenever both exist.
#[derive(Serialize)]
pub(crate) struct DigestReport {
    pub(crate) expected: String,
    pub(crate) actual: String,
}

/// Error report recorded when a run fails.
#[derive(Serialize)]
pub(crate) struct ErrorReport {
    pub(crate) code: String,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) details: Vec<String>,
}

/// Outcome classification for a verification run.
#[derive(Serialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Outcome {
    SchemaInvalid,
    TypeMismatch,
    PaddingInvariant,
    ProtocolTimeout,
    Cancelled,
    VerifyFailed,
    Verified,
}

/// Hash raw bytes and return a lowercase hex string.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Create a unique evidence directory for this run.
pub(crate) fn create_evidence_dir(
    out_dir: &Path,
    scenario_hash: Option<&str>,
    label: Option<&str>,
) -> Result<PathBuf> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let label = label
        .map(sanitize_label)
        .unwrap_or_else(|| "run".to_string());
    let hash = scenario_hash.unwrap_or("unknown");
    let short_hash = if hash.len() > 12 { &hash[..12] } else { hash };
    let run_id = format!("{label}-{short_hash}-{ts}");
    let path = out_dir.join(EVIDENCE_DIR).join(run_id);
    fs::create_dir_all(&path).context("create evidence dir")?;
    Ok(path)
}

fn sanitize_label(label: &str) -> String {
    let mut sanitized = String::new();
    let mut last_sep = false;
    for ch in label.trim().chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' {
            if last_sep {
                continue;
            }
            last_sep = true;
        } else {
            last_sep = false;
        }
        sanitized.push(mapped);
        if sanitized.len() >= 32 {
            break;
        }
    }
    while sanitized.ends_with('_') {
        sanitized.pop();
    }
    if sanitized.is_empty() {
        "run".to_string()
    } else {
        sanitized
    }
}

/// Serialize and write `report.json` into the evidence directory.
pub(crate) fn write_report(path: &Path, report: Report) -> Result<()> {
    let json = serde_json::to_vec_pretty(&report).context("serialize report.json")?;
    fs::write(path.join("report.json"), json).context("write report.json")?;
    Ok(())
}
