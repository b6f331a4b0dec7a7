//! Run directory writer.
//!
//! Persists one run's raw model answer and validated records:
//! ```text
//! <output_root>/<run_id>/
//! ├── run.json     manifest (run metadata, artifact checksums)
//! ├── raw.txt      the model's answer, verbatim
//! └── sites.json   validated records, pretty-printed JSON array
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use harvest_shared::{HarvestError, HeritageSite, Result, RunId, SchemaVersion};

/// Current format version of `run.json`.
pub const RUN_MANIFEST_VERSION: u32 = 1;

pub const RAW_FILE: &str = "raw.txt";
pub const SITES_FILE: &str = "sites.json";
pub const MANIFEST_FILE: &str = "run.json";

/// Descriptive metadata supplied by the caller.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub run_id: RunId,
    pub subject: Option<String>,
    pub model: String,
    pub schema: SchemaVersion,
    /// Number of elements the validator dropped.
    pub rejected_count: usize,
    pub tool_version: String,
}

/// Metadata for a single artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// The `run.json` structure stored at the root of each run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub model: String,
    pub schema: SchemaVersion,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    pub site_count: usize,
    pub rejected_count: usize,
    pub artifacts: Vec<ArtifactMeta>,
}

/// Output of [`write_run`].
#[derive(Debug, Clone)]
pub struct WrittenRun {
    pub run_dir: PathBuf,
    pub manifest: RunManifest,
}

/// A run read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub manifest: RunManifest,
    pub raw_text: String,
    pub sites: Vec<HeritageSite>,
}

/// Write the run directory under `output_root`.
#[instrument(skip_all, fields(run_id = %meta.run_id, sites = sites.len()))]
pub fn write_run(
    output_root: &Path,
    meta: &RunMeta,
    raw_text: &str,
    sites: &[HeritageSite],
) -> Result<WrittenRun> {
    let run_dir = output_root.join(meta.run_id.to_string());
    std::fs::create_dir_all(&run_dir).map_err(|e| HarvestError::io(&run_dir, e))?;

    info!(path = %run_dir.display(), "writing run artifacts");

    let sites_json = serde_json::to_string_pretty(sites)
        .map_err(|e| HarvestError::Serialization(format!("sites.json: {e}")))?;

    let artifacts = vec![
        write_atomic(&run_dir, RAW_FILE, raw_text)?,
        write_atomic(&run_dir, SITES_FILE, &sites_json)?,
    ];

    let manifest = RunManifest {
        manifest_version: RUN_MANIFEST_VERSION,
        run_id: meta.run_id.clone(),
        subject: meta.subject.clone(),
        model: meta.model.clone(),
        schema: meta.schema,
        tool_version: meta.tool_version.clone(),
        created_at: Utc::now(),
        site_count: sites.len(),
        rejected_count: meta.rejected_count,
        artifacts,
    };

    let manifest_json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| HarvestError::Serialization(format!("run.json: {e}")))?;
    write_atomic(&run_dir, MANIFEST_FILE, &manifest_json)?;

    info!(path = %run_dir.display(), "run artifacts written");

    Ok(WrittenRun { run_dir, manifest })
}

/// Read a run directory written by [`write_run`], verifying each artifact
/// against the checksum recorded in `run.json`.
pub fn load_run(run_dir: &Path) -> Result<LoadedRun> {
    let manifest_path = run_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(HarvestError::validation(format!(
            "no {MANIFEST_FILE} found in {}",
            run_dir.display()
        )));
    }

    let manifest: RunManifest = serde_json::from_str(&read(&manifest_path)?)
        .map_err(|e| HarvestError::validation(format!("invalid {MANIFEST_FILE}: {e}")))?;

    if manifest.manifest_version != RUN_MANIFEST_VERSION {
        return Err(HarvestError::validation(format!(
            "unsupported manifest_version: {} (expected {RUN_MANIFEST_VERSION})",
            manifest.manifest_version
        )));
    }

    let raw_text = read(&run_dir.join(RAW_FILE))?;
    let sites_json = read(&run_dir.join(SITES_FILE))?;
    verify_checksum(&manifest, RAW_FILE, &raw_text)?;
    verify_checksum(&manifest, SITES_FILE, &sites_json)?;

    let sites: Vec<HeritageSite> = serde_json::from_str(&sites_json)
        .map_err(|e| HarvestError::validation(format!("invalid {SITES_FILE}: {e}")))?;

    if sites.len() != manifest.site_count {
        return Err(HarvestError::validation(format!(
            "{SITES_FILE} holds {} records but {MANIFEST_FILE} says {}",
            sites.len(),
            manifest.site_count
        )));
    }

    Ok(LoadedRun {
        manifest,
        raw_text,
        sites,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write to a temp file, then rename over the target.
fn write_atomic(dir: &Path, filename: &str, content: &str) -> Result<ArtifactMeta> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&temp, content).map_err(|e| HarvestError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| HarvestError::io(&target, e))?;

    debug!(file = %filename, size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename: filename.to_string(),
        sha256: sha256_hex(content),
        size_bytes: content.len(),
    })
}

/// Compare `content` against the checksum `run.json` recorded for `filename`.
fn verify_checksum(manifest: &RunManifest, filename: &str, content: &str) -> Result<()> {
    let meta = manifest
        .artifacts
        .iter()
        .find(|a| a.filename == filename)
        .ok_or_else(|| {
            HarvestError::validation(format!("{MANIFEST_FILE} has no entry for {filename}"))
        })?;

    let actual = sha256_hex(content);
    if actual != meta.sha256 {
        warn!(file = %filename, expected = %meta.sha256, %actual, "checksum mismatch");
        return Err(HarvestError::validation(format!(
            "{filename} does not match its checksum in {MANIFEST_FILE}"
        )));
    }
    Ok(())
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))
}
