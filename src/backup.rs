use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::store::Store;

const MANIFEST_ENTRY: &str = "manifest.json";
const DOCS_PREFIX: &str = "docs/";
pub const BUNDLE_FORMAT_V1: &str = "planner-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub doc_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub docs: Vec<(String, String)>,
}

/// Digest over every document in key order; lets import refuse a bundle
/// whose entries were edited or truncated after export.
fn content_checksum(docs: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    for (key, raw) in docs {
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(raw.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

pub fn export_bundle(store: &Store, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let mut docs: Vec<(String, String)> = Vec::new();
    for key in store.keys()? {
        if let Some(raw) = store.load_raw(&key)? {
            docs.push((key, raw));
        }
    }
    docs.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "checksum": content_checksum(&docs),
        "keys": docs.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (key, raw) in &docs {
        zip.start_file(format!("{}{}.json", DOCS_PREFIX, key), opts)
            .with_context(|| format!("failed to start entry for {}", key))?;
        zip.write_all(raw.as_bytes())
            .with_context(|| format!("failed to write entry for {}", key))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        doc_count: docs.len(),
    })
}

/// Reads and verifies a bundle without touching any store; the caller only
/// writes the returned documents once the whole bundle has checked out.
pub fn read_bundle(in_path: &Path) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut docs: Vec<(String, String)> = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("failed to read zip entry")?;
        let name = entry.name().to_string();
        let Some(rest) = name.strip_prefix(DOCS_PREFIX) else {
            continue;
        };
        let Some(key) = rest.strip_suffix(".json") else {
            continue;
        };
        let mut raw = String::new();
        entry
            .read_to_string(&mut raw)
            .with_context(|| format!("failed to read entry {}", name))?;
        docs.push((key.to_string(), raw));
    }
    docs.sort_by(|a, b| a.0.cmp(&b.0));

    let expected = manifest
        .get("checksum")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let actual = content_checksum(&docs);
    if expected != actual {
        return Err(anyhow!("bundle checksum mismatch"));
    }

    Ok(ImportSummary {
        bundle_format_detected: format.to_string(),
        docs,
    })
}
