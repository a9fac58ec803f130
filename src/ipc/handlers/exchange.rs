use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value as JsonValue};
use std::path::PathBuf;

pub const DATABASE_FORMAT: &str = "planner-db-v1";

/// Full-database export: one tagged JSON document holding every stored key.
fn handle_database_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let keys = match store.keys() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let mut docs = Map::new();
    for key in keys {
        let raw = match store.load_raw(&key) {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
        };
        let value: JsonValue = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                return err(
                    &req.id,
                    "store_read_failed",
                    format!("stored document {} is not valid JSON: {}", key, e),
                    None,
                )
            }
        };
        docs.insert(key, value);
    }
    ok(
        &req.id,
        json!({
            "document": {
                "format": DATABASE_FORMAT,
                "docs": docs,
            }
        }),
    )
}

/// Import overwrites matching keys only, and only after the whole document
/// has validated; malformed input leaves the store untouched.
fn handle_database_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let Some(document) = req.params.get("document") else {
        return err(&req.id, "bad_params", "missing document", None);
    };
    let format = document.get("format").and_then(|v| v.as_str()).unwrap_or("");
    if format != DATABASE_FORMAT {
        return err(
            &req.id,
            "bad_format",
            format!("unsupported database format: {}", format),
            None,
        );
    }
    let Some(docs) = document.get("docs").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_format", "document missing docs object", None);
    };

    let mut staged: Vec<(String, String)> = Vec::with_capacity(docs.len());
    for (key, value) in docs {
        if key.trim().is_empty() {
            return err(&req.id, "bad_format", "docs contains an empty key", None);
        }
        let raw = match serde_json::to_string(value) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_format", e.to_string(), None),
        };
        staged.push((key.clone(), raw));
    }
    for (key, raw) in &staged {
        if let Err(e) = store.save_raw(key, raw) {
            return err(&req.id, "store_write_failed", e.to_string(), None);
        }
    }
    ok(&req.id, json!({ "imported": staged.len() }))
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    match backup::export_bundle(store, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "docCount": summary.doc_count,
                "outPath": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "backup_export_failed", format!("{e:#}"), None),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    // Verify the whole bundle (format tag + checksum) before writing.
    let summary = match backup::read_bundle(&in_path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_format", format!("{e:#}"), None),
    };
    for (key, raw) in &summary.docs {
        if let Err(e) = store.save_raw(key, raw) {
            return err(&req.id, "store_write_failed", e.to_string(), None);
        }
    }
    ok(
        &req.id,
        json!({
            "bundleFormat": summary.bundle_format_detected,
            "imported": summary.docs.len(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exchange.databaseExport" => Some(handle_database_export(state, req)),
        "exchange.databaseImport" => Some(handle_database_import(state, req)),
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
