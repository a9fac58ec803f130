use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::DisplaySettings;
use crate::store::{FileStorage, Store};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// SHA-256 of the single hardcoded admin passcode. There is no user table;
/// this gate only guards destructive screens in the presentation layer.
const ADMIN_PASSCODE_DIGEST: &str =
    "0380db97ec507816cb2435f11d56f1bfe151dea2ae25a75859e9b2f0417dda5b";

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match FileStorage::open(&path) {
        Ok(adapter) => {
            state.workspace = Some(path.clone());
            state.store = Some(Store::new(Box::new(adapter)));
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "store_open_failed", format!("{e:?}"), None),
    }
}

fn handle_admin_verify(req: &Request) -> serde_json::Value {
    let passcode = match required_str(req, "passcode") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let digest = format!("{:x}", Sha256::digest(passcode.as_bytes()));
    ok(&req.id, json!({ "admin": digest == ADMIN_PASSCODE_DIGEST }))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    match store.settings() {
        Ok(settings) => ok(&req.id, json!({ "settings": settings })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let mut settings = match store.settings() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    for (k, v) in patch {
        match k.as_str() {
            "logoUrl" => settings.logo_url = v.as_str().map(|s| s.to_string()),
            "primaryColor" => settings.primary_color = v.as_str().map(|s| s.to_string()),
            "secondaryColor" => settings.secondary_color = v.as_str().map(|s| s.to_string()),
            "customTheme" => {
                let Some(b) = v.as_bool() else {
                    return err(&req.id, "bad_params", "patch.customTheme must be boolean", None);
                };
                settings.custom_theme = b;
            }
            _ => return err(&req.id, "bad_params", format!("unknown patch field: {}", k), None),
        }
    }
    if !settings.custom_theme {
        // Stock theme wipes any saved custom colours.
        let defaults = DisplaySettings {
            logo_url: settings.logo_url.clone(),
            ..DisplaySettings::default()
        };
        settings = defaults;
    }
    if let Err(e) = store.save_settings(&settings) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "settings": settings }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "admin.verify" => Some(handle_admin_verify(req)),
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
