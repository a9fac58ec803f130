use crate::ipc::error::{err, ok};
use crate::ipc::helpers::store_mut;
use crate::ipc::types::{AppState, Request};
use crate::model::{catalog_upsert, filter_and_sort, Activity, SortField};
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    match store.activities() {
        Ok(catalog) => ok(&req.id, json!({ "activities": catalog })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("activity") else {
        return err(&req.id, "bad_params", "missing activity", None);
    };
    let activity: Activity = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("activity: {}", e), None),
    };
    if activity.name.trim().is_empty() {
        return err(&req.id, "bad_params", "activity.name must not be empty", None);
    }
    if activity.time < 0 {
        return err(&req.id, "bad_params", "activity.time must be >= 0", None);
    }

    let mut catalog = match store.activities() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    catalog_upsert(&mut catalog, activity);
    if let Err(e) = store.save_activities(&catalog) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "count": catalog.len() }))
}

fn handle_query(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let query = req
        .params
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let category = req
        .params
        .get("category")
        .and_then(|v| v.as_str())
        .unwrap_or("all");
    let level = req
        .params
        .get("level")
        .and_then(|v| v.as_str())
        .unwrap_or("all");
    let sort_by = match req.params.get("sortBy").and_then(|v| v.as_str()) {
        None => SortField::Name,
        Some(raw) => match SortField::parse(raw) {
            Some(f) => f,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "sortBy must be one of: name, category, time, level",
                    None,
                )
            }
        },
    };
    let descending = match req.params.get("order").and_then(|v| v.as_str()) {
        None | Some("asc") => false,
        Some("desc") => true,
        Some(_) => return err(&req.id, "bad_params", "order must be asc or desc", None),
    };

    let catalog = match store.activities() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let hits = filter_and_sort(&catalog, query, category, level, sort_by, descending);
    ok(&req.id, json!({ "activities": hits }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "activities.list" => Some(handle_list(state, req)),
        "activities.upsert" => Some(handle_upsert(state, req)),
        "activities.query" => Some(handle_query(state, req)),
        _ => None,
    }
}
