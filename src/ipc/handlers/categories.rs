use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_usize, required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    category_color, normalize_positions, registry_add, registry_remove, registry_reorder, Category,
};
use serde_json::json;

pub const CATEGORY_SET_FORMAT: &str = "planner-categories-v1";

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store.categories(&class_id) {
        Ok(registry) => ok(&req.id, json!({ "categories": registry })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let color = match required_str(req, "color") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let added = match registry_add(&mut registry, &name, &color) {
        Ok(v) => v,
        Err(_) => {
            return err(
                &req.id,
                "duplicate_name",
                format!("category already exists: {}", name),
                None,
            )
        }
    };
    if let Err(e) = store.save_categories(&class_id, &registry) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "category": added }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match parse_usize(req.params.get("index"), "index") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let mut registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    if index >= registry.len() {
        return err(&req.id, "not_found", "category index out of range", None);
    }
    if let Some(name) = req.params.get("name").and_then(|v| v.as_str()) {
        let name = name.trim();
        if name.is_empty() {
            return err(&req.id, "bad_params", "name must not be empty", None);
        }
        let lowered = name.to_lowercase();
        let collides = registry
            .iter()
            .enumerate()
            .any(|(i, c)| i != index && c.name.to_lowercase() == lowered);
        if collides {
            return err(
                &req.id,
                "duplicate_name",
                format!("category already exists: {}", name),
                None,
            );
        }
        registry[index].name = name.to_string();
    }
    if let Some(color) = req.params.get("color").and_then(|v| v.as_str()) {
        registry[index].color = color.trim().to_string();
    }
    if let Err(e) = store.save_categories(&class_id, &registry) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "category": registry[index] }))
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let index = match parse_usize(req.params.get("index"), "index") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let mut registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(removed) = registry_remove(&mut registry, index) else {
        return err(&req.id, "not_found", "category index out of range", None);
    };
    if let Err(e) = store.save_categories(&class_id, &registry) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    // Activities referencing the removed name keep it; colour lookups for it
    // fall back to the default grey from here on.
    ok(&req.id, json!({ "removed": removed, "categories": registry }))
}

fn handle_reorder(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let dragged = match required_str(req, "draggedName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target = match required_str(req, "targetName") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    registry_reorder(&mut registry, &dragged, &target);
    if let Err(e) = store.save_categories(&class_id, &registry) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "categories": registry }))
}

fn handle_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let registry = Category::defaults();
    if let Err(e) = store.save_categories(&class_id, &registry) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "categories": registry }))
}

fn handle_color(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "color": category_color(&registry, &name) }))
}

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "document": {
                "format": CATEGORY_SET_FORMAT,
                "categories": registry,
            }
        }),
    )
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(document) = req.params.get("document") else {
        return err(&req.id, "bad_params", "missing document", None);
    };

    // Validate the whole document before touching the registry.
    let format = document.get("format").and_then(|v| v.as_str()).unwrap_or("");
    if format != CATEGORY_SET_FORMAT {
        return err(
            &req.id,
            "bad_format",
            format!("unsupported category set format: {}", format),
            None,
        );
    }
    let Some(raw) = document.get("categories") else {
        return err(&req.id, "bad_format", "document missing categories", None);
    };
    let mut registry: Vec<Category> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_format", format!("categories: {}", e), None),
    };
    normalize_positions(&mut registry);

    if let Err(e) = store.save_categories(&class_id, &registry) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "categories": registry }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "categories.list" => Some(handle_list(state, req)),
        "categories.add" => Some(handle_add(state, req)),
        "categories.update" => Some(handle_update(state, req)),
        "categories.remove" => Some(handle_remove(state, req)),
        "categories.reorder" => Some(handle_reorder(state, req)),
        "categories.reset" => Some(handle_reset(state, req)),
        "categories.color" => Some(handle_color(state, req)),
        "categories.export" => Some(handle_export(state, req)),
        "categories.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
