use crate::calendar::HalfTerm;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{now_ts, parse_opt_string, parse_string_array, required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::{unit_stats, Unit};
use serde_json::json;
use uuid::Uuid;

fn parse_term(v: Option<&serde_json::Value>) -> Result<Option<HalfTerm>, String> {
    match parse_opt_string(v).map_err(|m| format!("term {}", m))? {
        None => Ok(None),
        Some(raw) => match HalfTerm::parse(&raw) {
            Some(t) => Ok(Some(t)),
            None => Err(format!("term must be one of A1, A2, SP1, SP2, SM1, SM2; got {}", raw)),
        },
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store.units(&class_id) {
        Ok(units) => ok(&req.id, json!({ "units": units })),
        Err(e) => err(&req.id, "store_read_failed", e.to_string(), None),
    }
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    match units.into_iter().find(|u| u.id == unit_id) {
        Some(unit) => ok(&req.id, json!({ "unit": unit })),
        None => err(&req.id, "not_found", "unit not found", None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(input) = req.params.get("input").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing input", None);
    };
    let name = match input.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "input.name must not be empty", None),
    };
    let lesson_numbers = match parse_string_array(input.get("lessonNumbers")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("input.lessonNumbers {}", m), None),
    };
    if lesson_numbers.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "input.lessonNumbers must contain at least one lesson",
            None,
        );
    }
    let description = match parse_opt_string(input.get("description")) {
        Ok(v) => v.unwrap_or_default(),
        Err(m) => return err(&req.id, "bad_params", format!("input.description {}", m), None),
    };
    let color = match parse_opt_string(input.get("color")) {
        Ok(v) => v.unwrap_or_default(),
        Err(m) => return err(&req.id, "bad_params", format!("input.color {}", m), None),
    };
    let term = match parse_term(input.get("term")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let ts = now_ts();
    let mut unit = Unit {
        id: Uuid::new_v4().to_string(),
        name,
        description,
        lesson_numbers: Vec::new(),
        color,
        term,
        created_at: ts.clone(),
        updated_at: ts,
    };
    // Route through add_lessons so the initial selection is deduplicated too.
    unit.add_lessons(&lesson_numbers);

    let mut units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    units.push(unit.clone());
    if let Err(e) = store.save_units(&class_id, &units) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "unit": unit }))
}

fn handle_add_lessons(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let numbers = match parse_string_array(req.params.get("lessonNumbers")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("lessonNumbers {}", m), None),
    };

    let mut units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(unit) = units.iter_mut().find(|u| u.id == unit_id) else {
        return err(&req.id, "not_found", "unit not found", None);
    };
    unit.add_lessons(&numbers);
    unit.updated_at = now_ts();
    let snapshot = unit.clone();
    if let Err(e) = store.save_units(&class_id, &units) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "unit": snapshot }))
}

fn handle_move_lesson(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let number = match required_str(req, "lessonNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let up = match req.params.get("direction").and_then(|v| v.as_str()) {
        Some("up") => true,
        Some("down") => false,
        _ => return err(&req.id, "bad_params", "direction must be up or down", None),
    };

    let mut units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(unit) = units.iter_mut().find(|u| u.id == unit_id) else {
        return err(&req.id, "not_found", "unit not found", None);
    };
    let moved = unit.move_lesson(&number, up);
    if moved {
        unit.updated_at = now_ts();
    }
    let snapshot = unit.clone();
    if moved {
        if let Err(e) = store.save_units(&class_id, &units) {
            return err(&req.id, "store_write_failed", e.to_string(), None);
        }
    }
    ok(&req.id, json!({ "moved": moved, "unit": snapshot }))
}

/// Full-record replace keyed by the embedded id; `updatedAt` is stamped
/// here, not taken from the caller.
fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("unit") else {
        return err(&req.id, "bad_params", "missing unit", None);
    };
    let mut incoming: Unit = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("unit: {}", e), None),
    };
    if incoming.name.trim().is_empty() {
        return err(&req.id, "bad_params", "unit.name must not be empty", None);
    }
    if incoming.lesson_numbers.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "unit.lessonNumbers must contain at least one lesson",
            None,
        );
    }
    // Repeats in the submitted list collapse to their first occurrence.
    let mut deduped: Vec<String> = Vec::with_capacity(incoming.lesson_numbers.len());
    for n in incoming.lesson_numbers.drain(..) {
        if !deduped.contains(&n) {
            deduped.push(n);
        }
    }
    incoming.lesson_numbers = deduped;

    let mut units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(slot) = units.iter_mut().find(|u| u.id == incoming.id) else {
        return err(&req.id, "not_found", "unit not found", None);
    };
    incoming.created_at = slot.created_at.clone();
    incoming.updated_at = now_ts();
    *slot = incoming.clone();
    if let Err(e) = store.save_units(&class_id, &units) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "unit": incoming }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let unit_id = match required_str(req, "unitId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let before = units.len();
    units.retain(|u| u.id != unit_id);
    if units.len() == before {
        return err(&req.id, "not_found", "unit not found", None);
    }
    if let Err(e) = store.save_units(&class_id, &units) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    // Plans tagged with this unit keep its id/name; consumers resolve the
    // unit lazily and tolerate the miss.
    ok(&req.id, json!({ "ok": true }))
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let numbers = match parse_string_array(req.params.get("lessonNumbers")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("lessonNumbers {}", m), None),
    };
    let lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "stats": unit_stats(&lessons, &numbers) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "units.list" => Some(handle_list(state, req)),
        "units.open" => Some(handle_open(state, req)),
        "units.create" => Some(handle_create(state, req)),
        "units.addLessons" => Some(handle_add_lessons(state, req)),
        "units.moveLesson" => Some(handle_move_lesson(state, req)),
        "units.update" => Some(handle_update(state, req)),
        "units.delete" => Some(handle_delete(state, req)),
        "units.stats" => Some(handle_stats(state, req)),
        _ => None,
    }
}
