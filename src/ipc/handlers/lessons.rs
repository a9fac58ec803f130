use std::collections::BTreeMap;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::{catalog_upsert, ActivityFields, Lesson};
use crate::store::class_slug;
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let summaries: Vec<serde_json::Value> = lessons
        .iter()
        .map(|(number, lesson)| {
            json!({
                "lessonNumber": number,
                "title": lesson.display_title(number),
                "totalTime": lesson.total_time,
                "activityCount": lesson.activity_count(),
                "categoryOrder": lesson.category_order,
            })
        })
        .collect();
    ok(&req.id, json!({ "lessons": summaries }))
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
    let number = match required_str(req, "lessonNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    match lessons.get(&number) {
        Some(lesson) => ok(
            &req.id,
            json!({ "lessonNumber": number, "lesson": lesson }),
        ),
        None => err(&req.id, "not_found", "lesson not found", None),
    }
}

/// Replaces the class's lesson map wholesale. The payload is validated and
/// normalized in full before anything is written, and the contained
/// activities are extracted into the global catalog.
fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("lessons") else {
        return err(&req.id, "bad_params", "missing lessons", None);
    };
    let mut lessons: BTreeMap<String, Lesson> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_format", format!("lessons: {}", e), None),
    };
    for lesson in lessons.values_mut() {
        lesson.recompute();
    }

    let mut catalog = match store.activities() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    for lesson in lessons.values() {
        for acts in lesson.grouped.values() {
            for act in acts {
                if !act.name.trim().is_empty() {
                    catalog_upsert(&mut catalog, act.clone());
                }
            }
        }
    }

    if let Err(e) = store.save_lessons(&class_id, &lessons) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    if let Err(e) = store.save_activities(&catalog) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({ "lessonCount": lessons.len(), "catalogCount": catalog.len() }),
    )
}

fn handle_update_title(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let number = match required_str(req, "lessonNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(lesson) = lessons.get_mut(&number) else {
        return err(&req.id, "not_found", "lesson not found", None);
    };
    lesson.title = Some(title);
    if let Err(e) = store.save_lessons(&class_id, &lessons) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

/// Identity-match update. A missing category or activity does not fail the
/// call: the update is dropped and reported through `updated: false` plus a
/// warning, the documented soft-failure policy for stale references.
fn handle_update_activity(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let number = match required_str(req, "lessonNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let category = match required_str(req, "category") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let fields: ActivityFields = match req.params.get("fields") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", format!("fields: {}", e), None),
        },
        None => return err(&req.id, "bad_params", "missing fields", None),
    };

    let mut lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(lesson) = lessons.get_mut(&number) else {
        return err(&req.id, "not_found", "lesson not found", None);
    };
    if !lesson.update_activity(&category, &name, &fields) {
        return ok(
            &req.id,
            json!({
                "updated": false,
                "warning": format!(
                    "no activity {:?} in category {:?} of lesson {}; update dropped",
                    name, category, number
                ),
            }),
        );
    }
    if let Err(e) = store.save_lessons(&class_id, &lessons) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "updated": true }))
}

/// The explicit lesson-deletion path: removes the lesson and scrubs the
/// number from every unit and plan that references it.
fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let number = match required_str(req, "lessonNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    if lessons.remove(&number).is_none() {
        return err(&req.id, "not_found", "lesson not found", None);
    }

    let mut units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let mut scrubbed_units = 0usize;
    for unit in units.iter_mut() {
        let before = unit.lesson_numbers.len();
        unit.lesson_numbers.retain(|n| n != &number);
        if unit.lesson_numbers.len() != before {
            scrubbed_units += 1;
        }
    }

    let mut plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    // A plan can carry a display className that differs from the class id,
    // so match on the slug or on a unit tag belonging to this class.
    let slug = class_slug(&class_id);
    let unit_ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
    let mut scrubbed_plans = 0usize;
    for plan in plans.iter_mut() {
        if plan.lesson_number.as_deref() != Some(number.as_str()) {
            continue;
        }
        let same_class = class_slug(&plan.class_name) == slug
            || plan
                .unit_id
                .as_deref()
                .map_or(false, |id| unit_ids.contains(&id));
        if same_class {
            plan.lesson_number = None;
            scrubbed_plans += 1;
        }
    }

    if let Err(e) = store.save_lessons(&class_id, &lessons) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    if let Err(e) = store.save_units(&class_id, &units) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    if let Err(e) = store.save_plans(&plans) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({ "scrubbedUnits": scrubbed_units, "scrubbedPlans": scrubbed_plans }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lessons.list" => Some(handle_list(state, req)),
        "lessons.open" => Some(handle_open(state, req)),
        "lessons.import" => Some(handle_import(state, req)),
        "lessons.updateTitle" => Some(handle_update_title(state, req)),
        "lessons.updateActivity" => Some(handle_update_activity(state, req)),
        "lessons.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
