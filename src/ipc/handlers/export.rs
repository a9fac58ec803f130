use crate::calendar::HalfTerm;
use crate::export::{half_term_model, single_lesson_model};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::store::class_slug;
use serde_json::json;

/// Download name offered by the presentation layer: class plus a sanitized
/// title or period name.
fn file_name(class_id: &str, label: &str) -> String {
    format!("{}-{}.pdf", class_slug(class_id), class_slug(label))
}

fn handle_lesson_model(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let Some(lesson) = lessons.get(&number) else {
        return err(&req.id, "not_found", "lesson not found", None);
    };
    let registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let model = single_lesson_model(&number, lesson, &registry);
    let name = file_name(&class_id, &lesson.display_title(&number));
    ok(&req.id, json!({ "model": model, "fileName": name }))
}

fn handle_half_term_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term_raw = match required_str(req, "term") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(term) = HalfTerm::parse(&term_raw) else {
        return err(
            &req.id,
            "bad_params",
            "term must be one of A1, A2, SP1, SP2, SM1, SM2",
            None,
        );
    };
    let lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let registry = match store.categories(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let model = half_term_model(term, &lessons, &registry);
    let name = file_name(&class_id, term.display_name());
    ok(&req.id, json!({ "model": model, "fileName": name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.lessonModel" => Some(handle_lesson_model(state, req)),
        "export.halfTermModel" => Some(handle_half_term_model(state, req)),
        _ => None,
    }
}
