use crate::calendar;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_usize, required_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::{Activity, LessonPlan, PlanStatus};
use serde_json::json;

fn handle_for_date(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let date = match required_str(req, "date") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let hits: Vec<&LessonPlan> = plans
        .iter()
        .filter(|p| p.matches_day(&date, &class_name))
        .collect();
    ok(&req.id, json!({ "plans": hits }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let date = match required_str(req, "date") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if calendar::parse_date(&date).is_none() {
        return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None);
    }

    let plan = LessonPlan::new_for_date(&date, &class_name);
    let mut plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    plans.push(plan.clone());
    if let Err(e) = store.save_plans(&plans) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "plan": plan }))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    match plans.iter().find(|p| p.id == plan_id) {
        Some(plan) => ok(&req.id, json!({ "plan": plan })),
        None => err(&req.id, "not_found", "plan not found", None),
    }
}

/// Load-mutate-save around one plan; every activity mutation keeps the
/// duration invariant inside the same write.
fn with_plan(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&mut LessonPlan) -> Result<serde_json::Value, serde_json::Value>,
) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(plan) = plans.iter_mut().find(|p| p.id == plan_id) else {
        return err(&req.id, "not_found", "plan not found", None);
    };
    let result = match f(plan) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = store.save_plans(&plans) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, result)
}

fn handle_add_activity(state: &mut AppState, req: &Request) -> serde_json::Value {
    let activity: Activity = match req.params.get("activity") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", format!("activity: {}", e), None),
        },
        None => return err(&req.id, "bad_params", "missing activity", None),
    };
    if activity.name.trim().is_empty() {
        return err(&req.id, "bad_params", "activity.name must not be empty", None);
    }
    with_plan(state, req, |plan| {
        let instance_id = plan.add_activity(activity).instance_id.clone();
        Ok(json!({ "instanceId": instance_id, "duration": plan.duration }))
    })
}

fn handle_remove_activity(state: &mut AppState, req: &Request) -> serde_json::Value {
    let index = match parse_usize(req.params.get("index"), "index") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let req_id = req.id.clone();
    with_plan(state, req, |plan| {
        let Some(removed) = plan.remove_activity(index) else {
            return Err(err(&req_id, "not_found", "activity index out of range", None));
        };
        Ok(json!({ "removed": removed, "duration": plan.duration }))
    })
}

fn handle_reorder_activity(state: &mut AppState, req: &Request) -> serde_json::Value {
    let from = match parse_usize(req.params.get("fromIndex"), "fromIndex") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let to = match parse_usize(req.params.get("toIndex"), "toIndex") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    with_plan(state, req, |plan| {
        let moved = plan.reorder_activity(from, to);
        Ok(json!({ "moved": moved, "duration": plan.duration }))
    })
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let patch = patch.clone();
    let req_id = req.id.clone();
    with_plan(state, req, move |plan| {
        for (k, v) in &patch {
            match k.as_str() {
                "notes" => {
                    let Some(s) = v.as_str() else {
                        return Err(err(&req_id, "bad_params", "patch.notes must be string", None));
                    };
                    plan.notes = s.to_string();
                }
                "status" => {
                    // Any status may move to any other; there is no
                    // forward-only constraint.
                    let parsed = v.as_str().and_then(PlanStatus::parse);
                    let Some(status) = parsed else {
                        return Err(err(
                            &req_id,
                            "bad_params",
                            "patch.status must be planned, completed or cancelled",
                            None,
                        ));
                    };
                    plan.status = status;
                }
                "title" => {
                    if v.is_null() {
                        plan.title = None;
                    } else if let Some(s) = v.as_str() {
                        plan.title = Some(s.to_string());
                    } else {
                        return Err(err(
                            &req_id,
                            "bad_params",
                            "patch.title must be string or null",
                            None,
                        ));
                    }
                }
                "className" => {
                    let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                        return Err(err(
                            &req_id,
                            "bad_params",
                            "patch.className must not be empty",
                            None,
                        ));
                    };
                    plan.class_name = s.to_string();
                }
                "date" => {
                    let parsed = v.as_str().and_then(calendar::parse_date);
                    let Some(date) = parsed else {
                        return Err(err(
                            &req_id,
                            "bad_params",
                            "patch.date must be YYYY-MM-DD",
                            None,
                        ));
                    };
                    plan.date = date.format("%Y-%m-%d").to_string();
                    plan.week = calendar::week_number(date);
                }
                "unitId" => {
                    if v.is_null() {
                        plan.unit_id = None;
                    } else if let Some(s) = v.as_str() {
                        plan.unit_id = Some(s.to_string());
                    } else {
                        return Err(err(
                            &req_id,
                            "bad_params",
                            "patch.unitId must be string or null",
                            None,
                        ));
                    }
                }
                "unitName" => {
                    if v.is_null() {
                        plan.unit_name = None;
                    } else if let Some(s) = v.as_str() {
                        plan.unit_name = Some(s.to_string());
                    } else {
                        return Err(err(
                            &req_id,
                            "bad_params",
                            "patch.unitName must be string or null",
                            None,
                        ));
                    }
                }
                "lessonNumber" => {
                    if v.is_null() {
                        plan.lesson_number = None;
                    } else if let Some(s) = v.as_str() {
                        plan.lesson_number = Some(s.trim().to_string());
                    } else {
                        return Err(err(
                            &req_id,
                            "bad_params",
                            "patch.lessonNumber must be string or null",
                            None,
                        ));
                    }
                }
                "term" => {
                    if v.is_null() {
                        plan.term = None;
                    } else {
                        let parsed = v.as_str().and_then(calendar::HalfTerm::parse);
                        let Some(term) = parsed else {
                            return Err(err(
                                &req_id,
                                "bad_params",
                                "patch.term must be a half-term code or null",
                                None,
                            ));
                        };
                        plan.term = Some(term);
                    }
                }
                _ => {
                    return Err(err(
                        &req_id,
                        "bad_params",
                        format!("unknown patch field: {}", k),
                        None,
                    ))
                }
            }
        }
        Ok(json!({ "plan": plan }))
    })
}

/// One plan per unit lesson, on consecutive calendar days from the start
/// date. Every generated plan carries the unit tag and the week number of
/// the start date; lesson content is materialized where the lesson exists.
fn handle_assign_unit(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let start_raw = match required_str(req, "startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(start) = calendar::parse_date(&start_raw) else {
        return err(&req.id, "bad_params", "startDate must be YYYY-MM-DD", None);
    };
    let class_name = req
        .params
        .get("className")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| class_id.clone());

    let units = match store.units(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(unit) = units.into_iter().find(|u| u.id == unit_id) else {
        return err(&req.id, "not_found", "unit not found", None);
    };
    let lessons = match store.lessons(&class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };

    let week = calendar::week_number(start);
    let mut created: Vec<LessonPlan> = Vec::with_capacity(unit.lesson_numbers.len());
    for (idx, number) in unit.lesson_numbers.iter().enumerate() {
        let date = calendar::shift_days(start, idx as i64)
            .format("%Y-%m-%d")
            .to_string();
        let mut plan = LessonPlan::new_for_date(&date, &class_name);
        plan.week = week;
        plan.unit_id = Some(unit.id.clone());
        plan.unit_name = Some(unit.name.clone());
        plan.lesson_number = Some(number.clone());
        plan.term = unit
            .term
            .or_else(|| calendar::half_term_for_lesson(number))
            .or(Some(calendar::half_term_for_date(start)));
        if let Some(lesson) = lessons.get(number) {
            plan.title = Some(lesson.display_title(number));
            for cat in &lesson.category_order {
                if let Some(acts) = lesson.grouped.get(cat) {
                    for act in acts {
                        plan.add_activity(act.clone());
                    }
                }
            }
        }
        created.push(plan);
    }

    let mut plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    plans.extend(created.iter().cloned());
    if let Err(e) = store.save_plans(&plans) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "plans": created }))
}

/// Delete returns the removed record so dependent views can update without
/// a second fetch.
fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let plan_id = match required_str(req, "planId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };
    let Some(pos) = plans.iter().position(|p| p.id == plan_id) else {
        return err(&req.id, "not_found", "plan not found", None);
    };
    let removed = plans.remove(pos);
    if let Err(e) = store.save_plans(&plans) {
        return err(&req.id, "store_write_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "removed": removed }))
}

fn handle_month_grid(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let year = match req.params.get("year").and_then(|v| v.as_i64()) {
        Some(v) => v as i32,
        None => return err(&req.id, "bad_params", "missing year", None),
    };
    let month = match req.params.get("month").and_then(|v| v.as_u64()) {
        Some(v @ 1..=12) => v as u32,
        _ => return err(&req.id, "bad_params", "month must be in 1..=12", None),
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let Some(cells) = calendar::month_grid(year, month) else {
        return err(&req.id, "bad_params", "invalid year/month", None);
    };
    let plans = match store.plans() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "store_read_failed", e.to_string(), None),
    };

    use chrono::Datelike;
    let grid: Vec<serde_json::Value> = cells
        .iter()
        .map(|day| {
            let date = day.format("%Y-%m-%d").to_string();
            let day_plans: Vec<&LessonPlan> = plans
                .iter()
                .filter(|p| p.matches_day(&date, &class_name))
                .collect();
            json!({
                "date": date,
                "inMonth": day.month() == month,
                "plans": day_plans,
            })
        })
        .collect();
    ok(&req.id, json!({ "cells": grid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "plans.forDate" => Some(handle_for_date(state, req)),
        "plans.create" => Some(handle_create(state, req)),
        "plans.open" => Some(handle_open(state, req)),
        "plans.addActivity" => Some(handle_add_activity(state, req)),
        "plans.removeActivity" => Some(handle_remove_activity(state, req)),
        "plans.reorderActivity" => Some(handle_reorder_activity(state, req)),
        "plans.update" => Some(handle_update(state, req)),
        "plans.assignUnit" => Some(handle_assign_unit(state, req)),
        "plans.delete" => Some(handle_delete(state, req)),
        "calendar.monthGrid" => Some(handle_month_grid(state, req)),
        _ => None,
    }
}
