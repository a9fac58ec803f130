
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar, temp_dir};

fn seed_lessons(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    // totalTime is deliberately wrong in the payload; import recomputes it.
    let _ = request_ok(
        stdin,
        reader,
        "seed",
        "lessons.import",
        json!({
            "classId": "Year 3",
            "lessons": {
                "1": {
                    "grouped": {
                        "Singing": [
                            { "name": "Hello Song", "category": "Singing", "time": 10, "description": "<p>Stand in a circle.</p>" },
                        ],
                        "Rhythm": [
                            { "name": "Clap Along", "category": "Rhythm", "time": 5, "description": "" },
                        ],
                    },
                    "categoryOrder": ["Singing", "Rhythm"],
                    "totalTime": 999,
                },
                "2": {
                    "grouped": {
                        "Games": [
                            { "name": "Freeze Dance", "category": "Games", "time": 8, "description": "" },
                        ],
                    },
                    "categoryOrder": ["Games"],
                    "totalTime": 0,
                },
            },
        }),
    );
}

#[test]
fn import_recomputes_totals_and_feeds_the_catalog() {
    let workspace = temp_dir("plannerd-lesson-import");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_lessons(&mut stdin, &mut reader);

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.open",
        json!({ "classId": "Year 3", "lessonNumber": "1" }),
    );
    assert_eq!(
        opened.pointer("/lesson/totalTime").and_then(|v| v.as_i64()),
        Some(15)
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.list",
        json!({ "classId": "Year 3" }),
    );
    let summaries = listed.get("lessons").and_then(|v| v.as_array()).expect("lessons");
    assert_eq!(summaries.len(), 2);
    assert_eq!(
        summaries[0].get("title").and_then(|v| v.as_str()),
        Some("Lesson 1")
    );
    assert_eq!(
        summaries[0].get("activityCount").and_then(|v| v.as_u64()),
        Some(2)
    );

    // Imported activities are extracted into the shared catalog.
    let catalog = request_ok(&mut stdin, &mut reader, "4", "activities.list", json!({}));
    let names: Vec<&str> = catalog
        .get("activities")
        .and_then(|v| v.as_array())
        .expect("activities")
        .iter()
        .filter_map(|a| a.get("name").and_then(|v| v.as_str()))
        .collect();
    assert!(names.contains(&"Hello Song"));
    assert!(names.contains(&"Freeze Dance"));
}

#[test]
fn title_edits_change_the_display_title() {
    let workspace = temp_dir("plannerd-lesson-title");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_lessons(&mut stdin, &mut reader);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.updateTitle",
        json!({ "classId": "Year 3", "lessonNumber": "1", "title": "Welcome Week" }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.list",
        json!({ "classId": "Year 3" }),
    );
    let summaries = listed.get("lessons").and_then(|v| v.as_array()).expect("lessons");
    assert_eq!(
        summaries[0].get("title").and_then(|v| v.as_str()),
        Some("Welcome Week")
    );
}

#[test]
fn activity_edit_updates_total_and_misses_softly() {
    let workspace = temp_dir("plannerd-lesson-edit");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_lessons(&mut stdin, &mut reader);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.updateActivity",
        json!({
            "classId": "Year 3",
            "lessonNumber": "1",
            "category": "Singing",
            "name": "Hello Song",
            "fields": { "time": 20 },
        }),
    );
    assert_eq!(updated.get("updated").and_then(|v| v.as_bool()), Some(true));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.open",
        json!({ "classId": "Year 3", "lessonNumber": "1" }),
    );
    assert_eq!(
        opened.pointer("/lesson/totalTime").and_then(|v| v.as_i64()),
        Some(25)
    );

    // A stale reference is dropped with a warning, not an error.
    let missed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.updateActivity",
        json!({
            "classId": "Year 3",
            "lessonNumber": "1",
            "category": "Singing",
            "name": "Goodbye Song",
            "fields": { "time": 20 },
        }),
    );
    assert_eq!(missed.get("updated").and_then(|v| v.as_bool()), Some(false));
    assert!(missed.get("warning").and_then(|v| v.as_str()).is_some());
}

#[test]
fn deleting_a_lesson_scrubs_units_and_plans() {
    let workspace = temp_dir("plannerd-lesson-delete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_lessons(&mut stdin, &mut reader);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "units.create",
        json!({ "classId": "Year 3", "input": { "name": "Openers", "lessonNumbers": ["1", "2"] } }),
    );
    let unit_id = created
        .pointer("/unit/id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "plans.create",
        json!({ "date": "2024-09-02", "className": "Year 3" }),
    );
    let plan_id = plan
        .pointer("/plan/id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "plans.update",
        json!({ "planId": plan_id, "patch": { "lessonNumber": "1" } }),
    );

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "lessons.delete",
        json!({ "classId": "Year 3", "lessonNumber": "1" }),
    );
    assert_eq!(deleted.get("scrubbedUnits").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(deleted.get("scrubbedPlans").and_then(|v| v.as_u64()), Some(1));

    let unit = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "units.open",
        json!({ "classId": "Year 3", "unitId": unit_id }),
    );
    let numbers: Vec<&str> = unit
        .pointer("/unit/lessonNumbers")
        .and_then(|v| v.as_array())
        .expect("lessonNumbers")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(numbers, vec!["2"]);

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "plans.open",
        json!({ "planId": plan_id }),
    );
    assert!(opened.pointer("/plan/lessonNumber").map_or(true, |v| v.is_null()));
}

#[test]
fn delete_scrubs_plans_tagged_under_a_display_class_name() {
    let workspace = temp_dir("plannerd-lesson-delete-display");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_lessons(&mut stdin, &mut reader);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "units.create",
        json!({ "classId": "Year 3", "input": { "name": "Openers", "lessonNumbers": ["1"] } }),
    );
    let unit_id = created
        .pointer("/unit/id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    // The generated plan carries the display name, not the class id.
    let assigned = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "plans.assignUnit",
        json!({
            "classId": "Year 3",
            "unitId": unit_id,
            "startDate": "2024-09-02",
            "className": "Year 3 (Mrs Smith)",
        }),
    );
    assert_eq!(
        assigned
            .pointer("/plans/0/className")
            .and_then(|v| v.as_str()),
        Some("Year 3 (Mrs Smith)")
    );

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.delete",
        json!({ "classId": "Year 3", "lessonNumber": "1" }),
    );
    assert_eq!(deleted.get("scrubbedPlans").and_then(|v| v.as_u64()), Some(1));

    let day = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "plans.forDate",
        json!({ "date": "2024-09-02", "className": "Year 3 (Mrs Smith)" }),
    );
    let plans = day.get("plans").and_then(|v| v.as_array()).expect("plans");
    assert_eq!(plans.len(), 1);
    assert!(plans[0].get("lessonNumber").map_or(true, |v| v.is_null()));
    assert_eq!(plans[0].get("unitName").and_then(|v| v.as_str()), Some("Openers"));
}
