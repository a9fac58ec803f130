
use serde_json::json;
use test_support::{request, request_ok, spawn_sidecar, temp_dir};

fn positions(result: &serde_json::Value) -> Vec<i64> {
    result
        .get("categories")
        .and_then(|v| v.as_array())
        .expect("categories")
        .iter()
        .map(|c| c.get("position").and_then(|v| v.as_i64()).expect("position"))
        .collect()
}

fn names(result: &serde_json::Value) -> Vec<String> {
    result
        .get("categories")
        .and_then(|v| v.as_array())
        .expect("categories")
        .iter()
        .map(|c| c.get("name").and_then(|v| v.as_str()).expect("name").to_string())
        .collect()
}

#[test]
fn registry_add_remove_reorder_keeps_positions_contiguous() {
    let workspace = temp_dir("plannerd-categories");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Fresh class reads the default seed.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "categories.list",
        json!({ "classId": "Year 3" }),
    );
    let seed_len = names(&listed).len();
    assert!(seed_len >= 4);
    assert_eq!(positions(&listed), (0..seed_len as i64).collect::<Vec<_>>());

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "categories.add",
        json!({ "classId": "Year 3", "name": "Composing", "color": "#123456" }),
    );
    assert_eq!(
        added.pointer("/category/position").and_then(|v| v.as_i64()),
        Some(seed_len as i64)
    );

    // Case-insensitive duplicate is rejected.
    let dup = request(
        &mut stdin,
        &mut reader,
        "4",
        "categories.add",
        json!({ "classId": "Year 3", "name": "COMPOSING", "color": "#000000" }),
    );
    assert_eq!(dup.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        dup.pointer("/error/code").and_then(|v| v.as_str()),
        Some("duplicate_name")
    );

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "categories.remove",
        json!({ "classId": "Year 3", "index": 1 }),
    );
    let pos = positions(&removed);
    assert_eq!(pos, (0..pos.len() as i64).collect::<Vec<_>>());

    let before = names(&removed);
    let reordered = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "categories.reorder",
        json!({
            "classId": "Year 3",
            "draggedName": "Composing",
            "targetName": before[0],
        }),
    );
    assert_eq!(names(&reordered)[0], "Composing");
    let pos = positions(&reordered);
    assert_eq!(pos, (0..pos.len() as i64).collect::<Vec<_>>());

    // Self-drop leaves the order alone.
    let same = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "categories.reorder",
        json!({
            "classId": "Year 3",
            "draggedName": "Composing",
            "targetName": "Composing",
        }),
    );
    assert_eq!(names(&same), names(&reordered));
}

#[test]
fn unknown_category_color_falls_back_instead_of_failing() {
    let workspace = temp_dir("plannerd-fallback");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let looked_up = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "categories.color",
        json!({ "classId": "Year 3", "name": "NonexistentCategory" }),
    );
    assert_eq!(
        looked_up.get("color").and_then(|v| v.as_str()),
        Some("#9E9E9E")
    );

    let known = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "categories.color",
        json!({ "classId": "Year 3", "name": "Singing" }),
    );
    assert_ne!(known.get("color").and_then(|v| v.as_str()), Some("#9E9E9E"));
}

#[test]
fn category_set_export_import_round_trips() {
    let workspace = temp_dir("plannerd-catset");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "categories.add",
        json!({ "classId": "Year 3", "name": "Composing", "color": "#123456" }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "categories.export",
        json!({ "classId": "Year 3" }),
    );
    let document = exported.get("document").cloned().expect("document");

    // Import the exported set into another class; registries now match.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "categories.import",
        json!({ "classId": "Year 4", "document": document }),
    );
    let a = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "categories.list",
        json!({ "classId": "Year 3" }),
    );
    let b = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "categories.list",
        json!({ "classId": "Year 4" }),
    );
    assert_eq!(a.get("categories"), b.get("categories"));

    // A wrong format tag is rejected and leaves the registry alone.
    let bad = request(
        &mut stdin,
        &mut reader,
        "7",
        "categories.import",
        json!({ "classId": "Year 4", "document": { "format": "something-else", "categories": [] } }),
    );
    assert_eq!(bad.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        bad.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_format")
    );
    let after = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "categories.list",
        json!({ "classId": "Year 4" }),
    );
    assert_eq!(a.get("categories"), after.get("categories"));

    // Reset returns the stock seed.
    let reset = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "categories.reset",
        json!({ "classId": "Year 3" }),
    );
    assert!(names(&reset).contains(&"Singing".to_string()));
}
