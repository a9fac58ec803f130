
use serde_json::json;
use test_support::{request, request_ok, spawn_sidecar, temp_dir};

fn names(result: &serde_json::Value) -> Vec<String> {
    result
        .get("activities")
        .and_then(|v| v.as_array())
        .expect("activities")
        .iter()
        .map(|a| a.get("name").and_then(|v| v.as_str()).expect("name").to_string())
        .collect()
}

#[test]
fn upsert_replaces_by_name_and_category_identity() {
    let workspace = temp_dir("plannerd-catalog");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "activities.upsert",
        json!({ "activity": { "name": "Hello Song", "category": "Singing", "time": 5, "description": "" } }),
    );
    assert_eq!(first.get("count").and_then(|v| v.as_u64()), Some(1));

    // Same identity: replaced, not duplicated.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "activities.upsert",
        json!({ "activity": { "name": "Hello Song", "category": "Singing", "time": 10, "description": "longer" } }),
    );
    assert_eq!(second.get("count").and_then(|v| v.as_u64()), Some(1));

    // Same name in another category is a distinct entry.
    let third = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "activities.upsert",
        json!({ "activity": { "name": "Hello Song", "category": "Warm Up", "time": 3, "description": "" } }),
    );
    assert_eq!(third.get("count").and_then(|v| v.as_u64()), Some(2));

    let listed = request_ok(&mut stdin, &mut reader, "5", "activities.list", json!({}));
    let singing = listed
        .get("activities")
        .and_then(|v| v.as_array())
        .expect("activities")
        .iter()
        .find(|a| a.get("category").and_then(|v| v.as_str()) == Some("Singing"))
        .expect("singing entry");
    assert_eq!(singing.get("time").and_then(|v| v.as_i64()), Some(10));
}

#[test]
fn upsert_rejects_blank_names_and_negative_times() {
    let workspace = temp_dir("plannerd-catalog-validate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for (id, activity) in [
        ("2", json!({ "name": "   ", "category": "Singing", "time": 5, "description": "" })),
        ("3", json!({ "name": "Hello Song", "category": "Singing", "time": -1, "description": "" })),
    ] {
        let resp = request(
            &mut stdin,
            &mut reader,
            id,
            "activities.upsert",
            json!({ "activity": activity }),
        );
        assert_eq!(
            resp.pointer("/error/code").and_then(|v| v.as_str()),
            Some("bad_params")
        );
    }
}

#[test]
fn query_filters_compose_and_sorting_is_stable() {
    let workspace = temp_dir("plannerd-query");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let seed = [
        json!({ "name": "Clap Along", "category": "Rhythm", "time": 5, "description": "" }),
        json!({ "name": "Echo Singing", "category": "Singing", "time": 10, "description": "call and response", "level": "KS1" }),
        json!({ "name": "clap patterns", "category": "Rhythm", "time": 5, "description": "" }),
        json!({ "name": "Drum Circle", "category": "Rhythm", "time": 12, "description": "", "level": "KS2" }),
    ];
    for (i, activity) in seed.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("2-{}", i),
            "activities.upsert",
            json!({ "activity": activity }),
        );
    }

    // Case-insensitive substring over name and description.
    let hits = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "activities.query",
        json!({ "query": "CLAP" }),
    );
    assert_eq!(names(&hits), vec!["Clap Along", "clap patterns"]);

    // Category and level filters narrow the result.
    let hits = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "activities.query",
        json!({ "category": "Rhythm", "level": "KS2" }),
    );
    assert_eq!(names(&hits), vec!["Drum Circle"]);

    // Ties on time keep catalog order; desc flips the comparison.
    let hits = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "activities.query",
        json!({ "category": "Rhythm", "sortBy": "time", "order": "desc" }),
    );
    assert_eq!(names(&hits), vec!["Drum Circle", "Clap Along", "clap patterns"]);

    // No hits is an ok response, not an error.
    let hits = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "activities.query",
        json!({ "query": "tuba" }),
    );
    assert_eq!(names(&hits).len(), 0);

    let bad = request(
        &mut stdin,
        &mut reader,
        "7",
        "activities.query",
        json!({ "sortBy": "popularity" }),
    );
    assert_eq!(
        bad.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
}
