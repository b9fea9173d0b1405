mod test_support;

use serde_json::json;
use test_support::{four_band_key, request, request_err, request_ok, spawn_sidecar};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["scales"], 2);
    assert_eq!(health["gradingKeys"], 0);

    let methods: Vec<(&str, serde_json::Value)> = vec![
        ("setup.get", json!({})),
        ("gradingKeys.upsert", json!({ "key": four_band_key("k", 10.0) })),
        ("gradingKeys.preset", json!({ "id": "six", "preset": "sixGrade", "totalPoints": 60 })),
        ("gradingKeys.get", json!({ "id": "missing" })),
        ("gradingKeys.updateBoundaries", json!({ "id": "missing", "boundaries": [] })),
        ("grading.resolve", json!({ "keyId": "k", "totalPoints": 8 })),
        ("grading.pointsToNextGrade", json!({ "keyId": "k", "totalPoints": 8 })),
        ("lookupTables.upsert", json!({ "table": { "id": "t", "entries": [] } })),
        ("lookup.resolve", json!({ "tableId": "t", "context": {} })),
        ("scales.list", json!({})),
        ("scales.upsert", json!({})),
        ("alternative.toPoints", json!({ "symbol": "+", "maxPoints": 10 })),
        ("alternative.toSymbol", json!({ "points": 5, "maxPoints": 10 })),
        ("alternative.weightedAverage", json!({ "entries": [] })),
        ("criteria.aggregate", json!({ "criteria": [], "values": {} })),
        ("exams.define", json!({ "examId": "e", "tasks": [] })),
        ("exams.rollup", json!({ "examId": "e" })),
        ("exams.partScores", json!({ "correctionId": "missing" })),
        ("corrections.create", json!({})),
        ("corrections.start", json!({ "correctionId": "missing" })),
        ("corrections.setScore", json!({ "correctionId": "missing", "taskId": "t", "points": 1 })),
        ("corrections.setSymbol", json!({ "correctionId": "missing", "taskId": "t", "symbol": "+" })),
        ("corrections.clearScore", json!({ "correctionId": "missing", "taskId": "t" })),
        ("corrections.setComments", json!({ "correctionId": "missing", "comments": "x" })),
        ("corrections.complete", json!({ "correctionId": "missing" })),
        ("corrections.reopen", json!({ "correctionId": "missing" })),
        ("corrections.get", json!({ "correctionId": "missing" })),
        ("corrections.list", json!({})),
        ("corrections.summary", json!({ "examId": "e" })),
    ];
    for (i, (method, params)) in methods.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("m{}", i), method, params);
        if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            assert_ne!(
                resp.pointer("/error/code").and_then(|v| v.as_str()),
                Some("not_implemented"),
                "unexpected unknown method for {}",
                method
            );
        }
    }

    let unknown = request_err(&mut stdin, &mut reader, "99", "grades.explode", json!({}));
    assert_eq!(unknown["code"], "not_implemented");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_params_and_missing_ids_map_to_protocol_codes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let e = request_err(&mut stdin, &mut reader, "1", "grading.resolve", json!({ "keyId": "k" }));
    assert_eq!(e["code"], "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "grading.resolve",
        json!({ "keyId": "nope", "totalPoints": 3 }),
    );
    assert_eq!(e["code"], "not_found");
    assert_eq!(e["details"]["kind"], "gradingKey");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "gradingKeys.upsert",
        json!({ "key": {
            "id": "gap",
            "type": "percentage",
            "totalPoints": 10,
            "boundaries": [
                { "grade": "1", "minPercentage": 60, "maxPercentage": 100 },
                { "grade": "2", "minPercentage": 0, "maxPercentage": 50 }
            ]
        }}),
    );
    assert_eq!(e["code"], "configuration_error");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "exams.define",
        json!({ "examId": "e", "tasks": [
            { "id": "a", "level": 1, "points": 2, "children": ["ghost"] }
        ]}),
    );
    assert_eq!(e["code"], "structure_error");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "lookupTables.upsert",
        json!({ "table": { "id": "run", "entries": [
            { "key": { "distance": { "from": 0, "to": 1999 } }, "value": "4" }
        ]}}),
    );
    assert_eq!(e["code"], "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "lookupTables.upsert",
        json!({ "table": { "id": "run", "entries": [
            { "key": { "distance": {} }, "value": "4" }
        ]}}),
    );
    assert_eq!(e["code"], "configuration_error");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "lookupTables.upsert",
        json!({ "table": { "id": "run", "entries": [
            { "key": { "distance": { "min": 2000, "max": 2499 }, "gender": "m" }, "value": "3" },
            { "key": { "distance": { "min": 2000, "max": 2499 }, "age": 15 }, "value": "2" }
        ]}}),
    );
    let hit = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "lookup.resolve",
        json!({ "tableId": "run", "context": { "distance": 2200, "gender": "m" } }),
    );
    assert_eq!(hit["value"], "3");
    let e = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "lookup.resolve",
        json!({ "tableId": "run", "context": { "distance": 2200 } }),
    );
    assert_eq!(e["code"], "no_match");
}
