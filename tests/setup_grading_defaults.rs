mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, spawn_sidecar_with_env};

#[test]
fn setup_defaults_follow_environment() {
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[
        ("GRADINGD_DEFAULT_ROUNDING", "down:1"),
        ("GRADINGD_DEFAULT_SCALE", "simplified"),
    ]);
    let setup = request_ok(&mut stdin, &mut reader, "1", "setup.get", json!({}));
    assert_eq!(setup["grading"]["defaultRoundingType"], "down");
    assert_eq!(setup["grading"]["defaultDecimalPlaces"], 1);
    assert_eq!(setup["alternative"]["defaultScale"], "simplified");

    // simplified: '0' = 0.6
    let pts = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "alternative.toPoints",
        json!({ "symbol": "0", "maxPoints": 10 }),
    );
    assert_eq!(pts["points"], 6.0);
    assert_eq!(pts["scale"], "simplified");
}

#[test]
fn setup_update_validates_and_feeds_key_definitions() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let setup = request_ok(&mut stdin, &mut reader, "1", "setup.get", json!({}));
    assert_eq!(setup["grading"]["defaultRoundingType"], "nearest");
    assert_eq!(setup["grading"]["defaultDecimalPlaces"], 0);
    assert_eq!(setup["alternative"]["defaultScale"], "standard");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({ "section": "grading", "patch": { "defaultDecimalPlaces": 9 } }),
    );
    assert_eq!(e["code"], "bad_params");
    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "grading", "patch": { "color": "red" } }),
    );
    assert_eq!(e["code"], "bad_params");
    let e = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "alternative", "patch": { "defaultScale": "nope" } }),
    );
    assert_eq!(e["code"], "bad_params");
    let e = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(e["code"], "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "grading", "patch": { "defaultRoundingType": "UP", "defaultDecimalPlaces": 2 } }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "7", "setup.get", json!({}));
    assert_eq!(setup["grading"]["defaultRoundingType"], "up");
    assert_eq!(setup["grading"]["defaultDecimalPlaces"], 2);

    let preset = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "gradingKeys.preset",
        json!({ "id": "six", "preset": "sixGrade", "totalPoints": 60 }),
    );
    assert_eq!(preset["key"]["rounding"]["type"], "up");
    assert_eq!(preset["key"]["rounding"]["decimalPlaces"], 2);

    // 29.99 / 60 = 49.98333 % -> up:2 -> 49.99 -> still grade 5
    let r = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "grading.resolve",
        json!({ "keyId": "six", "totalPoints": 29.99 }),
    );
    assert_eq!(r["grade"], "5");
    assert_eq!(r["displayValue"], "poor");

    let next = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "grading.pointsToNextGrade",
        json!({ "keyId": "six", "totalPoints": 60 }),
    );
    assert!(next["pointsNeeded"].is_null());
}
