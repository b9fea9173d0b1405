use std::collections::HashMap;

use gradingd::alternative::WeightedSymbol;
use gradingd::lookup::TableEntry;
use gradingd::presets::standard_scale;
use gradingd::{
    lookup, lookup_points, to_points, to_symbol, weighted_average, ContextValue,
    CorrectionRecorder, CorrectionStatus, DimensionMatcher, GradeBoundary, GradingError,
    GradingKey, GradingKeyType, LookupTable, LookupValue, RoundingRule, TaskNode, TaskTree,
};

fn school_key(total_points: f64) -> GradingKey {
    GradingKey::new(
        "school",
        "School grades",
        GradingKeyType::Percentage,
        total_points,
        vec![
            GradeBoundary::new("1", 90.0, 100.0),
            GradeBoundary::new("2", 75.0, 89.99),
            GradeBoundary::new("3", 50.0, 74.99),
            GradeBoundary::new("4", 0.0, 49.99),
        ],
        RoundingRule::default(),
    )
    .expect("valid key")
}

#[test]
fn percentage_key_rounds_before_boundary_lookup() {
    let key = school_key(100.0);
    assert_eq!(key.resolve_grade(75.0).expect("resolve").grade, "2");
    assert_eq!(key.resolve_grade(74.6).expect("resolve").grade, "2");
    assert_eq!(key.resolve_grade(74.4).expect("resolve").grade, "3");
    assert_eq!(key.resolve_grade(100.0).expect("resolve").grade, "1");
    assert_eq!(key.resolve_grade(0.0).expect("resolve").grade, "4");
}

#[test]
fn standard_scale_conversions() {
    let scale = standard_scale();
    assert_eq!(to_points("+", 100.0, &scale), Ok(85.0));
    assert_eq!(to_points("+", 50.0, &scale), Ok(43.0));
    assert!(matches!(
        to_points("+++", 10.0, &scale),
        Err(GradingError::UnknownSymbol { .. })
    ));

    for symbol in scale.symbols() {
        let points = to_points(symbol, 100.0, &scale).expect("known symbol");
        assert_eq!(to_symbol(points, 100.0, &scale), symbol);
    }

    let avg = weighted_average(
        &[WeightedSymbol::new("++", 2.0), WeightedSymbol::new("0", 1.0)],
        &scale,
    )
    .expect("average");
    assert!((avg - (1.0 * 2.0 + 0.65) / 3.0).abs() < 1e-12);
    assert_eq!(weighted_average(&[], &scale), Ok(0.0));
}

fn run_table() -> LookupTable {
    LookupTable::new(
        "run-3000",
        "3000 m run",
        vec![
            TableEntry::new(LookupValue::Grade("4".into()))
                .with("distance", DimensionMatcher::range(Some(0.0), Some(1999.0)))
                .with("gender", DimensionMatcher::exact("m")),
            TableEntry::new(LookupValue::Grade("3".into()))
                .with("distance", DimensionMatcher::range(Some(2000.0), Some(2499.0)))
                .with("gender", DimensionMatcher::exact("m")),
        ],
    )
    .expect("valid table")
}

fn context(pairs: &[(&str, ContextValue)]) -> HashMap<String, ContextValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn fitness_table_resolves_first_match_or_fails_loudly() {
    let table = run_table();
    let hit = lookup(
        &table,
        &context(&[("distance", 2200.0.into()), ("gender", "m".into())]),
    );
    assert_eq!(hit, Ok(&LookupValue::Grade("3".into())));

    let miss = lookup(
        &table,
        &context(&[("distance", 2200.0.into()), ("gender", "w".into())]),
    );
    assert_eq!(
        miss,
        Err(GradingError::NoMatch {
            table_id: "run-3000".into()
        })
    );
}

#[test]
fn points_table_feeds_a_points_key() {
    let table = LookupTable::new(
        "long-jump",
        "Long jump points",
        vec![
            TableEntry::new(LookupValue::Points(15.0))
                .with("meters", DimensionMatcher::range(Some(5.0), None)),
            TableEntry::new(LookupValue::Points(10.0))
                .with("meters", DimensionMatcher::range(Some(4.0), Some(4.99))),
            TableEntry::new(LookupValue::Points(5.0))
                .with("meters", DimensionMatcher::range(None, Some(3.99))),
        ],
    )
    .expect("valid table");
    let key = GradingKey::new(
        "pts",
        "Points",
        GradingKeyType::Points,
        15.0,
        vec![
            GradeBoundary::new("A", 80.0, 100.0),
            GradeBoundary::new("B", 50.0, 79.99),
            GradeBoundary::new("C", 0.0, 49.99),
        ],
        RoundingRule::none(),
    )
    .expect("valid key");

    let points = lookup_points(&table, &context(&[("meters", 4.5.into())])).expect("points");
    assert_eq!(points, 10.0);
    assert_eq!(key.resolve_grade(points).expect("grade").grade, "B");
}

#[test]
fn three_level_tree_rolls_up() {
    let tree = TaskTree::build(vec![
        TaskNode::new("root", 1, 0.0).with_children(["a"]),
        TaskNode::new("a", 2, 5.0).with_parent("root").with_children(["g"]),
        TaskNode::new("g", 3, 3.0).with_parent("a"),
    ])
    .expect("valid tree");
    let rollup = tree.rollup();
    assert_eq!(rollup.totals["root"].points, 8.0);
    assert_eq!(rollup.total_points, 8.0);
}

#[test]
fn correction_reopen_recomputes_on_completion() {
    let tree = TaskTree::build(vec![
        TaskNode::new("t1", 1, 6.0),
        TaskNode::new("t2", 1, 4.0),
    ])
    .expect("valid tree");
    let mut key = school_key(10.0);
    let mut entry = CorrectionRecorder::create("exam", "kid", "school");
    assert_eq!(entry.status, CorrectionStatus::Draft);

    {
        let mut recorder = CorrectionRecorder::new(&tree, &mut key);
        recorder.start(&mut entry).expect("start");
        recorder.record_score(&mut entry, "t1", 6.0).expect("score");
        recorder.record_score(&mut entry, "t2", 4.0).expect("score");
        recorder.complete(&mut entry).expect("complete");
        assert_eq!(entry.total_grade, "1");

        assert!(matches!(
            recorder.record_score(&mut entry, "t2", 1.0),
            Err(GradingError::ImmutableRecord { .. })
        ));
        recorder.reopen(&mut entry).expect("reopen");
        recorder.record_score(&mut entry, "t2", 1.0).expect("edit after reopen");
        recorder.complete(&mut entry).expect("complete again");
    }

    assert_eq!(entry.status, CorrectionStatus::Completed);
    assert_eq!(entry.total_points, 7.0);
    assert_eq!(entry.total_grade, "3");
    assert!(key.modified_after_correction());
    assert!(matches!(
        key.set_rounding(RoundingRule::none()),
        Err(GradingError::LockedConfiguration { .. })
    ));
}
