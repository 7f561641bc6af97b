#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use cfgdelta_core::diff::{Diff, DiffOperation, DiffValue};
use cfgdelta_core::emit::EmitOptions;
use cfgdelta_core::logging_facility::test_capture::init_test_capture;
use cfgdelta_core::model::NodeStore;
use cfgdelta_core::path::Path;
use cfgdelta_core::traversal::structurally_equal;
use cfgdelta_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_ALIGNED_COUNT, FIELD_CHANGE_COUNT,
    FIELD_ERR_CODE, FIELD_FAILURE_COUNT, FIELD_SHARED_COUNT, FIELD_STATEMENT_COUNT,
};
use cfgdelta_engine::{
    align_heuristically, apply_diff, build_diff_from_alignment, diff_trees, emit_statements,
    AlignmentOptions, EngineOptions,
};
use common::sample_trees;

#[test]
fn test_pipeline_logs_one_start_and_end_per_op() {
    // GIVEN two trees and the capture layer
    let capture = init_test_capture();
    let mut store = NodeStore::new();
    let (old, new) = sample_trees(&mut store);

    // WHEN running align, build and apply through the engine
    let diff = {
        let options = AlignmentOptions {
            old_name: "pipeline_old".to_string(),
            ..AlignmentOptions::default()
        };
        let alignment = align_heuristically(&store, &old, &new, &options).unwrap();
        assert_eq!(alignment.old_name(), "pipeline_old");
        build_diff_from_alignment(&alignment).unwrap()
    };
    apply_diff(&diff, &mut store, &old).unwrap();

    // THEN the tree matches and each op logged start and end
    assert!(structurally_equal(&store, &old, &new));
    for op in ["align_heuristically", "build_diff_from_alignment", "apply_diff"] {
        capture.assert_event_exists(op, EVENT_START);
        capture.assert_event_exists(op, EVENT_END);
    }
    let build_end = capture
        .events()
        .into_iter()
        .filter(|e| e.is("build_diff_from_alignment", EVENT_END))
        .any(|e| e.field(FIELD_CHANGE_COUNT) == Some("2"));
    assert!(build_end, "build end event should carry change_count");
    let build_start = capture
        .find_event("build_diff_from_alignment", EVENT_START)
        .unwrap();
    assert!(build_start.field(FIELD_ALIGNED_COUNT).is_some());
    assert!(capture
        .events()
        .into_iter()
        .filter(|e| e.is("build_diff_from_alignment", EVENT_END))
        .any(|e| e.field(FIELD_SHARED_COUNT) == Some("0")));
}

#[test]
fn test_apply_failure_logs_end_error_with_code() {
    // GIVEN a diff whose change targets a missing parent
    let capture = init_test_capture();
    let mut store = NodeStore::new();
    let old = store.record("Engine_apply_failure", [("x", 1i64.into())]);
    let diff = Diff::from_changes([(
        Path::parse(".missing_engine_parent.y").unwrap(),
        DiffOperation::set(DiffValue::leaf(1i64)),
    )]);

    // WHEN applying through the engine
    let err = apply_diff(&diff, &mut store, &old).unwrap_err();

    // THEN an end_error event classifies the failure
    assert!(err.to_string().contains("parent does not exist"));
    let failed = capture
        .events()
        .into_iter()
        .filter(|e| e.is("apply_diff", EVENT_END_ERROR))
        .any(|e| e.field(FIELD_ERR_CODE) == Some("ERR_APPLY_FAILED") && e.field(FIELD_FAILURE_COUNT) == Some("1"));
    assert!(failed, "expected an apply_diff end_error event");
}

#[test]
fn test_diff_trees_honours_identity_strategy() {
    // GIVEN two distinct roots
    let _capture = init_test_capture();
    let mut store = NodeStore::new();
    let (old, new) = sample_trees(&mut store);

    // WHEN diffing with the identity strategy
    let options = EngineOptions::from_toml_str("alignment = \"identity\"").unwrap();
    let diff = diff_trees(&store, &old, &new, &options).unwrap();

    // THEN the unaligned roots give an empty diff
    assert!(diff.is_empty());

    // AND the heuristic default finds the changes
    let diff = diff_trees(&store, &old, &new, &EngineOptions::default()).unwrap();
    assert_eq!(diff.len(), 2);
}

#[test]
fn test_emit_error_is_logged() {
    // GIVEN a diff that changes the root
    let capture = init_test_capture();
    let store = NodeStore::new();
    let diff = Diff::from_changes([(Path::root(), DiffOperation::modify(DiffValue::leaf(1i64)))]);

    // WHEN emitting
    let err = emit_statements(&diff, &store, None, &EmitOptions::default().with_root_name("emit_error_root"))
        .unwrap_err();

    // THEN the failure is classified as rejected
    assert!(err.to_string().contains("Changing the root object is not supported"));
    let logged = capture
        .events()
        .into_iter()
        .filter(|e| e.is("emit_statements", EVENT_END_ERROR))
        .any(|e| e.field(FIELD_ERR_CODE) == Some("ERR_REJECTED"));
    assert!(logged);
}

#[test]
fn test_emit_end_reports_statement_count() {
    // GIVEN a diff with one change
    let capture = init_test_capture();
    let mut store = NodeStore::new();
    let old = store.record("Engine_emit_count", [("x", 1i64.into())]);
    let diff = Diff::from_changes([(
        Path::parse(".x").unwrap(),
        DiffOperation::modify(DiffValue::leaf(2i64)),
    )]);

    // WHEN emitting statements
    let statements = emit_statements(
        &diff,
        &store,
        Some(&old),
        &EmitOptions::default().with_root_name("emit_count_root"),
    )
    .unwrap();

    // THEN the end event carries the statement count
    let expected = statements.len().to_string();
    assert!(capture
        .events()
        .into_iter()
        .filter(|e| e.is("emit_statements", EVENT_END))
        .any(|e| e.field(FIELD_STATEMENT_COUNT) == Some(expected.as_str())));
}
