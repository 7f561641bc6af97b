#![allow(clippy::unwrap_used, clippy::expect_used)]

use cfgdelta_core::errors::DeltaError;
use cfgdelta_core::logging_facility::test_capture::init_test_capture;
use cfgdelta_core::{log_op_end, log_op_error, log_op_start};
use cfgdelta_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_DURATION_MS, FIELD_ERR_CODE, FIELD_ERR_KIND,
    FIELD_NEW_ROOT, FIELD_OLD_ROOT,
};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let start_events: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.is(op_name, EVENT_START))
        .collect();

    assert!(
        !start_events.is_empty(),
        "Should have captured at least one start event"
    );
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42u64);

    let end_events: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.is(op_name, EVENT_END))
        .collect();

    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field(FIELD_DURATION_MS), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    log_op_error!(op_name, DeltaError::DiffAlreadyBuilt, duration_ms = 10u64);

    let error_event = capture
        .find_event(op_name, EVENT_END_ERROR)
        .expect("Should have error event");
    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_ALREADY_BUILT"));
    assert!(error_event.field(FIELD_ERR_KIND).is_some());
    assert_eq!(
        error_event.field("message"),
        Some("build_diff should be called at most once")
    );
}

#[test]
fn test_boundary_ownership_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_ownership_unique_4";

    log_op_start!(op_name, change_count = 2usize);
    log_op_end!(op_name, duration_ms = 42u64);

    assert_eq!(capture.count_events(|e| e.is(op_name, EVENT_START)), 1);
    assert_eq!(capture.count_events(|e| e.is(op_name, EVENT_END)), 1);
}

#[test]
fn test_log_macros_with_multiple_fields() {
    let capture = init_test_capture();
    let op_name = "test_log_macros_fields_unique_5";

    log_op_start!(op_name, old_root = "#0", new_root = "#1");

    let start_event = capture
        .events_for_op(op_name)
        .into_iter()
        .next()
        .expect("Should have start event");
    assert_eq!(start_event.field(FIELD_OLD_ROOT), Some("#0"));
    assert_eq!(start_event.field(FIELD_NEW_ROOT), Some("#1"));
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_error_event_is_error_level() {
    let capture = init_test_capture();
    let op_name = "test_error_level_unique_6";

    log_op_error!(
        op_name,
        DeltaError::Config {
            message: "bad".to_string()
        },
        duration_ms = 1u64
    );

    let event = capture.find_event(op_name, EVENT_END_ERROR).unwrap();
    assert_eq!(event.level, tracing::Level::ERROR);
    assert_eq!(event.field(FIELD_ERR_CODE), Some("ERR_CONFIG"));
}
