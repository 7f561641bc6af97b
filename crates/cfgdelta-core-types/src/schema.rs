//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.
//! `tracing` takes field names as identifiers, so call sites spell the keys
//! out and readers of captured events look them up through these constants.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Tree and diff identifiers
pub const FIELD_OLD_ROOT: &str = "old_root";
pub const FIELD_NEW_ROOT: &str = "new_root";

// Collection sizes
pub const FIELD_ALIGNED_COUNT: &str = "aligned_count";
pub const FIELD_CHANGE_COUNT: &str = "change_count";
pub const FIELD_SHARED_COUNT: &str = "shared_count";
pub const FIELD_STATEMENT_COUNT: &str = "statement_count";
pub const FIELD_FAILURE_COUNT: &str = "failure_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
