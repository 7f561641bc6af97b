//! Boundary-logged operations.
//!
//! ## Logging Ownership
//!
//! Every public function here emits exactly one `start` event and one `end`
//! or `end_error` event:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! `cfgdelta-core` only uses `tracing::debug!()`/`trace!()` for detail.

pub mod diff;
pub mod emit;
pub mod patch;

/// Milliseconds since `start`, for `duration_ms` fields
pub(crate) fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
