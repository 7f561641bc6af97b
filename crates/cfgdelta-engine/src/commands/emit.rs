//! Statement emission with boundary logging.

use std::time::Instant;

use cfgdelta_core::diff::Diff;
use cfgdelta_core::emit::{self, EmitOptions, Statement};
use cfgdelta_core::errors::Result;
use cfgdelta_core::model::{NodeStore, Value};
use cfgdelta_core::{log_op_end, log_op_error, log_op_start};

use super::elapsed_ms;

/// Lower `diff` to ordered statements over `options.root_name`
///
/// # Errors
///
/// Returns `UnsupportedChange` for changes that cannot be expressed and
/// `ForwardSharedReference` for shared values that refer forward.
pub fn emit_statements(
    diff: &Diff,
    store: &NodeStore,
    old: Option<&Value>,
    options: &EmitOptions,
) -> Result<Vec<Statement>> {
    log_op_start!(
        "emit_statements",
        change_count = diff.len(),
        root_name = options.root_name.as_str(),
        pessimistic = old.is_none()
    );
    let start = Instant::now();

    let statements = emit::emit_statements(diff, store, old, options).map_err(|e| {
        log_op_error!("emit_statements", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "emit_statements",
        duration_ms = elapsed_ms(start),
        statement_count = statements.len()
    );
    Ok(statements)
}
