//! Human-readable rendering of a [`Diff`].

use std::fmt::Write;

use crate::diff::model::Diff;

/// Render a diff as an indented listing of changes and shared values.
///
/// Changes appear in path order. The output is informational only.
pub fn render_diff_summary(diff: &Diff) -> String {
    let mut out = String::from("Diff(changes=[");
    for (path, op) in &diff.changes {
        // Writing to a String cannot fail
        let _ = write!(out, "\n          {}: {}", path, op);
    }
    out.push_str("\n      ],\n      new_shared_values=[");
    for value in &diff.new_shared_values {
        let _ = write!(out, "\n          {}", value);
    }
    out.push_str("\n      ])");
    out
}

impl std::fmt::Display for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&render_diff_summary(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::model::{DiffOperation, DiffValue, Reference};
    use crate::path::Path;

    #[test]
    fn test_empty_diff_summary() {
        assert_eq!(
            render_diff_summary(&Diff::default()),
            "Diff(changes=[\n      ],\n      new_shared_values=[\n      ])"
        );
    }

    #[test]
    fn test_summary_lists_changes_in_path_order() {
        let diff = Diff::new(
            [
                (Path::root().attr("z"), DiffOperation::DeleteValue),
                (
                    Path::root().attr("a"),
                    DiffOperation::set(Reference::new_shared(0)),
                ),
            ]
            .into_iter()
            .collect(),
            vec![DiffValue::record("C", [("v", DiffValue::leaf(1i64))])],
        );
        let expected = "Diff(changes=[\n          \
                        .a: SetValue(new_value=<Reference: new_shared_values[0]>)\n          \
                        .z: DeleteValue()\n      ],\n      new_shared_values=[\n          \
                        C(v=1)\n      ])";
        assert_eq!(render_diff_summary(&diff), expected);
        assert_eq!(diff.to_string(), expected);
    }
}
