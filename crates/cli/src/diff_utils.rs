//! Line diffs of rendered grains

use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};
use tracking::ops::GrainDiff;

/// Colored unified diff between two texts
///
/// An absent side diffs as empty text.
pub fn unified_diff(
    old: Option<&str>,
    new: Option<&str>,
    old_label: &str,
    new_label: &str,
    context_lines: usize,
) -> String {
    let old_text = old.unwrap_or_default();
    let new_text = new.unwrap_or_default();
    let diff = TextDiff::from_lines(old_text, new_text);

    let mut output = String::new();
    output.push_str(&format!("{}\n", format!("--- {old_label}").red()));
    output.push_str(&format!("{}\n", format!("+++ {new_label}").green()));

    for hunk in diff.unified_diff().context_radius(context_lines).iter_hunks() {
        output.push_str(&format!("{}\n", hunk.header().cyan()));
        for change in hunk.iter_changes() {
            let line = change.value();
            let rendered = match change.tag() {
                ChangeTag::Delete => format!("-{line}").red().to_string(),
                ChangeTag::Insert => format!("+{line}").green().to_string(),
                ChangeTag::Equal => format!(" {line}").dimmed().to_string(),
            };
            output.push_str(&rendered);
            if !line.ends_with('\n') {
                output.push('\n');
            }
        }
    }
    output
}

pub fn render_grain_diff(diff: &GrainDiff, context_lines: usize) -> String {
    unified_diff(
        diff.left.text.as_deref(),
        diff.right.text.as_deref(),
        &diff.left.label(),
        &diff.right.label(),
        context_lines,
    )
}

/// Number of inserted and deleted lines
pub fn change_counts(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(ins, del), change| match change.tag() {
            ChangeTag::Insert => (ins + 1, del),
            ChangeTag::Delete => (ins, del + 1),
            ChangeTag::Equal => (ins, del),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff_modified_line() {
        let old = "{\n  \"name\": \"page\"\n}\n";
        let new = "{\n  \"name\": \"landing page\"\n}\n";

        let diff = unified_diff(Some(old), Some(new), "snapshot:a", "broker:a", 1);
        assert!(diff.contains("snapshot:a"));
        assert!(diff.contains("broker:a"));
        assert!(diff.contains("\"name\": \"page\""));
        assert!(diff.contains("landing page"));
    }

    #[test]
    fn test_unified_diff_missing_side() {
        let diff = unified_diff(None, Some("line 1\n"), "snapshot:a", "broker:a", 3);
        assert!(diff.contains("line 1"));
    }

    #[test]
    fn test_change_counts() {
        assert_eq!(change_counts("a\nb\n", "a\nc\nd\n"), (2, 1));
        assert_eq!(change_counts("same\n", "same\n"), (0, 0));
    }
}
