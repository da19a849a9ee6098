use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::adapters::llm::ReviewSuggestion;
use crate::core::position::LinePositionMap;

/// An inline comment ready for the review API, anchored by diff position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewComment {
    pub path: String,
    pub position: usize,
    pub body: String,
}

/// Resolves model suggestions against a file's position map.
///
/// Suggestions that name a line the diff does not contain, or a line number
/// that is not a finite integer, are dropped with a warning; the model is not
/// guaranteed to reference lines actually present in the diff. Output order
/// matches input order.
pub fn assemble(
    path: &str,
    suggestions: &[ReviewSuggestion],
    map: &LinePositionMap,
) -> Vec<ReviewComment> {
    if path.is_empty() {
        return Vec::new();
    }

    let mut comments = Vec::new();
    for suggestion in suggestions {
        let Some(line) = coerce_line_number(&suggestion.line_number) else {
            warn!(
                file = path,
                value = %suggestion.line_number,
                "dropping suggestion with non-integer line number"
            );
            continue;
        };
        let Some(&position) = map.get(&line) else {
            warn!(file = path, line, "dropping suggestion for line not in diff");
            continue;
        };
        comments.push(ReviewComment {
            path: path.to_string(),
            position,
            body: suggestion.comment.clone(),
        });
    }
    comments
}

fn coerce_line_number(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suggestion(line_number: Value, comment: &str) -> ReviewSuggestion {
        ReviewSuggestion {
            line_number,
            comment: comment.to_string(),
        }
    }

    fn map(entries: &[(usize, usize)]) -> LinePositionMap {
        entries.iter().copied().collect()
    }

    #[test]
    fn resolves_string_line_number_through_map() {
        let comments = assemble(
            "src/lib.rs",
            &[suggestion(json!("42"), "x")],
            &map(&[(42, 7)]),
        );
        assert_eq!(
            comments,
            vec![ReviewComment {
                path: "src/lib.rs".to_string(),
                position: 7,
                body: "x".to_string(),
            }]
        );
    }

    #[test]
    fn resolves_numeric_line_number() {
        let comments = assemble("a.rs", &[suggestion(json!(10), "y")], &map(&[(10, 1)]));
        assert_eq!(comments[0].position, 1);
    }

    #[test]
    fn drops_non_integer_line_numbers() {
        let m = map(&[(42, 7)]);
        assert!(assemble("a.rs", &[suggestion(json!("abc"), "x")], &m).is_empty());
        assert!(assemble("a.rs", &[suggestion(json!(4.5), "x")], &m).is_empty());
        assert!(assemble("a.rs", &[suggestion(json!(-3), "x")], &m).is_empty());
        assert!(assemble("a.rs", &[suggestion(json!(null), "x")], &m).is_empty());
    }

    #[test]
    fn drops_unmapped_lines() {
        let comments = assemble("a.rs", &[suggestion(json!(99), "x")], &map(&[(42, 7)]));
        assert!(comments.is_empty());
    }

    #[test]
    fn preserves_suggestion_order() {
        let m = map(&[(1, 1), (2, 2), (3, 3)]);
        let comments = assemble(
            "a.rs",
            &[
                suggestion(json!(3), "third"),
                suggestion(json!("bogus"), "dropped"),
                suggestion(json!(1), "first"),
            ],
            &m,
        );
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].body, "third");
        assert_eq!(comments[1].body, "first");
    }

    #[test]
    fn empty_path_yields_no_comments() {
        let comments = assemble("", &[suggestion(json!(1), "x")], &map(&[(1, 1)]));
        assert!(comments.is_empty());
    }
}
