use serde::{Deserialize, Serialize};

use crate::core::diff::{ChangeKind, DiffChunk, FileDiff};

/// PR metadata threaded into every prompt for context.
#[derive(Debug, Clone, Default)]
pub struct PrDetails {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: r#"Your task is to review pull requests. Instructions:
- Provide the response in the following JSON format: {"reviews": [{"lineNumber": <line_number>, "reviewComment": "<review comment>"}]}
- Do not give positive comments or compliments.
- Provide comments and suggestions ONLY if there is something to improve, otherwise "reviews" should be an empty array.
- Write the comment in GitHub Markdown format.
- Use the given description only for the overall context and only comment the code.
- IMPORTANT: NEVER suggest adding comments to the code.

Review the following code diff in the file "{file}" and take the pull request title and description into account when writing the response.

Pull request title: {title}
Pull request description:

---
{description}
---

Git diff to review:

```diff
{chunk}
```"#
                .to_string(),
        }
    }
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// One prompt per chunk: the hunk header plus every change rendered with
    /// its line number, so the model can quote line numbers that resolve
    /// through the position map.
    pub fn build_prompt(&self, file: &FileDiff, chunk: &DiffChunk, pr: &PrDetails) -> String {
        self.config
            .template
            .replace("{file}", &file.path)
            .replace("{title}", &pr.title)
            .replace("{description}", &pr.description)
            .replace("{chunk}", &render_chunk(chunk))
    }
}

fn render_chunk(chunk: &DiffChunk) -> String {
    let mut out = String::new();
    out.push_str(&chunk.header);
    out.push('\n');
    for change in &chunk.changes {
        let (line, prefix) = match change.kind {
            ChangeKind::Added => (change.new_line, '+'),
            ChangeKind::Removed => (change.old_line, '-'),
            ChangeKind::Context => (change.new_line, ' '),
        };
        match line {
            Some(n) => out.push_str(&format!("{} {}{}\n", n, prefix, change.content)),
            None => out.push_str(&format!("{}{}\n", prefix, change.content)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diff::DiffChange;

    #[test]
    fn prompt_contains_file_title_and_numbered_chunk() {
        let file = FileDiff {
            path: "src/lib.rs".to_string(),
            chunks: vec![],
            is_deleted: false,
            is_binary: false,
        };
        let chunk = DiffChunk {
            header: "@@ -1,2 +1,3 @@".to_string(),
            changes: vec![
                DiffChange {
                    kind: ChangeKind::Context,
                    old_line: Some(1),
                    new_line: Some(1),
                    content: "fn main() {".to_string(),
                },
                DiffChange {
                    kind: ChangeKind::Added,
                    old_line: None,
                    new_line: Some(2),
                    content: "    todo!();".to_string(),
                },
            ],
        };
        let pr = PrDetails {
            title: "Add todo".to_string(),
            description: "WIP".to_string(),
        };

        let prompt = PromptBuilder::new(PromptConfig::default()).build_prompt(&file, &chunk, &pr);
        assert!(prompt.contains("\"src/lib.rs\""));
        assert!(prompt.contains("Pull request title: Add todo"));
        assert!(prompt.contains("@@ -1,2 +1,3 @@"));
        assert!(prompt.contains("2 +    todo!();"));
        assert!(prompt.contains("1  fn main() {"));
    }
}
