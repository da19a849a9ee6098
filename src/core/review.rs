use tracing::{debug, info};

use crate::adapters::llm::{parse_review_response, LlmClient};
use crate::adapters::retry::{QuotaError, RetryPolicy};
use crate::core::comment::{assemble, ReviewComment};
use crate::core::diff::FileDiff;
use crate::core::position::build_position_map;
use crate::core::prompt::{PrDetails, PromptBuilder};

/// Drives the review: one position map per file, one LLM call per chunk,
/// strictly sequential. The endpoint is rate- and quota-limited, so chunks
/// are awaited one at a time rather than fanned out.
pub struct ReviewOrchestrator<'a> {
    client: &'a dyn LlmClient,
    retry: RetryPolicy,
    prompts: PromptBuilder,
    exclude: Vec<glob::Pattern>,
}

impl<'a> ReviewOrchestrator<'a> {
    pub fn new(
        client: &'a dyn LlmClient,
        retry: RetryPolicy,
        prompts: PromptBuilder,
        exclude: Vec<glob::Pattern>,
    ) -> Self {
        Self {
            client,
            retry,
            prompts,
            exclude,
        }
    }

    /// Reviews every eligible file and returns comments in
    /// file-then-chunk-then-suggestion order.
    ///
    /// Only quota exhaustion is an error here; it unwinds the run without
    /// posting whatever partial list has accumulated. Every other failure is
    /// absorbed per chunk or per suggestion.
    pub async fn run(
        &self,
        files: &[FileDiff],
        pr: &PrDetails,
    ) -> Result<Vec<ReviewComment>, QuotaError> {
        let mut comments = Vec::new();

        for file in files {
            if !self.is_eligible(file) {
                continue;
            }

            let map = build_position_map(file);
            debug!(file = %file.path, mapped_lines = map.len(), "built position map");

            for chunk in &file.chunks {
                let prompt = self.prompts.build_prompt(file, chunk, pr);
                let client = self.client;
                let prompt_ref: &str = &prompt;
                let suggestions = self
                    .retry
                    .invoke(move || async move {
                        let content = client.review(prompt_ref).await?;
                        parse_review_response(&content)
                    })
                    .await?;

                if let Some(suggestions) = suggestions {
                    comments.extend(assemble(&file.path, &suggestions, &map));
                }
            }
        }

        info!(comments = comments.len(), "review complete");
        Ok(comments)
    }

    fn is_eligible(&self, file: &FileDiff) -> bool {
        if file.path.is_empty() || file.is_deleted {
            info!(file = %file.path, "skipping deleted file");
            return false;
        }
        if file.is_binary || file.chunks.is_empty() {
            info!(file = %file.path, "skipping non-text diff");
            return false;
        }
        if self.exclude.iter().any(|p| p.matches(&file.path)) {
            info!(file = %file.path, "skipping excluded file");
            return false;
        }
        true
    }
}
