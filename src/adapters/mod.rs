pub mod llm;
pub mod openai;
pub mod retry;

pub use openai::OpenAiClient;
pub use retry::{ErrorVerdict, QuotaError, RetryPolicy};
