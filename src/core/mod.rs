pub mod comment;
pub mod diff;
pub mod position;
pub mod prompt;
pub mod review;

pub use comment::ReviewComment;
pub use diff::{parse_diff, FileDiff};
pub use position::{build_position_map, LinePositionMap};
pub use prompt::{PrDetails, PromptBuilder};
pub use review::ReviewOrchestrator;
