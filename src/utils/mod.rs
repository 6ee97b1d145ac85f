/// Retry with exponential backoff
pub mod retry;
/// Count parsing and text trimming
pub mod text;

pub use retry::{with_retry, RetryPolicy};
pub use text::{collapse_whitespace, parse_count, truncate_chars};
