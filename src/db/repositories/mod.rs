pub mod summaries;
pub mod sync_tokens;
