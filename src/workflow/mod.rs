//! 流程层：单条目的完整处理流程

pub mod retry;
pub mod run_ctx;

pub use retry::{RetryController, RetryOutcome, RetryState, MAX_ATTEMPTS};
pub use run_ctx::RunCtx;
