//! 编排层：批处理调度与速率控制

pub mod qps;
pub mod scheduler;

pub use qps::QpsLimiter;
pub use scheduler::{run_item, BatchScheduler, BatchStats};
