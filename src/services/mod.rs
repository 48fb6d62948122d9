pub mod enforcer;
pub mod sink;

pub use sink::ResultSink;
