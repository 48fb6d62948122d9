pub mod batch;
pub mod outcome;
pub mod request;
pub mod response;

pub use batch::{BatchItemSpec, BatchJob};
pub use outcome::{FailureKind, ItemResult, ItemStatus, ValidationOutcome};
pub use request::{EscalationDirective, ProviderKind, ReasoningEffort, RunRequest};
pub use response::ProviderResponse;
