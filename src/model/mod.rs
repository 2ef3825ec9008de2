pub mod chain;
pub mod commitment;
pub mod dlq;
pub mod errors;
pub mod opportunity;
pub mod stats;

pub use chain::{Chain, ChainKind};
pub use commitment::CommitmentRecord;
pub use dlq::DlqEntry;
pub use errors::ErrorCode;
pub use opportunity::{Opportunity, OpportunityKind};
