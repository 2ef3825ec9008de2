pub mod client;
pub mod consumer;
pub mod dlq;
pub mod validate;

pub use client::{FakeStreamClient, StreamClient, StreamEntry};
pub use consumer::{ConsumerConfig, OpportunityConsumer};
pub use dlq::{DlqConfig, DlqStats, DlqSubsystem};
pub use validate::{ValidationConfig, ValidationOutcome};
