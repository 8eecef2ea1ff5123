//! Asynchronous withdrawal path: publisher, queue connection and consumer

pub mod connection;
pub mod publisher;
pub mod withdrawal;

pub use connection::{ConnectionState, QueueConnection};
pub use publisher::{Accepted, WithdrawalPublisher};
pub use withdrawal::{Disposition, WithdrawalWorker, WorkerStats};
