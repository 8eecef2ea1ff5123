//! In-memory implementations of the external collaborators
//!
//! - **MemoryLedgerStore**: accounts and ledger with per-account locking
//! - **MemoryCache**: key/value cache with expiry
//! - **MemoryQueue** / **MemoryConnector**: durable queue with manual acknowledgement
//!
//! All of them are thread-safe and support fault injection for tests.

pub mod cache;
pub mod ledger_store;
pub mod queue;

pub use cache::MemoryCache;
pub use ledger_store::MemoryLedgerStore;
pub use queue::{MemoryConnector, MemoryQueue};
