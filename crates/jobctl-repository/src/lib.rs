//! # jobctl Repository
//!
//! Durable job storage.
//!
//! ```text
//! Worker / JobQueue
//!   ↓  Arc<dyn JobStore>   (storage interface)
//! SqliteJobStore           (SQLx / SQLite, owns the claim protocol)
//!   ↓  DatabasePool
//! SQLite file (WAL)
//! ```
//!
//! Every worker process opens its own [`DatabasePool`] on the same file.
//! SQLite serializes writers; [`SqliteJobStore::claim_next`] takes the write
//! lock up front so that selecting and claiming a job is one atomic step.

pub mod pool;
pub mod sqlite;
pub mod timestamp;
pub mod traits;

pub use pool::*;
pub use sqlite::SqliteJobStore;
pub use traits::*;
