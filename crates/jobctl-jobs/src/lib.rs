//! jobctl Jobs - worker loop, queue service, and worker process pool.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Producer / operator                                          │
//! │     │  JobQueue::enqueue / retry_dead / remove_dead           │
//! │     ▼                                                         │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              SQLite job store (one file)                │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │        ▲ claim_next / save        ▲ claim_next / save         │
//! │  ┌─────┴──────┐             ┌─────┴──────┐                   │
//! │  │ Worker     │     ...     │ Worker     │  one OS process   │
//! │  │ (sh -c)    │             │ (sh -c)    │  each             │
//! │  └────────────┘             └────────────┘                   │
//! │        ▲ spawn / SIGTERM / liveness                           │
//! │  WorkerPool ── PID file                                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pool never talks to its workers except through OS signals; workers
//! coordinate only through the store's atomic claim.

pub mod executor;
pub mod pool;
pub mod queue;
pub mod shutdown;
pub mod worker;

pub use executor::{CommandRunner, ShellRunner};
pub use pool::{
    LaunchMode, OsProcessBackend, PidRegistry, PoolStatus, ProcessBackend, StopReport, WorkerPool,
};
pub use queue::{EnqueueRequest, JobQueue};
pub use shutdown::{install_signal_handlers, shutdown_signal, ShutdownFlag};
pub use worker::{Worker, WorkerConfig, WorkerStats};
