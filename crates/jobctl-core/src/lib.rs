//! # jobctl Core
//!
//! Core types and error definitions for the jobctl background job queue.
//!
//! This crate owns the [`Job`] entity and its state machine. Every state
//! change a job can go through is described by a single transition table in
//! [`JobState::apply`]; the storage and worker layers only ever move a job
//! by calling the methods on [`Job`] that consult that table.

pub mod backoff;
pub mod error;
pub mod job;
pub mod outcome;
pub mod result;
pub mod state;
pub mod validation;

pub use backoff::*;
pub use error::*;
pub use job::*;
pub use outcome::*;
pub use result::*;
pub use state::*;
pub use validation::*;
