//! # jobctl Config
//!
//! Configuration for jobctl.
//!
//! Configuration is a flat key-value JSON document. [`ConfigStore`] edits
//! that document one key at a time; [`SettingsLoader`] reads it, layered
//! between built-in defaults and `JOBCTL_*` environment variables, into
//! typed [`Settings`].

pub mod loader;
pub mod persist;
pub mod settings;
pub mod store;

pub use loader::SettingsLoader;
pub use persist::write_atomic;
pub use settings::*;
pub use store::{ConfigKey, ConfigStore};
