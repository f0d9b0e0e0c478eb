//! # jobctl CLI Library
//!
//! Argument parsing, process wiring, and command handlers for the `jobctl`
//! binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod logging;
