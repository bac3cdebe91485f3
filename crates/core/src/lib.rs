//! Core types and configuration for the dump.cs scanner
//!
//! This crate provides the records, errors and diagnostics shared by the
//! scanner and its command-line front end.

pub mod error;
pub mod types;
pub mod config;
pub mod events;

pub use error::{Error, Result};
pub use types::*;
pub use config::{ClassMatch, Config};
pub use events::{EventBus, ScanEvent};
