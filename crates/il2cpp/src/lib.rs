//! IL2CPP dump.cs scanner
//!
//! This crate extracts classes, fields and RVA-annotated methods from the
//! pseudo-C# `dump.cs` files written by IL2CPP dumpers, answers lookups by
//! method name or RVA, and flags identifiers that look obfuscated.
//!
//! Scanning is best effort: malformed classes or methods are skipped with a
//! warning and never abort a scan.

mod lexer;

pub mod obfuscation;
pub mod classes;
pub mod members;
pub mod index;
pub mod dump;
pub mod output;

pub use classes::ClassScanner;
pub use dump::DumpFile;
pub use dumpcs_core::normalize_offset;
pub use index::OffsetIndex;
pub use members::{FieldScanner, MethodScanner};
pub use obfuscation::is_obfuscated;

use dumpcs_core::{Config, EventBus, Result, ScanEvent};
use std::path::Path;
use tracing::warn;

/// Load a dump.cs file with the default configuration
pub fn load(path: &Path) -> Result<DumpFile> {
    DumpFile::load(path)
}

/// Load a dump.cs file with a configuration
pub fn load_with_config(path: &Path, config: Config) -> Result<DumpFile> {
    DumpFile::load_with_config(path, config)
}

/// Log a diagnostic and publish it on `events` when present
pub(crate) fn report(events: Option<&EventBus>, event: ScanEvent) {
    warn!("{}", event);
    if let Some(events) = events {
        events.emit(event);
    }
}
