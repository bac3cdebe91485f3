//! Scan diagnostics published while walking a dump

use crate::types::Rva;
use serde::{Deserialize, Serialize};

/// Non-fatal problems found while scanning
///
/// `line` is 1-based and refers to the text being scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Class declaration whose body never closes
    UnbalancedClass { declaration: String, line: usize },
    /// RVA-annotated method whose body never closes
    UnbalancedMethod { offset: Rva, line: usize },
    /// RVA comment not followed by a `name(params) {` declaration
    MissingBody { offset: Rva, line: usize },
    /// Offset lookup found no method
    MethodNotFound { offset: String },
    /// Method found but no class body contains it
    ClassNotFound { offset: Rva },
}

impl std::fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanEvent::UnbalancedClass { declaration, line } => {
                write!(f, "line {line}: class body never closes: {declaration}")
            }
            ScanEvent::UnbalancedMethod { offset, line } => {
                write!(f, "line {line}: body of method {offset} never closes")
            }
            ScanEvent::MissingBody { offset, line } => {
                write!(f, "line {line}: RVA {offset} has no method declaration with a body")
            }
            ScanEvent::MethodNotFound { offset } => {
                write!(f, "method not found for offset {offset}")
            }
            ScanEvent::ClassNotFound { offset } => {
                write!(f, "method {offset} found, but no class declaration contains it")
            }
        }
    }
}

/// Event bus for broadcasting scan diagnostics
pub struct EventBus {
    subscribers: Vec<Box<dyn Fn(&ScanEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(&ScanEvent) + Send + Sync + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    pub fn emit(&self, event: ScanEvent) {
        for subscriber in &self.subscribers {
            subscriber(&event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
