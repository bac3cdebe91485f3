//! One-time name and offset index over a dump's methods
//!
//! Built in document order with first-insert-wins, so every query answers
//! exactly what the corresponding re-scanning query on [`crate::DumpFile`]
//! would.

use dumpcs_core::{ClassRecord, MethodRecord, Rva};
use indexmap::IndexMap;
use std::ops::Range;
use tracing::{debug, info};

/// Name → method and offset → method lookup tables
#[derive(Debug, Default)]
pub struct OffsetIndex {
    methods: Vec<MethodRecord>,
    by_name: IndexMap<String, usize>,
    by_offset: IndexMap<Rva, usize>,
    /// Class names with their body spans, sorted by position
    classes: Vec<(String, Range<usize>)>,
    duplicates: Vec<Rva>,
}

impl OffsetIndex {
    /// Build from classes and methods scanned over the same document
    pub fn build(
        classes: impl IntoIterator<Item = ClassRecord>,
        methods: impl IntoIterator<Item = MethodRecord>,
    ) -> Self {
        let mut index = Self::default();

        for method in methods {
            let slot = index.methods.len();
            index.by_name.entry(method.name.clone()).or_insert(slot);
            if index.by_offset.contains_key(&method.offset) {
                debug!("Offset {} declared more than once", method.offset);
                index.duplicates.push(method.offset);
            } else {
                index.by_offset.insert(method.offset, slot);
            }
            index.methods.push(method);
        }

        index.classes = classes
            .into_iter()
            .map(|class| (class.name, class.span))
            .collect();

        info!(
            "Indexed {} methods ({} names) across {} classes",
            index.methods.len(),
            index.by_name.len(),
            index.classes.len()
        );

        index
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// All indexed methods in document order
    pub fn methods(&self) -> &[MethodRecord] {
        &self.methods
    }

    /// Offsets that appeared on more than one method, in document order
    pub fn duplicate_offsets(&self) -> &[Rva] {
        &self.duplicates
    }

    pub fn find_method_by_name(&self, name: &str) -> Option<&MethodRecord> {
        self.by_name.get(name).map(|&slot| &self.methods[slot])
    }

    pub fn find_method_by_rva(&self, rva: Rva) -> Option<&MethodRecord> {
        self.by_offset.get(&rva).map(|&slot| &self.methods[slot])
    }

    pub fn find_method_by_offset(&self, offset: &str) -> Option<&MethodRecord> {
        self.find_method_by_rva(Rva::parse(offset)?)
    }

    /// Name of the class whose body contains the method at `offset`
    pub fn find_class_of_method(&self, offset: &str) -> Option<&str> {
        let method = self.find_method_by_offset(offset)?;
        self.class_at(method.span.start)
    }

    /// Name of the class whose body contains byte position `position`
    pub fn class_at(&self, position: usize) -> Option<&str> {
        let slot = self.classes.partition_point(|(_, span)| span.end <= position);
        self.classes
            .get(slot)
            .filter(|(_, span)| span.contains(&position))
            .map(|(name, _)| name.as_str())
    }
}
