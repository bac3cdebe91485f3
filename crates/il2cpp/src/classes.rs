//! Class scanner: splits a dump into class declarations and bodies

use crate::lexer::{self, find_matching_brace, line_at, line_number};
use dumpcs_core::{ClassMatch, ClassRecord, EventBus, ScanEvent};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// `[modifiers] class Name [: Base[, Base...]] [// comment]`
///
/// `<...>` groups are part of the name, so `Pool<TKey, TValue>` and
/// `<Module>` are single names.
static CLASS_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?:[^\s/]+\s+)*?class\s+",
        r"(?P<name>(?:[^\s:<]|<[^>]*>)+)",
        r"(?:\s*:\s*(?P<base>[^/]*?))?\s*(?://.*)?$",
    ))
    .expect("class declaration pattern is valid")
});

/// A matched declaration line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassDeclaration<'a> {
    pub name: &'a str,
    pub base: Option<&'a str>,
}

pub(crate) fn parse_declaration(line: &str) -> Option<ClassDeclaration<'_>> {
    let caps = CLASS_DECLARATION.captures(line)?;
    let name = caps.name("name")?.as_str();
    let base = caps
        .name("base")
        .map(|m| m.as_str().trim())
        .filter(|b| !b.is_empty());
    Some(ClassDeclaration { name, base })
}

/// Lazy iterator over the top-level classes of a document
///
/// Each call to [`ClassScanner::new`] starts a fresh scan; the cursor lives in
/// the iterator, never in shared state.
pub struct ClassScanner<'a> {
    source: &'a str,
    cursor: usize,
    require_base_clause: bool,
    events: Option<&'a EventBus>,
}

impl<'a> ClassScanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            require_base_clause: true,
            events: None,
        }
    }

    /// Accept declarations without a `: Base` clause when `false`
    pub fn require_base_clause(mut self, require: bool) -> Self {
        self.require_base_clause = require;
        self
    }

    /// Publish diagnostics on `events` in addition to logging them
    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Try to read a class whose declaration is the line at `decl_start`.
    ///
    /// Returns the record and the position after its closing line, or `None`
    /// when the line does not start a class.
    fn read_class(&self, decl_start: usize) -> Option<Result<(ClassRecord, usize), ScanEvent>> {
        let decl = line_at(self.source, decl_start)?;
        let parsed = parse_declaration(decl.text)?;
        if self.require_base_clause && parsed.base.is_none() {
            return None;
        }

        let open_line = line_at(self.source, decl.next)?;
        let indent = open_line.text.len() - open_line.text.trim_start().len();
        if !open_line.text.trim_start().starts_with('{') {
            debug!("Declaration of {} is not followed by a body", parsed.name);
            return None;
        }
        let open = open_line.start + indent;

        let Some(close) = find_matching_brace(self.source, open) else {
            return Some(Err(ScanEvent::UnbalancedClass {
                declaration: decl.text.trim().to_string(),
                line: line_number(self.source, decl.start),
            }));
        };

        // Body excludes the opening `{` line and the closing `}` line.
        let body_start = if self.source[open + 1..open_line.start + open_line.text.len()]
            .trim()
            .is_empty()
        {
            open_line.next
        } else {
            open + 1
        };

        let close_line_start = self.source[..close].rfind('\n').map_or(0, |nl| nl + 1);
        let body_end = if close_line_start > body_start
            && self.source[close_line_start..close].trim().is_empty()
        {
            let end = close_line_start - 1;
            if end > body_start && self.source.as_bytes()[end - 1] == b'\r' {
                end - 1
            } else {
                end
            }
        } else {
            close.max(body_start)
        };

        let resume = line_at(self.source, close).map_or(self.source.len(), |l| l.next);

        Some(Ok((
            ClassRecord {
                name: parsed.name.to_string(),
                declaration_text: decl.text.trim().to_string(),
                body_text: self.source[body_start..body_end].to_string(),
                span: body_start..body_end,
            },
            resume,
        )))
    }
}

impl Iterator for ClassScanner<'_> {
    type Item = ClassRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(line) = line_at(self.source, self.cursor) {
            match self.read_class(line.start) {
                Some(Ok((record, resume))) => {
                    self.cursor = resume;
                    return Some(record);
                }
                Some(Err(event)) => {
                    crate::report(self.events, event);
                    self.cursor = line.next;
                }
                None => self.cursor = line.next,
            }
        }

        None
    }
}

/// First class (document order) selected by `requested` under `mode`
pub fn find_class(
    classes: impl IntoIterator<Item = ClassRecord>,
    requested: &str,
    mode: ClassMatch,
) -> Option<ClassRecord> {
    if requested.is_empty() {
        return None;
    }

    classes
        .into_iter()
        .find(|class| mode.matches(requested, &class.name, &class.declaration_text))
}

/// The class whose body contains the byte position `position`
///
/// Classes are yielded in document order and never overlap, so the scan stops
/// at the first class starting past `position`.
pub fn class_at(
    classes: impl IntoIterator<Item = ClassRecord>,
    position: usize,
) -> Option<ClassRecord> {
    classes
        .into_iter()
        .take_while(|class| class.span.start <= position)
        .find(|class| class.contains(position))
}

/// Number of lines in a class body, for summaries
pub fn body_line_count(class: &ClassRecord) -> usize {
    lexer::lines_from(&class.body_text, 0).count()
}
