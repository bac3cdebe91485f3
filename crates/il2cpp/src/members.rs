//! Member scanner: fields and RVA-annotated methods

use crate::lexer::{
    find_matching_brace, line_at, line_number, lines_from, split_tokens, DepthTracker,
};
use dumpcs_core::{
    EventBus, FieldModifier, FieldRecord, MethodModifier, MethodRecord, Rva, ScanEvent,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// `// RVA: 0x<7-8 hex digits>` with optional trailing text
static RVA_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*// RVA: 0x(?P<offset>[0-9A-Fa-f]{7,8})(?:\s.*)?$")
        .expect("RVA comment pattern is valid")
});

/// Offset carried by an RVA comment line
pub fn parse_rva_comment(line: &str) -> Option<Rva> {
    let caps = RVA_COMMENT.captures(line)?;
    Rva::parse(caps.name("offset")?.as_str())
}

/// Parsed `[modifiers] ReturnType Name(params) {` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Signature<'a> {
    pub modifiers: Vec<&'a str>,
    pub return_type: &'a str,
    pub name: &'a str,
    pub params: &'a str,
    /// Byte offset of the body's `{` within the line, when there is a body
    pub open: Option<usize>,
}

/// Recognize a method-shaped line. Works for declarations with or without a
/// body; `open` tells them apart.
pub(crate) fn parse_signature(line: &str) -> Option<Signature<'_>> {
    let paren = line.find('(')?;
    let head = &line[..paren];
    if head.contains('=') || head.contains('{') || head.trim_start().starts_with("//") {
        return None;
    }

    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in line[paren..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(paren + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let tokens = split_tokens(head);
    let [modifiers @ .., return_type, name] = tokens.as_slice() else {
        return None;
    };

    let rest = &line[close + 1..];
    let open = rest
        .trim_start()
        .starts_with('{')
        .then(|| close + 1 + (rest.len() - rest.trim_start().len()));

    Some(Signature {
        modifiers: modifiers.to_vec(),
        return_type: *return_type,
        name: *name,
        params: line[paren + 1..close].trim(),
        open,
    })
}

/// Map modifier tokens to the fixed vocabulary. The first unknown token and
/// everything after it become a single [`MethodModifier::Other`].
pub fn parse_method_modifiers<'t>(
    tokens: impl IntoIterator<Item = &'t str>,
) -> Vec<MethodModifier> {
    let mut modifiers = Vec::new();
    let mut rest: Vec<&str> = Vec::new();

    for token in tokens {
        if !rest.is_empty() {
            rest.push(token);
        } else if let Some(known) = MethodModifier::from_keyword(token) {
            modifiers.push(known);
        } else {
            rest.push(token);
        }
    }

    if !rest.is_empty() {
        modifiers.push(MethodModifier::Other(rest.join(" ")));
    }
    modifiers
}

fn is_modifier_line(line: &str) -> bool {
    let tokens = split_tokens(line);
    !tokens.is_empty() && tokens.iter().all(|t| MethodModifier::from_keyword(t).is_some())
}

/// Lazy iterator over the RVA-annotated methods of a text
pub struct MethodScanner<'a> {
    text: &'a str,
    cursor: usize,
    events: Option<&'a EventBus>,
}

impl<'a> MethodScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            cursor: 0,
            events: None,
        }
    }

    /// Publish diagnostics on `events` in addition to logging them
    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Read the method annotated by the RVA comment at `rva_start`.
    ///
    /// Returns the record and the position after its closing line.
    fn read_method(
        &self,
        offset: Rva,
        rva_start: usize,
        rva_next: usize,
    ) -> Result<(MethodRecord, usize), ScanEvent> {
        let missing = || ScanEvent::MissingBody {
            offset,
            line: line_number(self.text, rva_start),
        };

        let mut prefix: Vec<&str> = Vec::new();
        let mut declaration = None;
        for line in lines_from(self.text, rva_next) {
            if line.text.trim().is_empty() {
                continue;
            }
            if is_modifier_line(line.text) {
                prefix.extend(split_tokens(line.text));
                continue;
            }
            declaration = Some(line);
            break;
        }

        let line = declaration.ok_or_else(missing)?;
        let signature = parse_signature(line.text).ok_or_else(missing)?;
        let open = line.start + signature.open.ok_or_else(missing)?;

        let close = find_matching_brace(self.text, open).ok_or(ScanEvent::UnbalancedMethod {
            offset,
            line: line_number(self.text, rva_start),
        })?;

        let resume = line_at(self.text, close).map_or(self.text.len(), |l| l.next);
        let modifiers =
            parse_method_modifiers(prefix.into_iter().chain(signature.modifiers.iter().copied()));

        Ok((
            MethodRecord {
                offset,
                modifiers,
                return_type: signature.return_type.to_string(),
                name: signature.name.to_string(),
                params: signature.params.to_string(),
                body_text: self.text[open + 1..close].to_string(),
                full_text: self.text[rva_start..=close].to_string(),
                span: rva_start..close + 1,
            },
            resume,
        ))
    }
}

impl Iterator for MethodScanner<'_> {
    type Item = MethodRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(line) = line_at(self.text, self.cursor) {
            self.cursor = line.next;

            let Some(offset) = parse_rva_comment(line.text) else {
                continue;
            };

            match self.read_method(offset, line.start, line.next) {
                Ok((record, resume)) => {
                    self.cursor = resume;
                    return Some(record);
                }
                Err(event @ ScanEvent::MissingBody { .. }) => {
                    debug!("{}", event);
                    if let Some(events) = self.events {
                        events.emit(event);
                    }
                }
                Err(event) => crate::report(self.events, event),
            }
        }

        None
    }
}

/// Field line: `[modifiers] Type name (= value | ;) [// comment]`
pub fn parse_field(line: &str) -> Option<FieldRecord> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") || trimmed.starts_with('[') || !line.contains(';') {
        return None;
    }

    let end = line.find(|c: char| c == '=' || c == ';')?;
    let head = &line[..end];
    if head.contains('(') || head.contains('{') || head.contains("//") {
        return None;
    }

    let tokens = split_tokens(head);
    let mut modifiers = Vec::new();
    let mut rest = tokens.as_slice();
    while let [first, tail @ ..] = rest {
        match FieldModifier::from_keyword(first) {
            Some(modifier) => {
                modifiers.push(modifier);
                rest = tail;
            }
            None => break,
        }
    }

    let [type_name, name] = rest else {
        return None;
    };
    if !looks_like_identifier(name) {
        return None;
    }

    Some(FieldRecord {
        modifiers,
        type_name: type_name.to_string(),
        name: name.to_string(),
    })
}

fn looks_like_identifier(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| !c.is_ascii_punctuation() || matches!(c, '_' | '<' | '@'))
}

/// Lazy iterator over the fields of a class body
///
/// Only lines at brace depth 0 of the body are considered, so statements in
/// method bodies and property accessors never show up as fields.
pub struct FieldScanner<'a> {
    body: &'a str,
    cursor: usize,
    depth: DepthTracker<'a>,
    after_rva: bool,
}

impl<'a> FieldScanner<'a> {
    pub fn new(body: &'a str) -> Self {
        Self {
            body,
            cursor: 0,
            depth: DepthTracker::new(body),
            after_rva: false,
        }
    }
}

impl Iterator for FieldScanner<'_> {
    type Item = FieldRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(line) = line_at(self.body, self.cursor) {
            self.cursor = line.next;

            if self.depth.depth_at(line.start) != 0 || line.text.trim().is_empty() {
                continue;
            }
            if parse_rva_comment(line.text).is_some() {
                self.after_rva = true;
                continue;
            }

            let follows_rva = std::mem::take(&mut self.after_rva);
            if follows_rva || parse_signature(line.text).is_some() {
                continue;
            }

            if let Some(field) = parse_field(line.text) {
                return Some(field);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const ENEMY_BODY: &str = "\
\t// Fields
\tprivate int health; // 0x18
\tpublic static readonly string Tag = \"enemy\"; // 0x0
\tprotected Dictionary<int, string> names; // 0x20
\tpublic int Health { get; set; }

\t// Methods

\t// RVA: 0x1A2B3C4 Offset: 0x1A2A3C4 VA: 0x1A2B3C4
\tpublic void TakeDamage(int amount) {
\t\thealth -= amount;
\t\tfor (int i = 0; i < amount; i++) {
\t\t\tFlash(i);
\t\t}
\t}

\t// RVA: 0x00B1C2D Offset: 0x00B0C2D VA: 0x00B1C2D
\tpublic override string ToString() { }
";

    #[test]
    fn test_rva_comment() {
        assert_eq!(
            parse_rva_comment("\t// RVA: 0x1A2B3C4 Offset: 0x0 VA: 0x0"),
            Some(Rva(0x01A2B3C4))
        );
        assert_eq!(parse_rva_comment("// RVA: 0xabcdef12"), Some(Rva(0xABCDEF12)));
        assert_eq!(parse_rva_comment("// RVA: 0x1A2B3"), None);
        assert_eq!(parse_rva_comment("// RVA: 0x123456789"), None);
        assert_eq!(parse_rva_comment("// RVA: -1 Offset: -1"), None);
        assert_eq!(parse_rva_comment("[Attr] // RVA: 0x1A2B3C4"), None);
    }

    #[test]
    fn test_signature_shapes() {
        let sig =
            parse_signature("\tpublic static List<int> Find(string name, int max) {").unwrap();
        assert_eq!(sig.modifiers, vec!["public", "static"]);
        assert_eq!(sig.return_type, "List<int>");
        assert_eq!(sig.name, "Find");
        assert_eq!(sig.params, "string name, int max");
        assert!(sig.open.is_some());

        let sig = parse_signature("\tpublic abstract void Tick();").unwrap();
        assert_eq!(sig.open, None);

        assert!(parse_signature("\tpublic int x = Compute();").is_none());
        assert!(parse_signature("\tFlash(i);").is_none());
    }

    #[test]
    fn test_unknown_modifier_absorbs_rest() {
        let modifiers = parse_method_modifiers(["public", "weird", "static"]);
        assert_eq!(
            modifiers,
            vec![MethodModifier::Public, MethodModifier::Other("weird static".into())]
        );
    }

    #[test]
    fn test_multiline_method_body_is_captured() {
        let methods: Vec<_> = MethodScanner::new(ENEMY_BODY).collect();
        assert_eq!(methods.len(), 2);

        let take = &methods[0];
        assert_eq!(take.offset.to_string(), "0x01A2B3C4");
        assert_eq!(take.modifiers, vec![MethodModifier::Public]);
        assert_eq!(take.return_type, "void");
        assert_eq!(take.name, "TakeDamage");
        assert_eq!(take.params, "int amount");
        assert!(take.body_text.contains("health -= amount;"));
        assert!(take.body_text.contains("Flash(i);"));
        assert!(take.body_text.trim_end().ends_with('}'));
        assert!(take.full_text.starts_with("\t// RVA: 0x1A2B3C4"));
        assert!(take.full_text.ends_with("\t}"));
        assert_eq!(&ENEMY_BODY[take.span.clone()], take.full_text);

        let to_string = &methods[1];
        assert_eq!(to_string.offset, Rva(0x00B1C2D));
        assert_eq!(to_string.modifiers, vec![MethodModifier::Public, MethodModifier::Override]);
        assert_eq!(to_string.body_text, " ");
    }

    #[test]
    fn test_modifier_continuation_line() {
        let text = "// RVA: 0x0000010\npublic static\n\nint Count() { return 1; }\n";
        let method = MethodScanner::new(text).next().unwrap();
        assert_eq!(method.modifiers, vec![MethodModifier::Public, MethodModifier::Static]);
        assert_eq!(method.return_type, "int");
        assert_eq!(method.body_text, " return 1; ");
    }

    #[test]
    fn test_bodiless_and_unbalanced_methods_are_skipped() {
        let text = "\
// RVA: 0x0000001
public abstract void Tick();
// RVA: 0x0000002
public void Broken() {
\tif (x) {
// RVA: 0x0000003
public void Fine() { }
";
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Arc::clone(&seen);
        bus.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let names: Vec<_> = MethodScanner::new(text).with_events(&bus).map(|m| m.name).collect();
        assert_eq!(names, vec!["Fine"]);

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[
                ScanEvent::MissingBody { offset: Rva(1), line: 1 },
                ScanEvent::UnbalancedMethod { offset: Rva(2), line: 3 },
            ]
        );
    }

    #[test]
    fn test_field_lines() {
        let field = parse_field("\tpublic static readonly string Tag = \"enemy\"; // 0x0").unwrap();
        assert_eq!(
            field.modifiers,
            vec![FieldModifier::Public, FieldModifier::Static, FieldModifier::Readonly]
        );
        assert_eq!(field.type_name, "string");
        assert_eq!(field.name, "Tag");

        assert!(parse_field("\tprivate <Health>k__BackingField;").is_none());
        assert!(parse_field("\tpublic int Health { get; set; }").is_none());
        assert!(parse_field("\tpublic const int Max = 5;").is_none());
        assert!(parse_field("\thealth -= amount;").is_none());
        assert!(parse_field("\t// private int x;").is_none());
    }

    #[test]
    fn test_fields_skip_methods_and_bodies() {
        let fields: Vec<_> = FieldScanner::new(ENEMY_BODY).collect();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["health", "Tag", "names"]);
        assert_eq!(fields[2].type_name, "Dictionary<int, string>");
        assert_eq!(fields[0].modifiers, vec![FieldModifier::Private]);
    }

    #[test]
    fn test_line_after_rva_is_never_a_field() {
        let body = "// RVA: 0x0000004\npublic int weird;\npublic int real;\n";
        let names: Vec<_> = FieldScanner::new(body).map(|f| f.name).collect();
        assert_eq!(names, vec!["real"]);
    }
}
