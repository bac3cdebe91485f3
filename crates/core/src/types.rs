//! Common types used throughout the scanner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Range;

/// Relative virtual address of a method inside its module
///
/// Always rendered as `0x` followed by 8 uppercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rva(pub u32);

impl Rva {
    pub fn new(rva: u32) -> Self {
        Self(rva)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Parse an offset written with or without a `0x` prefix.
    ///
    /// Accepts 1 to 8 hex digits in any case. Anything else yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);

        if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl std::fmt::Display for Rva {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for Rva {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for Rva {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::invalid_offset(s))
    }
}

impl Serialize for Rva {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rva {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Rva::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid offset {text:?}")))
    }
}

/// Normalize an offset string to its canonical `0x%08X` form
pub fn normalize_offset(text: &str) -> Option<String> {
    Rva::parse(text).map(|rva| rva.to_string())
}

/// Field modifier keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldModifier {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Readonly,
}

impl FieldModifier {
    pub fn from_keyword(token: &str) -> Option<Self> {
        Some(match token {
            "public" => Self::Public,
            "private" => Self::Private,
            "protected" => Self::Protected,
            "internal" => Self::Internal,
            "static" => Self::Static,
            "readonly" => Self::Readonly,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Internal => "internal",
            Self::Static => "static",
            Self::Readonly => "readonly",
        }
    }
}

/// Method modifier keywords
///
/// `Other` holds the unrecognized remainder of a modifier run verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodModifier {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Virtual,
    Abstract,
    Override,
    Sealed,
    Async,
    Extern,
    Partial,
    Unsafe,
    Ref,
    Out,
    Params,
    New,
    Other(String),
}

impl MethodModifier {
    pub fn from_keyword(token: &str) -> Option<Self> {
        Some(match token {
            "public" => Self::Public,
            "private" => Self::Private,
            "protected" => Self::Protected,
            "internal" => Self::Internal,
            "static" => Self::Static,
            "virtual" => Self::Virtual,
            "abstract" => Self::Abstract,
            "override" => Self::Override,
            "sealed" => Self::Sealed,
            "async" => Self::Async,
            "extern" => Self::Extern,
            "partial" => Self::Partial,
            "unsafe" => Self::Unsafe,
            "ref" => Self::Ref,
            "out" => Self::Out,
            "params" => Self::Params,
            "new" => Self::New,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Internal => "internal",
            Self::Static => "static",
            Self::Virtual => "virtual",
            Self::Abstract => "abstract",
            Self::Override => "override",
            Self::Sealed => "sealed",
            Self::Async => "async",
            Self::Extern => "extern",
            Self::Partial => "partial",
            Self::Unsafe => "unsafe",
            Self::Ref => "ref",
            Self::Out => "out",
            Self::Params => "params",
            Self::New => "new",
            Self::Other(text) => text,
        }
    }
}

/// A class declaration and its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub declaration_text: String,
    pub body_text: String,
    /// Byte range of `body_text` within the scanned document
    #[serde(skip)]
    pub span: Range<usize>,
}

impl ClassRecord {
    /// Whether a document position falls inside this class body
    pub fn contains(&self, position: usize) -> bool {
        self.span.contains(&position)
    }
}

/// A field declared in a class body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub modifiers: Vec<FieldModifier>,
    pub type_name: String,
    pub name: String,
}

impl FieldRecord {
    /// `[modifiers] Type name`
    pub fn declaration(&self) -> String {
        let mut text = String::new();
        for modifier in &self.modifiers {
            text.push_str(modifier.as_str());
            text.push(' ');
        }
        text.push_str(&self.type_name);
        text.push(' ');
        text.push_str(&self.name);
        text
    }
}

/// A method annotated with its RVA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub offset: Rva,
    pub modifiers: Vec<MethodModifier>,
    pub return_type: String,
    pub name: String,
    pub params: String,
    pub body_text: String,
    pub full_text: String,
    /// Byte range of `full_text` within the scanned text
    #[serde(skip)]
    pub span: Range<usize>,
}

impl MethodRecord {
    /// Modifiers joined by single spaces, in declaration order
    pub fn modifiers_text(&self) -> String {
        self.modifiers
            .iter()
            .map(MethodModifier::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `ReturnType Name(params)`
    pub fn signature(&self) -> String {
        format!("{} {}({})", self.return_type, self.name, self.params)
    }
}

/// A class together with the members found in its body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub class: ClassRecord,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
}

/// Kind of member flagged by the obfuscation heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Class,
    Field,
    Method,
}

/// A class or member whose identifier looks obfuscated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObfuscatedMember {
    pub kind: MemberKind,
    pub name: String,
    /// Owning class; `None` for classes themselves
    pub class_name: Option<String>,
    pub offset: Option<Rva>,
}

/// Summary of a full scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,
    pub statistics: ScanStatistics,
}

/// Counts gathered over a full scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub total_classes: usize,
    pub total_methods: usize,
    pub total_fields: usize,
    pub obfuscated_members: usize,
    pub diagnostics: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rva_parse_and_display() {
        assert_eq!(Rva::parse("0x1A2B3C4"), Some(Rva(0x01A2_B3C4)));
        assert_eq!(Rva::parse("1a2b3c4"), Some(Rva(0x01A2_B3C4)));
        assert_eq!(Rva::parse("0X01A2B3C4").map(|r| r.to_string()).as_deref(), Some("0x01A2B3C4"));
        assert_eq!(Rva(0x1A2B3).to_string(), "0x0001A2B3");
    }

    #[test]
    fn test_rva_rejects_garbage() {
        assert_eq!(Rva::parse(""), None);
        assert_eq!(Rva::parse("0x"), None);
        assert_eq!(Rva::parse("0x123456789"), None);
        assert_eq!(Rva::parse("0xGG"), None);
        assert!("nope".parse::<Rva>().is_err());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_offset("1A2B3C4").unwrap();
        assert_eq!(once, "0x01A2B3C4");
        assert_eq!(normalize_offset(&once).as_deref(), Some(once.as_str()));
        assert_eq!(normalize_offset("0xabcdef12").as_deref(), Some("0xABCDEF12"));
    }

    #[test]
    fn test_rva_serde_as_string() {
        let json = serde_json::to_string(&Rva(0x10)).unwrap();
        assert_eq!(json, "\"0x00000010\"");
        let back: Rva = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rva(0x10));
    }

    #[test]
    fn test_method_signature_text() {
        let method = MethodRecord {
            offset: Rva(1),
            modifiers: vec![
                MethodModifier::Public,
                MethodModifier::Other("unknown static".into()),
            ],
            return_type: "void".into(),
            name: "TakeDamage".into(),
            params: "int amount".into(),
            body_text: String::new(),
            full_text: String::new(),
            span: 0..0,
        };
        assert_eq!(method.signature(), "void TakeDamage(int amount)");
        assert_eq!(method.modifiers_text(), "public unknown static");
    }

    #[test]
    fn test_field_declaration_text() {
        let field = FieldRecord {
            modifiers: vec![FieldModifier::Public, FieldModifier::Static],
            type_name: "Dictionary<int, string>".into(),
            name: "loot".into(),
        };
        assert_eq!(field.declaration(), "public static Dictionary<int, string> loot");

        let bare = FieldRecord {
            modifiers: Vec::new(),
            type_name: "int".into(),
            name: "health".into(),
        };
        assert_eq!(bare.declaration(), "int health");
    }
}
