//! Obfuscated identifier detection
//!
//! Obfuscators commonly rename types and members to CJK text, symbol
//! blocks or punctuation. The check is a fixed code-point set; there is no
//! normalization and no Unicode category lookup.

/// Inclusive code-point ranges treated as suspicious
const SUSPICIOUS_RANGES: &[(char, char)] = &[
    ('\u{00A0}', '\u{05FF}'), // Latin-1 supplement through Hebrew, covers 'ä' and '¸'
    ('\u{1F00}', '\u{1FFF}'), // Greek extended
    ('\u{2600}', '\u{26FF}'), // Miscellaneous symbols
    ('\u{2700}', '\u{27BF}'), // Dingbats
    ('\u{2E80}', '\u{9FFF}'), // CJK radicals, symbols, Bopomofo, ideographs
    ('\u{F900}', '\u{FAFF}'), // CJK compatibility ideographs
    ('\u{FE30}', '\u{FE4F}'), // CJK compatibility forms
    ('\u{FF01}', '\u{FF0F}'), // Fullwidth punctuation
    ('\u{FF1F}', '\u{FF1F}'), // Fullwidth question mark
];

/// ASCII characters that never appear in generated identifiers
const SUSPICIOUS_ASCII: &[u8] = b"!\"#$%^&*+-=~`'.\\";

/// Whether a single character belongs to the suspicious set
pub fn is_suspicious_char(c: char) -> bool {
    if c.is_ascii() {
        return SUSPICIOUS_ASCII.contains(&(c as u8));
    }

    SUSPICIOUS_RANGES
        .iter()
        .any(|&(lo, hi)| (lo..=hi).contains(&c))
}

/// Whether `text` contains at least one suspicious character
pub fn is_obfuscated(text: &str) -> bool {
    text.chars().any(is_suspicious_char)
}
