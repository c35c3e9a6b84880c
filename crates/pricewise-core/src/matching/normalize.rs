use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Comparison key for product names and aliases: lowercase ASCII letters,
/// digits and single spaces, no leading or trailing whitespace.
///
/// The empty key is the sentinel for null, blank or punctuation-only input
/// and is never a match target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedName(String);

impl NormalizedName {
    pub const fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters. Keys are ASCII, so this is also the byte length
    /// SQLite's `length()` reports.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NormalizedName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NormalizedName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Lowercases and strips diacritics, keeping every other character.
pub fn fold_accents(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Canonicalizes raw text into its comparison key.
///
/// Pure and idempotent. Must be applied identically wherever a name is stored
/// or looked up.
pub fn normalize(text: &str) -> NormalizedName {
    let folded = fold_accents(text);
    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;

    for c in folded.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }

    NormalizedName(out)
}

pub fn normalize_opt(text: Option<&str>) -> NormalizedName {
    text.map(normalize).unwrap_or_default()
}
