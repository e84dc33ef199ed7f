//! Format identifiers: dot-prefixed file extensions such as `.pdf`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// A file extension naming a conversion endpoint.
///
/// Keeps the spelling it was created from (the server's, for identifiers
/// read from the capability map) because that exact string goes back over
/// the wire as `target_format`. Equality, hashing, ordering and search use
/// the dot-prefixed lower-cased key instead, so `PDF`, `.pdf` and ` .Pdf `
/// are the same format.
#[derive(Debug, Clone)]
pub struct FormatId {
    raw: String,
    key: String,
}

impl FormatId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);
        FormatId {
            raw: trimmed.to_string(),
            key: format!(".{}", bare.to_lowercase()),
        }
    }

    /// Extension of `path`, if it has one.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(FormatId::new)
    }

    /// The identifier as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Normalised form: `.pdf`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The extension without its dot, upper-cased: `.pdf` → `PDF`.
    pub fn display_name(&self) -> String {
        self.key.trim_start_matches('.').to_uppercase()
    }

    /// Case-insensitive substring match of an already lower-cased needle
    /// against the display name.
    pub(crate) fn display_contains(&self, needle_lower: &str) -> bool {
        self.key.trim_start_matches('.').contains(needle_lower)
    }
}

impl PartialEq for FormatId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FormatId {}

impl Hash for FormatId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for FormatId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FormatId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for FormatId {
    fn from(s: &str) -> Self {
        FormatId::new(s)
    }
}

impl Serialize for FormatId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FormatId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FormatId::new(raw))
    }
}

/// Join identifiers for messages: `.docx, .png`.
pub(crate) fn join(formats: &[FormatId]) -> String {
    formats
        .iter()
        .map(FormatId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
