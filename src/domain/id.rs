//! Dual-form entity identifiers.
//!
//! Current records carry native keys (UUIDs). Historical records may carry
//! plain strings instead, so every lookup goes through [`EntityId`], which
//! compares and hashes on a single normalized form.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::core::error::RepoError;

/// Longest accepted legacy identifier
pub const MAX_LEGACY_LEN: usize = 128;

/// Lengths of hex tokens treated as an attempted native key
const NATIVE_LIKE_LENS: std::ops::RangeInclusive<usize> = 30..=40;

/// Identifier of a course, lesson, annotation or note
#[derive(Debug, Clone)]
pub enum EntityId {
    /// Native store key
    Native(Uuid),

    /// Legacy opaque string key
    Legacy(String),
}

impl EntityId {
    /// Generate a fresh native identifier
    pub fn generate() -> Self {
        EntityId::Native(Uuid::new_v4())
    }

    /// Parse a caller-supplied identifier.
    ///
    /// Native keys are tried first; anything else must be a well-formed
    /// legacy token. Returns [`RepoError::MalformedIdentifier`] when the
    /// input fits neither form.
    pub fn parse(raw: &str) -> Result<Self, RepoError> {
        if raw.trim().is_empty() {
            return Err(RepoError::MalformedIdentifier(raw.to_string()));
        }

        if let Some(uuid) = parse_native(raw) {
            return Ok(EntityId::Native(uuid));
        }

        if is_damaged_native(raw) {
            return Err(RepoError::MalformedIdentifier(raw.to_string()));
        }

        if raw.len() > MAX_LEGACY_LEN || !raw.chars().all(is_legacy_char) {
            return Err(RepoError::MalformedIdentifier(raw.to_string()));
        }

        Ok(EntityId::Legacy(raw.to_string()))
    }

    /// Rebuild an identifier from a value already held in storage.
    ///
    /// Stored values were normalized on the way in, so no validation is
    /// performed here.
    pub fn from_stored(value: String) -> Self {
        match parse_native(&value) {
            Some(uuid) => EntityId::Native(uuid),
            None => EntityId::Legacy(value),
        }
    }

    /// The normalized form used for storage, equality and hashing
    pub fn normalized(&self) -> String {
        match self {
            EntityId::Native(uuid) => uuid.hyphenated().to_string(),
            EntityId::Legacy(raw) => match parse_native(raw) {
                Some(uuid) => uuid.hyphenated().to_string(),
                None => raw.clone(),
            },
        }
    }

    /// Whether this identifier is a native key
    pub fn is_native(&self) -> bool {
        matches!(self, EntityId::Native(_))
    }
}

fn parse_native(raw: &str) -> Option<Uuid> {
    // Only the hyphenated and simple forms count as native keys
    match raw.len() {
        32 | 36 => Uuid::try_parse(raw).ok(),
        _ => None,
    }
}

/// A UUID with a wrong group length or stray characters.
///
/// Plain hex tokens shorter than a UUID (24-char document ids) are legacy
/// keys, not broken native ones.
fn is_damaged_native(raw: &str) -> bool {
    if !raw.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        return false;
    }
    let groups = raw.split('-').count();
    NATIVE_LIKE_LENS.contains(&raw.len()) && (groups == 1 || groups == 5)
}

fn is_legacy_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

impl std::str::FromStr for EntityId {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityId::parse(s)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        EntityId::Native(uuid)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EntityId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
