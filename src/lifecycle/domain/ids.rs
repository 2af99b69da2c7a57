//! Identifier types for the lifecycle domain.

use super::LifecycleDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an epic, the unit of work a pipeline tracks.
///
/// Epic identifiers are used to derive document paths and mirror keys, so
/// they are restricted to ASCII alphanumerics, `-`, and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EpicId(String);

impl EpicId {
    /// Maximum identifier length.
    pub const MAX_LENGTH: usize = 64;

    /// Creates a validated epic identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleDomainError::InvalidEpicId`] when the trimmed value
    /// is empty, too long, or contains characters outside
    /// `[A-Za-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, LifecycleDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed.len() <= Self::MAX_LENGTH
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(LifecycleDomainError::InvalidEpicId(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EpicId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for EpicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EpicId {
    type Error = LifecycleDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EpicId> for String {
    fn from(value: EpicId) -> Self {
        value.0
    }
}
