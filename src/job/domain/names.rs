//! Validated names for agents, capabilities and target frameworks.
//!
//! Names select prompt directories on disk, so they are normalized the same
//! way everywhere (`"Code Architect"` becomes `code_architect`) and then
//! restricted to `[a-z0-9_-]`. A valid name can never contain a path
//! separator or `..`.

use super::JobDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a normalized name.
const MAX_NAME_LENGTH: usize = 100;

/// Trims, lowercases and underscores `raw`, then validates the result.
///
/// Spaces and every character in `separators` become `_`.
pub(crate) fn normalize_slug(
    kind: &'static str,
    raw: &str,
    separators: &[char],
) -> Result<String, JobDomainError> {
    let normalized: String = raw
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c == ' ' || separators.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    if normalized.is_empty() {
        return Err(JobDomainError::EmptyName { kind });
    }

    let is_valid = normalized.len() <= MAX_NAME_LENGTH
        && normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !is_valid {
        return Err(JobDomainError::InvalidName {
            kind,
            value: raw.to_owned(),
        });
    }

    Ok(normalized)
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal, [$($sep:literal),*]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a normalized, validated name.
            ///
            /// # Errors
            ///
            /// Returns [`JobDomainError::EmptyName`] or
            /// [`JobDomainError::InvalidName`] when the normalized value is
            /// empty or contains characters outside `[a-z0-9_-]`.
            pub fn new(value: impl AsRef<str>) -> Result<Self, JobDomainError> {
                normalize_slug($kind, value.as_ref(), &[$($sep),*]).map(Self)
            }

            /// Returns the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = JobDomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

validated_name!(
    /// Agent identifier, for example `code_architect`.
    AgentName,
    "agent",
    []
);

validated_name!(
    /// Capability identifier, for example `analyze`.
    CapabilityName,
    "capability",
    []
);

validated_name!(
    /// Target framework identifier, for example `rust` or `spring_boot`.
    ///
    /// `/` and `.` are also mapped to `_`, so `node.js` becomes `node_js`.
    TargetName,
    "target",
    ['/', '.']
);

/// Converts a free-form task name into a folder-safe slug.
///
/// Unlike the validated names this never fails: unsupported characters are
/// replaced with `_` and an empty result becomes `task`.
#[must_use]
pub fn folder_slug(raw: &str) -> String {
    let slug: String = raw
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if slug.chars().all(|c| c == '_') {
        "task".to_owned()
    } else {
        slug
    }
}
