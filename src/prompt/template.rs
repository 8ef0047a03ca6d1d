//! `{{name}}` placeholder substitution.
//!
//! Rendering is pure. Placeholders without a context entry stay verbatim so
//! the caller can report them; they never fail the render.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}";

static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();

fn placeholder() -> Option<&'static Regex> {
    PLACEHOLDER
        .get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).ok())
        .as_ref()
}

/// Flat string context for template rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Sets `name` to `value`, returning the updated context.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns `true` when `name` is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterates over the context names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Replaces every resolvable `{{name}}` in `text`.
///
/// `render("Hello {{name}}", {name: "Bob"})` yields `"Hello Bob"`; an unknown
/// placeholder such as `{{missing}}` is copied through unchanged.
#[must_use]
pub fn render(text: &str, context: &TemplateContext) -> String {
    let Some(pattern) = placeholder() else {
        return text.to_owned();
    };
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            caps.get(1)
                .and_then(|name| context.get(name.as_str()))
                .unwrap_or(whole)
                .to_owned()
        })
        .into_owned()
}

/// Lists placeholder names in `text` that `context` cannot resolve, in order
/// of first appearance and without duplicates.
#[must_use]
pub fn unresolved_placeholders(text: &str, context: &TemplateContext) -> Vec<String> {
    let Some(pattern) = placeholder() else {
        return Vec::new();
    };
    let mut missing: Vec<String> = Vec::new();
    for caps in pattern.captures_iter(text) {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if !context.contains(name) && !missing.iter().any(|seen| seen == name) {
            missing.push(name.to_owned());
        }
    }
    missing
}
