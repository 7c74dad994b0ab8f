//! Structured setting names.
//!
//! A name like `rendering/driver.windows.debug` is a feature-tagged variant of
//! the base setting `rendering/driver`, selected when the `windows` or `debug`
//! feature is active.

use std::fmt;

/// A setting name split into its base and feature tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingKey {
    base: String,
    tags: Vec<String>,
}

impl SettingKey {
    /// Splits `name` at every `.`; the first segment is the base, each
    /// following segment (trimmed) is a feature tag.
    pub fn parse(name: &str) -> Self {
        let mut parts = name.split('.');
        let base = parts.next().unwrap_or_default().to_string();
        let tags = parts.map(|tag| tag.trim().to_string()).collect();
        Self { base, tags }
    }

    /// The base setting name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Feature tags in declaration order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns `true` if the name carries at least one feature tag.
    pub fn is_override(&self) -> bool {
        !self.tags.is_empty()
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for tag in &self.tags {
            write!(f, ".{tag}")?;
        }
        Ok(())
    }
}
