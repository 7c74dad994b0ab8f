//! Property descriptors produced when listing settings.

use crate::value::ValueType;

/// Usage bitflags of a listed property. Combine via bitwise OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyUsage(pub u32);

impl PropertyUsage {
    /// No usage.
    pub const NONE: Self = Self(0);
    /// Persisted when settings are saved.
    pub const STORAGE: Self = Self(1 << 1);
    /// Shown in editors.
    pub const EDITOR: Self = Self(1 << 2);
    /// Engine-internal.
    pub const INTERNAL: Self = Self(1 << 3);
    /// Shown even when advanced settings are hidden.
    pub const BASIC: Self = Self(1 << 4);
    /// Changing the value requires a restart.
    pub const RESTART_IF_CHANGED: Self = Self(1 << 5);

    /// Returns true if `self` contains all bits in `other`.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PropertyUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PropertyUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Editing hint attached to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyHint {
    /// No hint.
    #[default]
    None,
    /// Numeric range, `"min,max[,step]"`.
    Range,
    /// One of a comma-separated list of names.
    Enum,
    /// Bit flags with comma-separated names.
    Flags,
    /// A `res://` file, hint string holds filters.
    File,
    /// A `res://` directory.
    Dir,
    /// An OS file path.
    GlobalFile,
    /// An OS directory path.
    GlobalDir,
    /// Placeholder text for empty strings.
    Placeholder,
    /// Multi-line text.
    MultilineText,
}

/// Type and editing information for one setting.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    /// Full setting name.
    pub name: String,
    /// Expected value type.
    pub value_type: ValueType,
    /// Editing hint.
    pub hint: PropertyHint,
    /// Hint parameters.
    pub hint_string: String,
    /// Usage flags; computed when listing.
    pub usage: PropertyUsage,
}

impl PropertyInfo {
    /// Creates a descriptor without a hint.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            hint: PropertyHint::None,
            hint_string: String::new(),
            usage: PropertyUsage::NONE,
        }
    }

    /// Sets the hint and hint string.
    #[must_use]
    pub fn with_hint(mut self, hint: PropertyHint, hint_string: impl Into<String>) -> Self {
        self.hint = hint;
        self.hint_string = hint_string.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags_combine() {
        let usage = PropertyUsage::STORAGE | PropertyUsage::EDITOR;
        assert!(usage.contains(PropertyUsage::STORAGE));
        assert!(usage.contains(PropertyUsage::EDITOR));
        assert!(!usage.contains(PropertyUsage::INTERNAL));
    }
}
