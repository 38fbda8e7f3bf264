//! Diagnostic severity and its presentation mappings.

use serde::{Deserialize, Serialize};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Normal,
    Low,
}

/// Problem-list category a severity is shown under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    Error,
    Warning,
    Message,
}

/// Problem-list priority icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    High,
    Normal,
    Low,
}

/// Visual style of an inline squiggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SquiggleKind {
    Error,
    Warning,
    Suggestion,
}

impl Severity {
    #[must_use]
    pub fn category(self) -> TaskCategory {
        match self {
            Self::High => TaskCategory::Error,
            Self::Normal => TaskCategory::Warning,
            Self::Low => TaskCategory::Message,
        }
    }

    #[must_use]
    pub fn priority(self) -> TaskPriority {
        match self {
            Self::High => TaskPriority::High,
            Self::Normal => TaskPriority::Normal,
            Self::Low => TaskPriority::Low,
        }
    }

    #[must_use]
    pub fn squiggle_kind(self) -> SquiggleKind {
        match self {
            Self::High => SquiggleKind::Error,
            Self::Normal => SquiggleKind::Warning,
            Self::Low => SquiggleKind::Suggestion,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "error",
            Self::Normal => "warning",
            Self::Low => "info",
        }
    }
}
