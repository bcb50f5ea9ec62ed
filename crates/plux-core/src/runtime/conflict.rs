use serde::{Deserialize, Serialize};

/// How a manager treats two discovered specifications sharing one
/// `(namespace, name)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep the specification discovered first, ignore later ones
    #[default]
    FirstWins,
    /// A later specification replaces the earlier one, keeping its position
    LastWins,
    /// Fail building the index
    Error,
}

impl ConflictPolicy {
    pub fn description(&self) -> &'static str {
        match self {
            ConflictPolicy::FirstWins => "first discovered specification wins",
            ConflictPolicy::LastWins => "last discovered specification wins",
            ConflictPolicy::Error => "duplicate specifications are an error",
        }
    }
}
