//! Subscription priority levels.
//!
//! Lower numeric values fire first. Ties are broken by subscription order.

use serde::{Deserialize, Serialize};

/// Ordinal priority of a subscription
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Fires before everything else.
    Highest = 0,
    /// Fires before normal subscribers.
    High = 25,
    /// Default level.
    #[default]
    Normal = 50,
    /// Fires after normal subscribers.
    Low = 75,
    /// Fires last.
    Lowest = 100,
}

impl Priority {
    /// Numeric value of this level
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Highest => write!(f, "Highest"),
            Priority::High => write!(f, "High"),
            Priority::Normal => write!(f, "Normal"),
            Priority::Low => write!(f, "Low"),
            Priority::Lowest => write!(f, "Lowest"),
        }
    }
}
