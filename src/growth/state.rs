//! Growth lifecycle states and the transitions between them

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthState {
    New,
    Processing,
    Complete,
    Partial,
    Error,
    Retry,
}

impl GrowthState {
    /// `begin` is legal from NEW and RETRY only
    pub fn can_begin(self) -> bool {
        matches!(self, Self::New | Self::Retry)
    }

    /// `finish` is legal while processing and idempotent once finished
    pub fn can_finish(self) -> bool {
        matches!(self, Self::Processing | Self::Complete | Self::Partial)
    }

    /// Operator reset of stuck or failed growths
    pub fn can_reset(self) -> bool {
        matches!(self, Self::Processing | Self::Error)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Partial)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Processing => "Processing",
            Self::Complete => "Complete",
            Self::Partial => "Partial",
            Self::Error => "Error",
            Self::Retry => "Retry",
        }
    }
}

impl fmt::Display for GrowthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the lifecycle allows moving from one state to another
pub fn validate_transition(from: GrowthState, to: GrowthState) -> bool {
    use GrowthState::*;

    match (from, to) {
        (New | Retry, Processing) => true,
        (Processing, Complete | Partial | Error) => true,
        (Processing | Error, Retry) => true,
        _ => false,
    }
}
