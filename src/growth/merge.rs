//! Merge strategies folding processor successes into output records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, ErrorCode, Result};
use crate::processor::{ErrorRecord, Operation, Processor};

/// The closed set of merge strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContributeType {
    #[serde(alias = "append")]
    Append,
}

impl fmt::Display for ContributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => f.write_str("Append"),
        }
    }
}

impl FromStr for ContributeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Append" | "append" => Ok(Self::Append),
            other => Err(Error::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_CONTRIBUTE_TYPE,
                format!("Unknown contribute type '{}'", other),
            )),
        }
    }
}

/// Records to merge plus the success items that could not be contributed
#[derive(Debug, Default)]
pub struct Contribution {
    pub records: Vec<Value>,
    pub errors: Vec<ErrorRecord>,
}

/// Run the contribute operation over every success item.
///
/// Records are concatenated in input order. Items whose contribution fails are
/// returned as error records, except configuration errors which abort.
pub async fn contribute(
    contribute_type: ContributeType,
    processor: &dyn Processor,
    operation: Operation,
    successes: Vec<Value>,
) -> Result<Contribution> {
    match contribute_type {
        ContributeType::Append => {
            let mut contribution = Contribution::default();
            for item in successes {
                match processor.contribute(operation, item.clone()).await {
                    Ok(records) => contribution.records.extend(records),
                    Err(e) if e.is_config() => return Err(e),
                    Err(e) => {
                        debug!("Contribution failed: {}", e);
                        contribution
                            .errors
                            .push(ErrorRecord::from_error(operation, &e).with_payload(item));
                    }
                }
            }
            Ok(contribution)
        }
    }
}
