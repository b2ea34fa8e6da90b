//! Validation of caller arguments against per-method JSON schemas

use jsonschema::JSONSchema;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorCode, Result};
use crate::organism::Kwargs;

/// What one sort of argument may contain
#[derive(Clone)]
enum Accepts {
    Nothing,
    Anything,
    Matching { raw: Value, schema: Arc<JSONSchema> },
}

impl Accepts {
    fn compile(schema: Option<Value>, field: &str) -> Result<Self> {
        match schema {
            None => Ok(Self::Nothing),
            Some(Value::Object(map)) if map.is_empty() => Ok(Self::Anything),
            Some(raw) => {
                let schema = JSONSchema::compile(&raw)
                    .map_err(|e| Error::config(format!("Invalid {} schema: {}", field, e)))?;
                Ok(Self::Matching {
                    raw,
                    schema: Arc::new(schema),
                })
            }
        }
    }

    fn raw(&self) -> Option<Value> {
        match self {
            Self::Nothing => None,
            Self::Anything => Some(Value::Object(Kwargs::new())),
            Self::Matching { raw, .. } => Some(raw.clone()),
        }
    }

    fn check(&self, instance: Value, present: bool, field: &str) -> Result<()> {
        match self {
            Self::Nothing if present => Err(Error::validation_with_code(
                ErrorCode::VALIDATION_UNEXPECTED_ARGS,
                format!("Received {} for request where there should be none", field),
                Some(field.to_string()),
            )),
            Self::Nothing | Self::Anything => Ok(()),
            Self::Matching { schema, .. } => {
                if let Err(errors) = schema.validate(&instance) {
                    let message = errors
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Err(Error::validation_with_code(
                        ErrorCode::VALIDATION_SCHEMA,
                        message,
                        Some(field.to_string()),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Compiled schemas for the positional and keyword arguments of one method.
///
/// A missing schema means the method accepts no arguments of that sort.
#[derive(Clone)]
pub struct InputSchema {
    args: Accepts,
    kwargs: Accepts,
}

impl fmt::Debug for InputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSchema")
            .field("args", &self.args.raw())
            .field("kwargs", &self.kwargs.raw())
            .finish()
    }
}

impl Default for InputSchema {
    /// Accept any arguments
    fn default() -> Self {
        Self {
            args: Accepts::Anything,
            kwargs: Accepts::Anything,
        }
    }
}

impl InputSchema {
    /// Accept no arguments at all
    pub fn none() -> Self {
        Self {
            args: Accepts::Nothing,
            kwargs: Accepts::Nothing,
        }
    }

    /// Compile the schemas; an invalid schema is a configuration error
    pub fn new(args: Option<Value>, kwargs: Option<Value>) -> Result<Self> {
        Ok(Self {
            args: Accepts::compile(args, "args")?,
            kwargs: Accepts::compile(kwargs, "kwargs")?,
        })
    }

    pub fn args_schema(&self) -> Option<Value> {
        self.args.raw()
    }

    pub fn kwargs_schema(&self) -> Option<Value> {
        self.kwargs.raw()
    }

    pub fn validate(&self, args: &[Value], kwargs: &Kwargs) -> Result<()> {
        self.args
            .check(Value::Array(args.to_vec()), !args.is_empty(), "args")?;
        self.kwargs
            .check(Value::Object(kwargs.clone()), !kwargs.is_empty(), "kwargs")
    }
}
