//! Per-operation payload validation.
//!
//! Each operation has exactly one schema: a list of required fields,
//! all positive integers. Integer strings are coerced; unknown extra
//! fields are ignored. Failures come back as a per-field error map.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{FieldError, FieldErrors, Operation};

/// Required fields of one operation's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSchema {
    pub operation: Operation,
    pub required: &'static [&'static str],
}

impl PayloadSchema {
    pub fn for_operation(operation: Operation) -> Self {
        let required: &'static [&'static str] = match operation {
            Operation::ListLeagues => &[],
            Operation::GetLeagueMatches => &["leagueId", "season"],
            Operation::GetTeam => &["teamId"],
            Operation::GetMatch => &["teamId1", "teamId2"],
        };
        Self { operation, required }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.required.contains(&field)
    }
}

/// A payload that passed its operation's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayload {
    operation: Operation,
    fields: BTreeMap<&'static str, u64>,
}

impl ValidatedPayload {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn get(&self, field: &str) -> Option<u64> {
        self.fields.get(field).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.fields.iter().map(|(k, v)| (*k, *v))
    }
}

/// Validation capability consumed by the pipeline.
pub trait PayloadValidator: Send + Sync {
    fn validate(&self, operation: Operation, raw: &Value) -> Result<ValidatedPayload, FieldErrors>;
}

/// Validates against the built-in `PayloadSchema` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl PayloadValidator for SchemaValidator {
    fn validate(&self, operation: Operation, raw: &Value) -> Result<ValidatedPayload, FieldErrors> {
        validate_payload(operation, raw)
    }
}

pub fn validate_payload(operation: Operation, raw: &Value) -> Result<ValidatedPayload, FieldErrors> {
    let schema = PayloadSchema::for_operation(operation);
    let mut errors = FieldErrors::new();

    let object = match raw {
        Value::Object(map) => map,
        Value::Null => {
            errors.insert("payload".into(), FieldError::new("missing", "Field required"));
            return Err(errors);
        }
        _ => {
            errors.insert(
                "payload".into(),
                FieldError::new("dict_type", "Input should be a valid dictionary"),
            );
            return Err(errors);
        }
    };

    let mut fields = BTreeMap::new();
    for &name in schema.required {
        match object.get(name) {
            None | Some(Value::Null) => {
                errors.insert(name.to_string(), FieldError::new("missing", "Field required"));
            }
            Some(value) => match positive_int(value) {
                Ok(v) => {
                    fields.insert(name, v);
                }
                Err(e) => {
                    errors.insert(name.to_string(), e);
                }
            },
        }
    }

    if errors.is_empty() {
        Ok(ValidatedPayload { operation, fields })
    } else {
        Err(errors)
    }
}

fn positive_int(value: &Value) -> Result<u64, FieldError> {
    let n: i128 = match value {
        Value::Number(num) => {
            if let Some(i) = num.as_i64() {
                i128::from(i)
            } else if let Some(u) = num.as_u64() {
                i128::from(u)
            } else {
                let f = num.as_f64().unwrap_or(f64::NAN);
                if f.fract() != 0.0 || !f.is_finite() {
                    return Err(FieldError::new(
                        "int_from_float",
                        "Input should be a valid integer, got a number with a fractional part",
                    ));
                }
                f as i128
            }
        }
        Value::String(s) => s.trim().parse::<i128>().map_err(|_| {
            FieldError::new(
                "int_parsing",
                "Input should be a valid integer, unable to parse string as an integer",
            )
        })?,
        _ => return Err(FieldError::new("int_type", "Input should be a valid integer")),
    };

    if n <= 0 {
        return Err(FieldError::new("greater_than", "Input should be greater than 0"));
    }
    u64::try_from(n).map_err(|_| FieldError::new("int_too_large", "Input is too large for an integer"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
