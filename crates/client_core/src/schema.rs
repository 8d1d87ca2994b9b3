//! Single boundary between untyped agent results and typed domain data.

use serde_json::Value;
use shared::{
    domain::{EmailReceipt, Repository},
    error::SchemaError,
};

const REPOSITORIES_FIELD: &str = "repositories";

fn present(result: Option<&Value>) -> Result<&Value, SchemaError> {
    match result {
        None | Some(Value::Null) => Err(SchemaError::MissingResult),
        Some(value) => Ok(value),
    }
}

/// Extracts `result.repositories`. Individual entries never fail; missing or
/// mistyped fields inside an entry fall back to defaults.
pub fn parse_repositories(result: Option<&Value>) -> Result<Vec<Repository>, SchemaError> {
    let object = present(result)?
        .as_object()
        .ok_or(SchemaError::NotAnObject)?;

    match object.get(REPOSITORIES_FIELD) {
        None | Some(Value::Null) => Err(SchemaError::MissingField(REPOSITORIES_FIELD)),
        Some(Value::Array(items)) => Ok(items.iter().cloned().map(Repository::from_value).collect()),
        Some(_) => Err(SchemaError::NotAList(REPOSITORIES_FIELD)),
    }
}

pub fn parse_email_receipt(result: Option<&Value>) -> Result<EmailReceipt, SchemaError> {
    let value = present(result)?;
    if !value.is_object() {
        return Err(SchemaError::NotAnObject);
    }
    serde_json::from_value(value.clone()).map_err(|_| SchemaError::NotAnObject)
}
