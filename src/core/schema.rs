//! JSON shape validation at the API trust boundary.
//!
//! Every violation is reported with its dotted field path, so a malformed
//! body produces one error naming all offending fields instead of failing on
//! the first one serde happens to hit.

use crate::domain::model::{ExtractionResult, JobStatus};
use crate::utils::error::{ExtractError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

#[derive(Debug, Clone)]
pub enum Schema {
    String,
    Literal(&'static str),
    Enum(&'static [&'static str]),
    Object(Vec<Field>),
    Union(Vec<Schema>),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub schema: Schema,
    pub required: bool,
}

impl Field {
    pub fn required(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: true,
        }
    }

    pub fn optional(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Schema {
    pub fn check(&self, value: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.collect(value, &mut Vec::new(), &mut violations);
        violations
    }

    pub fn matches(&self, value: &Value) -> bool {
        self.check(value).is_empty()
    }

    fn collect(&self, value: &Value, path: &mut Vec<&'static str>, out: &mut Vec<Violation>) {
        let message = match self {
            Schema::String if !value.is_string() => {
                format!("Expected string, received {}", type_name(value))
            }
            Schema::String => return,
            Schema::Literal(expected) if value.as_str() != Some(*expected) => {
                format!("Invalid literal value, expected \"{}\"", expected)
            }
            Schema::Literal(_) => return,
            Schema::Enum(options) => match value.as_str() {
                Some(actual) if options.iter().any(|option| *option == actual) => return,
                Some(actual) => {
                    let expected = options
                        .iter()
                        .map(|option| format!("'{}'", option))
                        .collect::<Vec<_>>()
                        .join(" | ");
                    format!("Invalid enum value. Expected {}, received '{}'", expected, actual)
                }
                None => format!("Expected string, received {}", type_name(value)),
            },
            Schema::Object(fields) => {
                let Some(object) = value.as_object() else {
                    out.push(Violation {
                        path: path.join("."),
                        message: format!("Expected object, received {}", type_name(value)),
                    });
                    return;
                };
                for field in fields {
                    path.push(field.name);
                    match object.get(field.name) {
                        Some(inner) => field.schema.collect(inner, path, out),
                        None if field.required => out.push(Violation {
                            path: path.join("."),
                            message: "Required".to_string(),
                        }),
                        None => {}
                    }
                    path.pop();
                }
                return;
            }
            Schema::Union(options) if options.iter().any(|option| option.matches(value)) => return,
            Schema::Union(_) => "Invalid input".to_string(),
        };

        out.push(Violation {
            path: path.join("."),
            message,
        });
    }
}

/// 驗證 JSON 結構後再交給 serde 轉成型別
pub fn validate_response<T: DeserializeOwned>(schema: &Schema, value: Value, context: &str) -> Result<T> {
    let violations = schema.check(&value);
    if !violations.is_empty() {
        let errors = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ExtractError::Validation {
            message: format!("Invalid {} response: {}", context, errors),
        });
    }

    serde_json::from_value(value).map_err(|e| ExtractError::Validation {
        message: format!("Invalid {} response: {}", context, e),
    })
}

/// Never fails: malformed payloads fall back to a generic message.
pub fn extract_error_message(value: &Value) -> String {
    if !api_error().matches(value) {
        return DEFAULT_ERROR_MESSAGE.to_string();
    }

    ["detail", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .unwrap_or(DEFAULT_ERROR_MESSAGE)
        .to_string()
}

/// Pending 先判斷，其次 Completed，兩者皆不符視為協定錯誤
pub fn decode_job_status(value: Value) -> Result<JobStatus> {
    if job_pending_response().matches(&value) {
        return Ok(JobStatus::Pending);
    }

    if job_completed_response().matches(&value) {
        let result: ExtractionResult = validate_response(&job_completed_response(), value, "job status")?;
        return Ok(JobStatus::Completed(result));
    }

    Err(ExtractError::UnexpectedJobResponse)
}

pub fn api_error() -> Schema {
    Schema::Object(vec![
        Field::optional("message", Schema::String),
        Field::optional("detail", Schema::String),
    ])
}

pub fn login_response() -> Schema {
    Schema::Object(vec![
        Field::required("access_token", Schema::String),
        Field::required("refresh_token", Schema::String),
        Field::required("token_type", Schema::String),
        Field::required("name", Schema::String),
        Field::required("user_id", Schema::String),
    ])
}

pub fn register_response() -> Schema {
    Schema::Object(vec![Field::required("message", Schema::String)])
}

pub fn refresh_token_response() -> Schema {
    Schema::Object(vec![
        Field::required("access_token", Schema::String),
        Field::required("refresh_token", Schema::String),
        Field::required("token_type", Schema::String),
    ])
}

pub fn queued_job_response() -> Schema {
    Schema::Object(vec![
        Field::required("message", Schema::String),
        Field::required("message_id", Schema::String),
        Field::required("status", Schema::Enum(&["queued", "pending"])),
    ])
}

pub fn job_pending_response() -> Schema {
    Schema::Object(vec![Field::required("status", Schema::Literal("pending"))])
}

pub fn job_completed_response() -> Schema {
    Schema::Object(vec![
        Field::required("content", Schema::String),
        Field::required("description", Schema::String),
        Field::required("request_id", Schema::String),
    ])
}

pub fn job_status_response() -> Schema {
    Schema::Union(vec![job_pending_response(), job_completed_response()])
}
