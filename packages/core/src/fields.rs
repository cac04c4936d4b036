//! Per-form validation errors.
//!
//! One [`FieldErrorAggregator`] per form. A field is in error exactly when
//! it has an entry in the map.

use std::collections::HashMap;

use serde_json::Value;

use crate::failure::{AppError, RawFailure};
use crate::handler::{ErrorHandler, HandleOptions};

pub struct FieldErrorAggregator {
    errors: HashMap<String, String>,
    handler: ErrorHandler,
}

impl FieldErrorAggregator {
    pub fn new(handler: ErrorHandler) -> Self {
        Self {
            errors: HashMap::new(),
            handler,
        }
    }

    pub fn set_field_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(field.into(), message.into());
    }

    pub fn clear_field_error(&mut self, field: &str) {
        self.errors.remove(field);
    }

    pub fn clear_all(&mut self) {
        self.errors.clear();
    }

    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn has_field_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    /// Replace the whole map with `errors`.
    pub fn apply_field_errors(&mut self, errors: HashMap<String, String>) {
        self.errors = errors;
    }

    /// Replace the map from a validation-layer JSON payload.
    ///
    /// The payload must be an object of `field -> message`. Array values
    /// contribute their first string, other scalars are stringified and
    /// `null` entries are skipped. Anything other than an object is turned
    /// into a `VALIDATION` error, reported through the handler, and
    /// returned; the current map is left as it was.
    pub fn apply_validation_errors(&mut self, payload: &Value) -> Result<(), AppError> {
        let Value::Object(fields) = payload else {
            let raw = RawFailure::validation(format!(
                "Malformed validation payload: expected an object of field errors, got {}",
                json_type_name(payload)
            ))
            .with_details(payload.clone());
            return Err(self.handler.handle(&raw, &HandleOptions::default()));
        };

        self.errors = fields
            .iter()
            .filter_map(|(field, value)| field_message(value).map(|m| (field.clone(), m)))
            .collect();

        tracing::debug!(fields = self.errors.len(), "Applied validation errors");
        Ok(())
    }
}

fn field_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        Value::Array(messages) => messages.iter().find_map(|m| m.as_str().map(str::to_string)),
        other => Some(other.to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
