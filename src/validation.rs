//! Turns `validator` rule violations into flat `{namespace, message}` pairs.

use std::borrow::Cow;

use serde::Serialize;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldResult {
    pub namespace: String,
    pub message: String,
}

/// Runs the derived rules and maps any violation to a validation error.
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(|errors| {
        let fields = field_errors(&errors);
        let message = fields
            .first()
            .map(|field| format!("{}: {}", field.namespace, field.message))
            .unwrap_or_else(|| "invalid request".to_string());
        AppError::Validation { message, fields }
    })
}

pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldResult> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort_by(|a, b| a.namespace.cmp(&b.namespace));
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldResult>) {
    for (field, kind) in errors.errors() {
        let namespace = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|error| FieldResult {
                    namespace: namespace.clone(),
                    message: message_for(error),
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, &namespace, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(nested, &format!("{namespace}[{index}]"), out);
                }
            }
        }
    }
}

fn message_for(error: &ValidationError) -> String {
    let param = |name: &str| error.params.get(name).map(|value| value.to_string());
    match &*error.code {
        "length" => match (param("min"), param("max")) {
            (Some(min), None) if min == "1" => "this field is required".to_string(),
            (Some(min), None) => format!("the minimum length is {min}"),
            (None, Some(max)) => format!("the maximum length is {max}"),
            (Some(min), Some(max)) => format!("the length must be between {min} and {max}"),
            (None, None) => "invalid length".to_string(),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("the value must be between {min} and {max}"),
            (Some(min), None) => format!("the minimum value is {min}"),
            (None, Some(max)) => format!("the maximum value is {max}"),
            (None, None) => "value out of range".to_string(),
        },
        "email" => "must be a valid email address".to_string(),
        "must_match" => "the values do not match".to_string(),
        code => error
            .message
            .clone()
            .unwrap_or_else(|| Cow::Owned(code.to_string()))
            .into_owned(),
    }
}
