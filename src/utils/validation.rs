use std::sync::LazyLock;

use mongodb::bson::oid::ObjectId;
use regex::Regex;
use validator::Validate;

use crate::error::{MarketError, MarketResult};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

pub fn validate_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Runs the DTO's `validator` rules and reports the first failing field.
pub fn validate_dto<T: Validate>(dto: &T) -> MarketResult<()> {
    let Err(errors) = dto.validate() else {
        return Ok(());
    };

    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by_key(|(field, _)| **field);

    let message = fields
        .first()
        .map(|(field, errs)| {
            errs.first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| format!("Invalid {}", field))
        })
        .unwrap_or_else(|| "Invalid request".to_string());

    Err(MarketError::Validation(message))
}

/// Trimmed, non-blank text or a validation error carrying `message`.
pub fn require_text(value: &str, message: &str) -> MarketResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(MarketError::validation(message))
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn parse_object_id(raw: &str, what: &str) -> MarketResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| MarketError::validation(format!("Invalid {} ID", what)))
}
