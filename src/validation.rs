// 📐 Record Validation - Error collection attached to a record
//
// Validation failures are collected, never thrown. The caller decides
// whether a non-empty collection is fatal.

use serde::{Deserialize, Serialize};

/// Field name used for errors that concern the whole record
pub const BASE: &str = "base";

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// VALIDATION ERRORS
// ============================================================================

/// Errors accumulated while validating one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    context: String,
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new(context: &str) -> Self {
        ValidationErrors {
            context: context.to_string(),
            errors: Vec::new(),
        }
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            context: self.context.clone(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn on(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// Messages ready for display; base errors are not prefixed with a field name
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| {
                if e.field == BASE {
                    e.message.clone()
                } else {
                    format!("{} {}", e.field, e.message)
                }
            })
            .collect()
    }

    /// `Ok(())` when empty, the collection otherwise
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_messages().join("; "))
    }
}
