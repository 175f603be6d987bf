// 🧹 Field Normalization - Dates, booleans, names
//
// Imported spreadsheets carry the same value in many shapes:
// "15/01/2024" vs "2024-01-15", "oui" vs "yes" vs "1", " Acme  Corp " vs "ACME CORP".
// Everything here degrades to a fallback instead of failing.

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

// ============================================================================
// FIELD VALUE
// ============================================================================

/// A raw value coming from an import row or a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Date(NaiveDate),
    Bool(bool),
    Number(f64),
}

impl FieldValue {
    /// Empty and whitespace-only text count as null
    pub fn from_optional(value: Option<&str>) -> Self {
        match value {
            Some(s) if !s.trim().is_empty() => FieldValue::Text(s.to_string()),
            _ => FieldValue::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Display form used in diffs and reports
    pub fn display(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::Date(d) => d.format(ISO_DATE).to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

// ============================================================================
// NORMALIZED RESULT
// ============================================================================

/// Normalized value plus whether normalization actually succeeded.
/// When `ok` is false, `value` holds the untouched fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub ok: bool,
}

impl<T> Normalized<T> {
    fn ok(value: T) -> Self {
        Normalized { value, ok: true }
    }

    fn fallback(value: T) -> Self {
        Normalized { value, ok: false }
    }
}

const ISO_DATE: &str = "%Y-%m-%d";

/// Accepted input formats, tried in order after ISO
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

// ============================================================================
// DATES
// ============================================================================

/// Normalize a date to ISO `YYYY-MM-DD`
///
/// - ISO text is returned zero-padded
/// - `Date` values are formatted
/// - `DD/MM/YYYY`, `DD-MM-YYYY`, `YYYY/MM/DD`, `DD.MM.YYYY` are converted
/// - anything else comes back as-is with `ok = false`
pub fn normalize_date(value: &FieldValue) -> Normalized<String> {
    match value {
        FieldValue::Null => Normalized::ok(String::new()),
        FieldValue::Date(d) => Normalized::ok(d.format(ISO_DATE).to_string()),
        FieldValue::Text(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Normalized::ok(String::new());
            }

            // Reformat even ISO input: chrono accepts unpadded "2024-1-5"
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_DATE) {
                return Normalized::ok(date.format(ISO_DATE).to_string());
            }

            for format in DATE_FORMATS {
                if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                    return Normalized::ok(date.format(ISO_DATE).to_string());
                }
            }

            warn!("Unparseable date {:?}, keeping raw value", raw);
            Normalized::fallback(raw.clone())
        }
        other => {
            warn!("Cannot normalize {:?} as a date, keeping display form", other);
            Normalized::fallback(other.display())
        }
    }
}

// ============================================================================
// BOOLEANS
// ============================================================================

/// Normalize yes/no style values. Unknown input yields `None`.
pub fn normalize_boolean(value: &FieldValue) -> Option<bool> {
    match value {
        FieldValue::Bool(b) => Some(*b),
        FieldValue::Number(n) if *n == 1.0 => Some(true),
        FieldValue::Number(n) if *n == 0.0 => Some(false),
        FieldValue::Text(raw) => match raw.trim().to_lowercase().as_str() {
            "oui" | "yes" | "1" | "true" => Some(true),
            "non" | "no" | "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// NAMES
// ============================================================================

/// Trim and collapse internal whitespace, keeping case
///
/// Example: "  Acme   Corp " → "Acme Corp"
pub fn clean_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive matching key for organization names
pub fn name_key(name: &str) -> String {
    clean_name(name).to_lowercase()
}

/// True for None, empty, or whitespace-only names
pub fn is_blank(name: Option<&str>) -> bool {
    name.map_or(true, |s| s.trim().is_empty())
}

// ============================================================================
// FIELD COMPARISON
// ============================================================================

/// How a field should be normalized before comparing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    Boolean,
}

/// Outcome of comparing a stored value with an incoming one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: String,
    pub current: String,
    pub incoming: String,
    pub changed: bool,
}

/// Compare two values after normalizing both sides
pub fn compare_fields(
    field: &str,
    kind: FieldKind,
    current: &FieldValue,
    incoming: &FieldValue,
) -> FieldComparison {
    let (current_form, incoming_form) = match kind {
        FieldKind::Date => (normalize_date(current).value, normalize_date(incoming).value),
        FieldKind::Boolean => (
            boolean_display(normalize_boolean(current)),
            boolean_display(normalize_boolean(incoming)),
        ),
        FieldKind::Text => (current.display(), incoming.display()),
    };

    FieldComparison {
        field: field.to_string(),
        changed: current_form != incoming_form,
        current: current_form,
        incoming: incoming_form,
    }
}

fn boolean_display(value: Option<bool>) -> String {
    value.map(|b| b.to_string()).unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_date_unchanged() {
        let result = normalize_date(&FieldValue::from("2024-01-15"));
        assert!(result.ok);
        assert_eq!(result.value, "2024-01-15");
    }

    #[test]
    fn test_unpadded_iso_date_is_padded() {
        let result = normalize_date(&FieldValue::from("2024-1-5"));
        assert!(result.ok);
        assert_eq!(result.value, "2024-01-05");

        let cmp = compare_fields(
            "start_date",
            FieldKind::Date,
            &FieldValue::from("2024-1-5"),
            &FieldValue::from("2024-01-05"),
        );
        assert!(!cmp.changed);
    }

    #[test]
    fn test_date_value_formatted() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let result = normalize_date(&FieldValue::Date(date));
        assert!(result.ok);
        assert_eq!(result.value, "2024-01-15");
    }

    #[test]
    fn test_french_date_converted() {
        assert_eq!(normalize_date(&FieldValue::from("15/01/2024")).value, "2024-01-15");
        assert_eq!(normalize_date(&FieldValue::from("15-01-2024")).value, "2024-01-15");
        assert_eq!(normalize_date(&FieldValue::from("2024/01/15")).value, "2024-01-15");
    }

    #[test]
    fn test_unparseable_date_falls_back() {
        let result = normalize_date(&FieldValue::from("next tuesday"));
        assert!(!result.ok);
        assert_eq!(result.value, "next tuesday");

        // Impossible calendar date
        let result = normalize_date(&FieldValue::from("31/02/2024"));
        assert!(!result.ok);
        assert_eq!(result.value, "31/02/2024");
    }

    #[test]
    fn test_boolean_true_values() {
        for input in ["oui", "yes", "1", "OUI", " Yes "] {
            assert_eq!(normalize_boolean(&FieldValue::from(input)), Some(true), "{}", input);
        }
        assert_eq!(normalize_boolean(&FieldValue::Bool(true)), Some(true));
    }

    #[test]
    fn test_boolean_false_values() {
        for input in ["non", "no", "0", "NON"] {
            assert_eq!(normalize_boolean(&FieldValue::from(input)), Some(false), "{}", input);
        }
        assert_eq!(normalize_boolean(&FieldValue::Bool(false)), Some(false));
    }

    #[test]
    fn test_boolean_unknown_is_none() {
        assert_eq!(normalize_boolean(&FieldValue::from("maybe")), None);
        assert_eq!(normalize_boolean(&FieldValue::from("vrai")), None);
        assert_eq!(normalize_boolean(&FieldValue::from("faux")), None);
        assert_eq!(normalize_boolean(&FieldValue::from("")), None);
        assert_eq!(normalize_boolean(&FieldValue::Null), None);
    }

    #[test]
    fn test_clean_name_and_key() {
        assert_eq!(clean_name("  Acme   Corp "), "Acme Corp");
        assert_eq!(name_key("  ACME   corp"), "acme corp");
        assert!(is_blank(None));
        assert!(is_blank(Some("   ")));
        assert!(!is_blank(Some("Ghost Inc")));
    }

    #[test]
    fn test_compare_dates_across_formats() {
        let cmp = compare_fields(
            "start_date",
            FieldKind::Date,
            &FieldValue::from("2024-01-15"),
            &FieldValue::from("15/01/2024"),
        );
        assert!(!cmp.changed);

        let cmp = compare_fields(
            "start_date",
            FieldKind::Date,
            &FieldValue::from("2024-01-15"),
            &FieldValue::from("16/01/2024"),
        );
        assert!(cmp.changed);
        assert_eq!(cmp.current, "2024-01-15");
        assert_eq!(cmp.incoming, "2024-01-16");
    }

    #[test]
    fn test_compare_booleans_and_text() {
        let cmp = compare_fields(
            "renewable",
            FieldKind::Boolean,
            &FieldValue::Bool(true),
            &FieldValue::from("oui"),
        );
        assert!(!cmp.changed);

        let cmp = compare_fields(
            "title",
            FieldKind::Text,
            &FieldValue::from("Cleaning "),
            &FieldValue::from("Cleaning"),
        );
        assert!(!cmp.changed);

        let cmp = compare_fields(
            "title",
            FieldKind::Text,
            &FieldValue::Null,
            &FieldValue::from("Cleaning"),
        );
        assert!(cmp.changed);
    }
}
