// 🔐 Password Strength - every violated rule is reported at once

use crate::validation::ValidationErrors;

pub const MIN_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    SpecialCharacter,
}

impl PasswordRule {
    pub fn message(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "at least 8 characters",
            PasswordRule::Uppercase => "one uppercase letter",
            PasswordRule::Lowercase => "one lowercase letter",
            PasswordRule::Digit => "one digit",
            PasswordRule::SpecialCharacter => "one special character",
        }
    }
}

/// Return every rule the password violates, in a stable order
pub fn check_password(password: &str) -> Vec<PasswordRule> {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_LENGTH {
        violations.push(PasswordRule::MinLength);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        violations.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        violations.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordRule::Digit);
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        violations.push(PasswordRule::SpecialCharacter);
    }

    violations
}

/// One human-readable sentence listing all violations, or None if strong enough
pub fn password_error_message(violations: &[PasswordRule]) -> Option<String> {
    if violations.is_empty() {
        return None;
    }

    let parts: Vec<&str> = violations.iter().map(|r| r.message()).collect();
    Some(format!("must contain {}", parts.join(", ")))
}

/// Add the aggregated message to `errors` under the `password` field
pub fn validate_password(password: &str, errors: &mut ValidationErrors) {
    if let Some(message) = password_error_message(&check_password(password)) {
        errors.add("password", &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password_passes() {
        assert!(check_password("Abcdefgh1!").is_empty());

        let mut errors = ValidationErrors::new("User");
        validate_password("Abcdefgh1!", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_all_lowercase_reports_every_rule() {
        let violations = check_password("abcdef");
        assert_eq!(
            violations,
            vec![
                PasswordRule::MinLength,
                PasswordRule::Uppercase,
                PasswordRule::Digit,
                PasswordRule::SpecialCharacter,
            ]
        );

        let long = check_password("abcdefghijkl");
        assert_eq!(long.len(), 3);
        assert!(!long.contains(&PasswordRule::MinLength));
    }

    #[test]
    fn test_single_aggregated_message() {
        let mut errors = ValidationErrors::new("User");
        validate_password("abcdefghijkl", &mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.on("password"),
            vec!["must contain one uppercase letter, one digit, one special character"]
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 7 characters, 8+ bytes
        assert!(check_password("Éabcd1!").contains(&PasswordRule::MinLength));
    }
}
