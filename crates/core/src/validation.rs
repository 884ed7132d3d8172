//! Client-side form checks run before any request is sent.

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum password length accepted at signup and reset.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Signup form contents.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Check the signup form, returning the first message to show.
pub fn validate_signup(form: &SignupForm) -> Result<(), String> {
    let fields = [&form.name, &form.email, &form.password, &form.confirm_password];
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err("Please fill in all fields".to_string());
    }
    if !is_plausible_email(&form.email) {
        return Err("Please enter a valid email address".to_string());
    }
    validate_new_password(&form.password, &form.confirm_password)
}

/// Length and confirmation checks shared by signup and password reset.
pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    if password != confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

/// Loose `local@domain.tld` shape check.
pub fn is_plausible_email(email: &str) -> bool {
    EMAIL.is_match(email.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn rejects_blank_fields() {
        let err = validate_signup(&form("Ravi", " ", "secret1", "secret1")).unwrap_err();
        assert_eq!(err, "Please fill in all fields");
    }

    #[test]
    fn rejects_short_password() {
        let err = validate_signup(&form("Ravi", "ravi@example.lk", "abc", "abc")).unwrap_err();
        assert_eq!(err, "Password must be at least 6 characters long");
    }

    #[test]
    fn rejects_mismatched_confirmation() {
        let err =
            validate_signup(&form("Ravi", "ravi@example.lk", "secret1", "secret2")).unwrap_err();
        assert_eq!(err, "Passwords do not match");
    }

    #[test]
    fn checks_email_shape() {
        assert!(is_plausible_email("a.b@bus.lk"));
        assert!(!is_plausible_email("ravi"));
        assert!(!is_plausible_email("ravi@lk"));
        assert!(validate_signup(&form("Ravi", "ravi@", "secret1", "secret1")).is_err());
    }

    #[test]
    fn accepts_complete_form() {
        assert!(validate_signup(&form("Ravi", "ravi@example.lk", "secret1", "secret1")).is_ok());
    }
}
