//! Field checks run before anything reaches the store.
//!
//! These are conveniences for the person filling in a form; the store
//! re-checks lengths and required fields on its own.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::limits::*;
use crate::model::Participant;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ()./-]{4,}[0-9]$").expect("phone pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every failing field of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: &'static str, message: &'static str) -> Self {
        Self(vec![FieldError { field, message }])
    }

    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    if name.is_empty() {
        errors.push("name", "required");
    } else if name.len() > MAX_NAME_LEN {
        errors.push("name", "too long");
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.push("email", "required");
    } else if email.len() > MAX_EMAIL_LEN || !EMAIL.is_match(email) {
        errors.push("email", "not a valid address");
    }
}

/// Empty strings become `None`.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim fields, drop empty optionals, then check every field.
pub fn participant(p: Participant) -> Result<Participant, ValidationErrors> {
    let p = Participant {
        name: p.name.trim().to_string(),
        email: p.email.trim().to_string(),
        phone: non_empty(p.phone),
        note: non_empty(p.note),
    };
    let mut errors = ValidationErrors::default();
    check_name(&mut errors, &p.name);
    check_email(&mut errors, &p.email);
    if let Some(phone) = &p.phone
        && (phone.len() > MAX_PHONE_LEN || !PHONE.is_match(phone))
    {
        errors.push("phone", "not a valid phone number");
    }
    if p.note.as_ref().is_some_and(|n| n.len() > MAX_TEXT_LEN) {
        errors.push("note", "too long");
    }
    errors.into_result().map(|()| p)
}

/// Contact form fields, trimmed.
pub fn contact(name: &str, email: &str, body: &str) -> Result<(String, String, String), ValidationErrors> {
    let (name, email, body) = (name.trim(), email.trim(), body.trim());
    let mut errors = ValidationErrors::default();
    check_name(&mut errors, name);
    check_email(&mut errors, email);
    if body.is_empty() {
        errors.push("message", "required");
    } else if body.len() > MAX_TEXT_LEN {
        errors.push("message", "too long");
    }
    errors
        .into_result()
        .map(|()| (name.to_string(), email.to_string(), body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, email: &str, phone: Option<&str>) -> Participant {
        Participant {
            name: name.into(),
            email: email.into(),
            phone: phone.map(Into::into),
            note: None,
        }
    }

    #[test]
    fn accepts_and_trims() {
        let p = participant(person("  Ada Lovelace ", " ada@example.com", Some("+41 79 123 45 67")))
            .unwrap();
        assert_eq!(p.name, "Ada Lovelace");
        assert_eq!(p.email, "ada@example.com");
        assert_eq!(p.phone.as_deref(), Some("+41 79 123 45 67"));
    }

    #[test]
    fn blank_phone_is_dropped() {
        let p = participant(person("Ada", "ada@example.com", Some("   "))).unwrap();
        assert_eq!(p.phone, None);
    }

    #[test]
    fn reports_every_bad_field() {
        let errors = participant(person(" ", "not-an-address", Some("call me"))).unwrap_err();
        assert!(errors.has("name"));
        assert!(errors.has("email"));
        assert!(errors.has("phone"));
        assert_eq!(errors.0.len(), 3);
    }

    #[test]
    fn email_shapes() {
        for good in ["a@b.ch", "first.last+yoga@studio.example.org"] {
            assert!(participant(person("A", good, None)).is_ok(), "{good}");
        }
        for bad in ["a@b", "@b.ch", "a b@c.ch", "a@@b.ch"] {
            assert!(participant(person("A", bad, None)).is_err(), "{bad}");
        }
    }

    #[test]
    fn phone_shapes() {
        for good in ["0791234567", "(044) 123-45-67", "+1 555.123.4567"] {
            assert!(participant(person("A", "a@b.ch", Some(good))).is_ok(), "{good}");
        }
        for bad in ["12", "phone", "+41 79 123 45 6x"] {
            assert!(participant(person("A", "a@b.ch", Some(bad))).is_err(), "{bad}");
        }
    }

    #[test]
    fn contact_requires_body() {
        let errors = contact("Ada", "ada@example.com", "  ").unwrap_err();
        assert_eq!(errors.to_string(), "message: required");
        let (name, _, body) = contact(" Ada ", "ada@example.com", " Hello ").unwrap();
        assert_eq!(name, "Ada");
        assert_eq!(body, "Hello");
    }
}
