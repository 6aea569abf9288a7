use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::RelayError;

const MAX_NAME_CHARS: usize = 100;
const MAX_EMAIL_CHARS: usize = 255;
const MAX_SUBJECT_CHARS: usize = 200;
const MAX_MESSAGE_CHARS: usize = 5000;

/// Contact form as posted to the contact relay
#[derive(Debug, Clone, Serialize, Deserialize, Builder, PartialEq, Eq)]
pub struct ContactForm {
    #[builder(into)]
    pub name: String,

    #[builder(into)]
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub subject: Option<String>,

    #[builder(into)]
    pub message: String,
}

/// Acknowledgement returned by the contact relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ContactForm {
    /// Trimmed copy of the form, or the first rule it breaks.
    pub fn validated(&self) -> Result<ContactForm, RelayError> {
        let name = required("name", &self.name, MAX_NAME_CHARS)?;
        let email = required("email", &self.email, MAX_EMAIL_CHARS)?;
        if !looks_like_email(&email) {
            return Err(RelayError::validation("email", "not a valid email address"));
        }

        let subject = match self.subject.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(subject) if subject.chars().count() > MAX_SUBJECT_CHARS => {
                return Err(RelayError::validation(
                    "subject",
                    format!("must be at most {MAX_SUBJECT_CHARS} characters"),
                ));
            }
            Some(subject) => Some(subject.to_string()),
        };

        let message = required("message", &self.message, MAX_MESSAGE_CHARS)?;

        Ok(ContactForm {
            name,
            email,
            subject,
            message,
        })
    }
}

fn required(field: &'static str, value: &str, max_chars: usize) -> Result<String, RelayError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RelayError::validation(field, "is required"));
    }
    if value.chars().count() > max_chars {
        return Err(RelayError::validation(
            field,
            format!("must be at most {max_chars} characters"),
        ));
    }
    Ok(value.to_string())
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
