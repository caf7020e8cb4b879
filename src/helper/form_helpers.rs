use actix_csrf::extractor::{CsrfGuarded, CsrfToken};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::collections::HashMap;
use url::form_urlencoded;

use super::admin_helpers::HelperError;

/// Parses URL-encoded form data from bytes, handling potential UTF-8 errors gracefully.
pub fn parse_form(form_bytes: &web::Bytes) -> Result<HashMap<String, String>, HttpResponse> {
    let body = match String::from_utf8(form_bytes.to_vec()) {
        Ok(s) => s,
        Err(_) => return Err(HttpResponse::BadRequest().body("Invalid UTF-8 in request body.")),
    };
    Ok(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
}

/// A CMS form: the CSRF token plus every other submitted field.
#[derive(Deserialize)]
pub struct GuardedForm {
    csrf_token: CsrfToken,
    #[serde(flatten)]
    pub fields: HashMap<String, String>,
}

impl CsrfGuarded for GuardedForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

/// Trimmed value of a field, or "" when absent.
pub fn field<'a>(parsed: &'a HashMap<String, String>, name: &str) -> &'a str {
    parsed.get(name).map(|s| s.trim()).unwrap_or("")
}

/// Trimmed value of an optional field; blank counts as absent.
pub fn optional_field<'a>(parsed: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    Some(field(parsed, name)).filter(|s| !s.is_empty())
}

/// Fails with the first blank `(label, value)` pair.
pub fn require_fields(fields: &[(&str, &str)]) -> Result<(), HelperError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((label, _)) => Err(HelperError::Validation(format!("{} is required.", label))),
        None => Ok(()),
    }
}
