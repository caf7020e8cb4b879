use actix_web::rt::time::timeout;
use serde::Serialize;
use std::time::Duration;

use crate::helper::admin_helpers::{get_conn, HelperError};
use crate::helper::email_helpers::ContactNotifier;
use crate::helper::form_helpers::require_fields;
use crate::models::db_operations::submissions_db_operations;
use crate::models::ContactMessage;
use crate::DbPool;

/// Longest a visitor waits on the email provider after the submission is stored.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a stored contact submission. Storage always happened; the
/// email may or may not have gone out.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ContactOutcome {
    pub submission_id: String,
    pub notification_delivered: bool,
}

/// Trims the raw fields and checks the required ones. Phone stays optional.
pub fn validate_contact(
    name: &str,
    email: &str,
    organization: &str,
    phone: Option<&str>,
    message: &str,
) -> Result<ContactMessage, HelperError> {
    require_fields(&[
        ("Name", name),
        ("Email", email),
        ("Organization", organization),
        ("Message", message),
    ])?;
    let email = email.trim();
    if !email.contains('@') {
        return Err(HelperError::Validation("Please enter a valid email address.".to_string()));
    }
    Ok(ContactMessage {
        name: name.trim().to_string(),
        email: email.to_string(),
        organization: organization.trim().to_string(),
        phone: phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
        message: message.trim().to_string(),
    })
}

/// Stores the submission, then attempts the notification.
///
/// Only a storage failure is an error. A notifier failure or timeout is logged
/// and reported through `notification_delivered`.
pub async fn submit_contact(
    pool: &DbPool,
    notifier: &dyn ContactNotifier,
    message: &ContactMessage,
) -> Result<ContactOutcome, HelperError> {
    submit_contact_within(pool, notifier, message, NOTIFY_TIMEOUT).await
}

pub async fn submit_contact_within(
    pool: &DbPool,
    notifier: &dyn ContactNotifier,
    message: &ContactMessage,
    notify_timeout: Duration,
) -> Result<ContactOutcome, HelperError> {
    let submission_id = {
        let conn = get_conn(pool)?;
        submissions_db_operations::create_submission(&conn, message)?
    };
    log::info!("Stored contact submission {} from {}", submission_id, message.email);

    let notification_delivered = match timeout(notify_timeout, notifier.notify(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::warn!("Contact submission {} stored but notification failed: {}", submission_id, e);
            false
        }
        Err(_) => {
            log::warn!(
                "Contact submission {} stored but notification timed out after {:?}",
                submission_id,
                notify_timeout
            );
            false
        }
    };

    Ok(ContactOutcome { submission_id, notification_delivered })
}
