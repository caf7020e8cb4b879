use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tera::{Context, Tera};
use thiserror::Error;

use crate::config::Config;
use crate::models::ContactMessage;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const RESEND_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
pub const CONFIRMATION_SUBJECT: &str = "Thank you for contacting Path Strategy Consulting";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Email delivery is not configured")]
    NotConfigured,
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Email provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Sends the emails that follow a stored contact submission.
#[async_trait]
pub trait ContactNotifier: Send + Sync {
    async fn notify(&self, message: &ContactMessage) -> Result<(), NotifyError>;
}

/// Used when no email provider key is configured. Every call fails, which the
/// contact flow records as "not delivered".
pub struct DisabledNotifier;

#[async_trait]
impl ContactNotifier for DisabledNotifier {
    async fn notify(&self, _message: &ContactMessage) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

/// Delivers through the Resend HTTP API: one notification to the firm and one
/// confirmation to the visitor.
pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
    to: String,
    site_url: String,
    templates: Tera,
}

impl ResendNotifier {
    pub fn new(api_key: &str, config: &Config, templates: Tera) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(RESEND_REQUEST_TIMEOUT).build()?;
        Ok(ResendNotifier {
            client,
            api_key: api_key.to_string(),
            from: config.email_from.clone(),
            to: config.notification_email_to.clone(),
            site_url: config.site_url.clone(),
            templates,
        })
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let payload = OutgoingEmail { from: &self.from, to: vec![to], subject, html };
        let resp = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

/// Subject line for the firm's copy. Line breaks are flattened so visitor input
/// cannot inject headers.
pub fn notification_subject(message: &ContactMessage) -> String {
    format!("New Inquiry from {} - {}", message.name, message.organization)
        .replace(['\r', '\n'], " ")
}

/// Renders both email bodies. Tera escapes every visitor-supplied value.
pub fn render_contact_emails(
    templates: &Tera,
    message: &ContactMessage,
    site_url: &str,
) -> Result<(String, String), NotifyError> {
    let mut ctx = Context::new();
    ctx.insert("contact", message);
    ctx.insert("site_url", site_url);
    let notification = templates.render("emails/notification.html", &ctx)?;
    let confirmation = templates.render("emails/confirmation.html", &ctx)?;
    Ok((notification, confirmation))
}

#[async_trait]
impl ContactNotifier for ResendNotifier {
    async fn notify(&self, message: &ContactMessage) -> Result<(), NotifyError> {
        let (notification_html, confirmation_html) = render_contact_emails(&self.templates, message, &self.site_url)?;

        self.send(&self.to, &notification_subject(message), &notification_html).await?;
        log::info!("Contact notification sent to {}", self.to);

        self.send(&message.email, CONFIRMATION_SUBJECT, &confirmation_html).await?;
        log::info!("Contact confirmation sent to {}", message.email);
        Ok(())
    }
}
