//! Delivery through the Mailgun messages API.
//!
//! Sends are fire-and-report: whatever status Mailgun answers with is handed
//! back in a [`MailReceipt`] for the caller to log. Only a transport failure
//! is an error.

use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{NewsletterError, Result};
use crate::utils::{html_to_text, truncate_for_log};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailReceipt {
    pub status: u16,
    pub body: String,
}

impl MailReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct Mailer {
    http: Client,
    base_url: String,
    domain: String,
    api_key: String,
    sender: String,
    recipients: Vec<String>,
    subject: String,
}

impl Mailer {
    pub fn from_config(http: Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.settings.endpoints.mailgun.trim_end_matches('/').to_string(),
            domain: config.mailgun_domain.clone(),
            api_key: config.mailgun_api_key.clone(),
            sender: format!(
                "{} <mailgun@{}>",
                config.settings.sender_name, config.mailgun_domain
            ),
            recipients: config.recipients.clone(),
            subject: config.settings.subject.clone(),
        }
    }

    /// The form fields of a message carrying `html`, with a plain-text
    /// alternative derived from it.
    pub fn form_fields(&self, html: &str) -> Vec<(&'static str, String)> {
        let mut fields = vec![("from", self.sender.clone())];
        fields.extend(self.recipients.iter().map(|to| ("to", to.clone())));
        fields.push(("subject", self.subject.clone()));
        fields.push(("html", html.to_string()));
        fields.push(("text", html_to_text(html)));
        fields
    }

    /// Send `html` to every configured recipient.
    ///
    /// # Arguments
    ///
    /// * `html` - The finished newsletter; a plain-text part is derived from it
    ///
    /// # Returns
    ///
    /// The status and body Mailgun answered with. A non-2xx answer is logged
    /// and returned like any other; check [`MailReceipt::is_success`].
    ///
    /// # Errors
    ///
    /// [`NewsletterError::Request`] only when the request could not be made
    /// or its body could not be read.
    #[instrument(level = "info", skip_all, fields(domain = %self.domain, recipients = self.recipients.len(), bytes = html.len()))]
    pub async fn send_html(&self, html: &str) -> Result<MailReceipt> {
        let response = self
            .http
            .post(format!("{}/v3/{}/messages", self.base_url, self.domain))
            .basic_auth("api", Some(&self.api_key))
            .form(&self.form_fields(html))
            .send()
            .await
            .map_err(|e| NewsletterError::request("mailgun", e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| NewsletterError::request("mailgun", e))?;
        let receipt = MailReceipt { status, body };

        if receipt.is_success() {
            info!(status, body = %truncate_for_log(&receipt.body, 300), "Email accepted");
        } else {
            warn!(status, body = %truncate_for_log(&receipt.body, 300), "Email API rejected the message");
        }
        Ok(receipt)
    }
}
