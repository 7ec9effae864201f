use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email transport error: {0}")]
    Http(String),

    #[error("Email rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Outbound email seam
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Posts `{from, to, subject, html}` to a transactional-email HTTP API
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MailError::Http(e.to_string()))?;
        Ok(Self { client, api_url, api_key, from })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let body = SendRequest { from: &self.from, to: [&email.to], subject: &email.subject, html: &email.html };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{} {}", status.as_u16(), detail)));
        }
        tracing::debug!("Email '{}' sent to {}", email.subject, email.to);
        Ok(())
    }
}

/// Used when no email API key is configured
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::info!("Email (not sent, no API key) to {}: {}", email.to, email.subject);
        Ok(())
    }
}

pub fn from_config(config: &EmailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.api_key {
        Some(key) => Ok(Arc::new(HttpMailer::new(
            config.api_url.clone(),
            key.clone(),
            config.from_address.clone(),
        )?)),
        None => {
            tracing::warn!("EMAIL_API_KEY not set; emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Email body for a notification. Relative links are resolved against the app URL.
pub fn render_notification(title: &str, message: &str, link: Option<&str>, app_base_url: &str) -> String {
    let mut html = format!(
        "<h2>{}</h2>\n<p>{}</p>\n",
        escape_html(title),
        escape_html(message)
    );
    if let Some(link) = link {
        let href = if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            format!("{}/{}", app_base_url.trim_end_matches('/'), link.trim_start_matches('/'))
        };
        html.push_str(&format!("<p><a href=\"{}\">Open in GP Compliance</a></p>\n", escape_html(&href)));
    }
    html
}
