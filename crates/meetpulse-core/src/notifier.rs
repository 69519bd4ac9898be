//! Outbound notifications: verification codes and approval-queue alerts.
//!
//! Delivery is best effort. [`dispatch`] hands a message to a background task
//! and only logs failures, so a provider outage never undoes a stored
//! challenge or a created account.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use meetpulse_types::models::OtpPurpose;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Code {
        email: String,
        code: String,
        purpose: OtpPurpose,
        expires_in_minutes: i64,
    },
    PendingApproval {
        admin_email: String,
        user_name: Option<String>,
        user_email: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::Code { email, .. } => email,
            Notification::PendingApproval { admin_email, .. } => admin_email,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected message: status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("notification channel closed")]
    ChannelClosed,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Fire-and-forget delivery. Failures are logged at `warn`.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!(
            "No async runtime; dropping notification to {}",
            notification.recipient()
        );
        return;
    };

    handle.spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            warn!("Notification to {} failed: {}", notification.recipient(), e);
        }
    });
}

// -- Email rendering --

struct Email {
    to: String,
    subject: String,
    html: String,
}

fn render(notification: &Notification) -> Email {
    match notification {
        Notification::Code {
            email,
            code,
            purpose,
            expires_in_minutes,
        } => {
            let subject = match purpose {
                OtpPurpose::Signup => "Your signup code",
                OtpPurpose::Login => "Your login code",
            };
            Email {
                to: email.clone(),
                subject: subject.to_string(),
                html: format!(
                    "<p>Your verification code is: <strong>{}</strong></p>\
                     <p>It expires in {} minutes.</p>",
                    code, expires_in_minutes
                ),
            }
        }
        Notification::PendingApproval {
            admin_email,
            user_name,
            user_email,
        } => Email {
            to: admin_email.clone(),
            subject: "MeetPulse: new user pending approval".to_string(),
            html: format!(
                "<h2>New user is waiting for approval</h2>\
                 <p><strong>Name:</strong> {}</p>\
                 <p><strong>Email:</strong> {}</p>\
                 <p>Open the admin panel to approve them.</p>",
                user_name.as_deref().unwrap_or("(not provided)"),
                user_email
            ),
        },
    }
}

/// Split `"Name <addr@host>"` into its parts. A bare address has no name.
fn parse_sender(from: &str) -> (Option<String>, String) {
    let from = from.trim();
    match (from.find('<'), from.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = from[..open].trim();
            let addr = from[open + 1..close].trim().to_string();
            let name = (!name.is_empty()).then(|| name.to_string());
            (name, addr)
        }
        _ => (None, from.to_string()),
    }
}

fn http_client() -> Result<reqwest::Client, NotifyError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?)
}

async fn check(resp: reqwest::Response) -> Result<(), NotifyError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

// -- Providers --

pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendNotifier {
    pub fn new(api_key: String, from: String) -> Result<Self, NotifyError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let email = render(notification);
        let resp = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [email.to],
                "subject": email.subject,
                "html": email.html,
            }))
            .send()
            .await?;
        check(resp).await?;
        info!("Resend: email sent to {}", email.to);
        Ok(())
    }
}

pub struct BrevoNotifier {
    client: reqwest::Client,
    api_key: String,
    sender_name: String,
    sender_email: String,
}

impl BrevoNotifier {
    pub fn new(api_key: String, from: &str) -> Result<Self, NotifyError> {
        let (name, sender_email) = parse_sender(from);
        Ok(Self {
            client: http_client()?,
            api_key,
            sender_name: name.unwrap_or_else(|| "MeetPulse".to_string()),
            sender_email,
        })
    }
}

#[async_trait]
impl Notifier for BrevoNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let email = render(notification);
        let resp = self
            .client
            .post("https://api.brevo.com/v3/smtp/email")
            .header("api-key", &self.api_key)
            .json(&serde_json::json!({
                "sender": { "name": self.sender_name, "email": self.sender_email },
                "to": [{ "email": email.to }],
                "subject": email.subject,
                "htmlContent": email.html,
            }))
            .send()
            .await?;
        check(resp).await?;
        info!("Brevo: email sent to {}", email.to);
        Ok(())
    }
}

/// Development fallback when no provider is configured: codes go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Code { email, code, .. } => {
                warn!("No email provider configured. Code for {}: {}", email, code);
            }
            Notification::PendingApproval {
                admin_email,
                user_email,
                ..
            } => {
                warn!(
                    "No email provider configured. {} is waiting for approval (admin {})",
                    user_email, admin_email
                );
            }
        }
        Ok(())
    }
}

/// Forwards every notification into an in-process channel.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification.clone())
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
