//! Outgoing email: a [`Mailer`] transport seam and the [`EmailService`] that
//! renders notification templates and hands them to it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SmtpConfig;
use crate::error::AppError;
use crate::models::{Task, TaskPriority, User};
use crate::notifications::digest::{OverdueReport, WeeklyDigest};
use crate::notifications::templates;

const SENDER_NAME: &str = "Task Manager";

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Result of a successful hand-off to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<Delivery, AppError>;
}

fn new_message_id(sender: &str) -> String {
    let domain = sender.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("localhost");
    format!("<{}@{}>", Uuid::new_v4(), domain)
}

/// Delivers mail through an authenticated SMTP relay (STARTTLS).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();
        let from = Mailbox::new(Some(SENDER_NAME.to_string()), config.username.parse()?);
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<Delivery, AppError> {
        let message_id = new_message_id(&self.from.email.to_string());
        let email = Message::builder()
            .from(self.from.clone())
            .to(message.to.parse()?)
            .subject(message.subject)
            .message_id(Some(message_id.clone()))
            .multipart(MultiPart::alternative_plain_html(message.text, message.html))?;

        self.transport.send(email).await?;
        log::info!("email {} sent to {}", message_id, message.to);
        Ok(Delivery { message_id })
    }
}

/// Used when no SMTP credentials are configured: logs what would have been sent.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<Delivery, AppError> {
        let message_id = new_message_id("log@localhost");
        log::info!(
            "SMTP not configured; would send {} to {} with subject {:?}",
            message_id,
            message.to,
            message.subject
        );
        log::debug!("{}", message.text);
        Ok(Delivery { message_id })
    }
}

/// Renders the notification emails and sends them through a [`Mailer`].
#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, frontend_url: impl Into<String>) -> Self {
        Self {
            mailer,
            frontend_url: frontend_url.into(),
        }
    }

    /// SMTP delivery when configured, otherwise [`LogMailer`].
    pub fn from_config(smtp: Option<&SmtpConfig>, frontend_url: &str) -> Result<Self, AppError> {
        let mailer: Arc<dyn Mailer> = match smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                log::warn!("EMAIL_USER/EMAIL_PASSWORD not set; emails will only be logged");
                Arc::new(LogMailer)
            }
        };
        Ok(Self::new(mailer, frontend_url))
    }

    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    pub async fn send(&self, message: EmailMessage) -> Result<Delivery, AppError> {
        self.mailer.send(message).await
    }

    /// Reminder for a single task. `subject` and `intro` override the defaults.
    pub async fn send_task_reminder(
        &self,
        to: &str,
        task: &Task,
        subject: Option<&str>,
        intro: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Delivery, AppError> {
        let rendered = templates::task_reminder(task, subject, intro, &self.frontend_url, now);
        self.send(rendered.addressed_to(to)).await
    }

    pub async fn send_overdue_report(
        &self,
        to: &str,
        user: &User,
        report: &OverdueReport,
    ) -> Result<Delivery, AppError> {
        let rendered = templates::overdue_report(user, report, &self.frontend_url);
        self.send(rendered.addressed_to(to)).await
    }

    pub async fn send_weekly_digest(
        &self,
        to: &str,
        user: &User,
        digest: &WeeklyDigest,
    ) -> Result<Delivery, AppError> {
        let rendered = templates::weekly_digest(user, digest, &self.frontend_url);
        self.send(rendered.addressed_to(to)).await
    }

    pub async fn send_password_reset(&self, user: &User, reset_url: &str) -> Result<Delivery, AppError> {
        let rendered = templates::password_reset(user, reset_url);
        self.send(rendered.addressed_to(&user.email)).await
    }

    /// Sends a reminder for a made-up high-priority task due tomorrow.
    pub async fn send_test_email(&self, user: &User, now: DateTime<Utc>) -> Result<Delivery, AppError> {
        let sample = Task {
            id: Uuid::new_v4(),
            title: "Test task".to_string(),
            description: Some("This is a sample task to check that email delivery works".to_string()),
            due_date: now + Duration::days(1),
            user_time_zone: "UTC".to_string(),
            timezone_offset: 0,
            priority: TaskPriority::High,
            completed: false,
            user_id: user.id,
            created_at: now,
            updated_at: now,
        };
        self.send_task_reminder(&user.email, &sample, None, None, now).await
    }
}
