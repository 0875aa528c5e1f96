//! Email notifications: due-date windows, message rendering, delivery and the
//! scheduled jobs that tie them together.

pub mod digest;
pub mod email;
pub mod scheduler;
pub mod store;
pub mod templates;
pub mod windows;

pub use digest::{OverdueReport, WeeklyDigest};
pub use email::{Delivery, EmailMessage, EmailService, LogMailer, Mailer, SmtpMailer};
pub use scheduler::{JobReport, ReminderJob, ReminderScheduler, Schedule};
pub use store::{PgReminderStore, ReminderStore};
pub use windows::{DueWindow, OverdueBuckets, OverdueTier, TimeRange};
