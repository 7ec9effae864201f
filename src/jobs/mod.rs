//! Background jobs: reminders, email dispatch and AI assistance.
//! Each job is a single pass that can be triggered over HTTP, from the
//! CLI, or by the in-process scheduler.

pub mod ai;
pub mod dispatch;
pub mod mailer;
pub mod reminders;
pub mod scheduler;

pub use ai::{AiClient, AiError};
pub use mailer::{MailError, Mailer};
