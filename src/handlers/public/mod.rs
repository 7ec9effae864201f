// Public handlers: no session required

pub mod auth;
pub mod functions;
pub mod root;

pub use auth::{login, logout, register};
pub use functions::{dispatch_emails, scheduled_reminders};
pub use root::{health, root};
