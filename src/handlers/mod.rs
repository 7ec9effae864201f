//! Route handlers grouped by access tier:
//! public (no session), protected (session + practice scope),
//! elevated (master role).

pub mod elevated;
pub mod protected;
pub mod public;

use std::sync::Arc;

use crate::jobs::{AiClient, Mailer};

/// Outbound integrations shared by handlers
#[derive(Clone)]
pub struct Integrations {
    pub mailer: Arc<dyn Mailer>,
    /// `None` when no AI key is configured
    pub ai: Option<Arc<dyn AiClient>>,
}
