//! Mail delivery through the log
//!
//! The bot has no SMTP transport of its own. [`LogMailer`] renders every mail
//! into a structured `warn!` record so an external log shipper (or an operator)
//! can pick it up; deployments with a mail relay plug their own [`Mailer`] in.

use super::{Mail, Mailer};
use crate::error::Result;
use async_trait::async_trait;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> Result<()> {
        warn!(
            to = %mail.to,
            subject = %mail.subject,
            "Administrator mail:\n{}",
            mail.body
        );
        Ok(())
    }
}
