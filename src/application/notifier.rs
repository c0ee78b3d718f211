use tracing::instrument;

use crate::domain::error_chain::{render_report, ExceptionChain};
use crate::ports::mailer::{EmailMessage, MailError, Mailer};

/// E-mails the rendered report of a failed run.
pub struct FailureNotifier<M> {
    mailer: M,
    from: String,
    to: String,
}

impl<M: Mailer> FailureNotifier<M> {
    pub fn new(mailer: M, from: impl Into<String>, to: impl Into<String>) -> Self {
        FailureNotifier {
            mailer,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn compose(&self, chain: &ExceptionChain, subject: &str) -> EmailMessage {
        EmailMessage {
            to: self.to.clone(),
            from: self.from.clone(),
            subject: subject.to_owned(),
            body: render_report(chain),
        }
    }

    /// Sends the report and returns the message id.
    #[instrument(skip(self, chain))]
    pub async fn notify(
        &self,
        chain: &ExceptionChain,
        subject: &str,
    ) -> error_stack::Result<String, MailError> {
        self.mailer.send(&self.compose(chain, subject)).await
    }
}
