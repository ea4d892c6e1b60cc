//! The delivery seam for emailed reports.

use crate::Error;

/// A rendered email, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    /// The recipient address.
    pub to: String,
    /// The subject line.
    pub subject: String,
    /// The plain-text body.
    pub text: String,
    /// The HTML body.
    pub html: String,
}

/// Delivers rendered reports to an email address.
///
/// Delivery failure is an expected outcome: callers record it and downgrade
/// the report status rather than aborting, so implementations should return
/// [Error::EmailError] instead of panicking.
pub trait ReportMailer: Send + Sync {
    /// Deliver `message`, or report why it could not be delivered.
    fn send(&self, message: &EmailMessage) -> Result<(), Error>;
}

/// A mailer that logs deliveries instead of sending them.
///
/// The default transport: actual delivery is deployment-specific and wired in
/// behind the [ReportMailer] trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl ReportMailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), Error> {
        tracing::info!("Email to {}: {}", message.to, message.subject);
        tracing::debug!("Email body:\n{}", message.text);

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_doubles {
    use std::sync::Mutex;

    use crate::Error;

    use super::{EmailMessage, ReportMailer};

    /// Records every message it is asked to send.
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<EmailMessage>>,
    }

    impl ReportMailer for RecordingMailer {
        fn send(&self, message: &EmailMessage) -> Result<(), Error> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    /// Fails every delivery.
    #[derive(Debug, Default)]
    pub struct FailingMailer;

    impl ReportMailer for FailingMailer {
        fn send(&self, _: &EmailMessage) -> Result<(), Error> {
            Err(Error::EmailError("SMTP connection refused".to_owned()))
        }
    }
}
