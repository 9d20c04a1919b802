use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::MailConfig;
use crate::event::MotionEvent;

use super::{Handler, HandlerError, RegistryError};

const SUBJECT: &str = "Motion detected";
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

pub trait MailSender: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), HandlerError>;
}

pub struct SmtpMailSender {
    transport: SmtpTransport,
}

impl SmtpMailSender {
    pub fn new(config: &MailConfig) -> Result<Self, lettre::transport::smtp::Error> {
        let builder = if config.server_port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.server_host)?
        } else {
            SmtpTransport::starttls_relay(&config.server_host)?
        };

        let mut builder = builder.port(config.server_port);
        if !config.server_user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.server_user.clone(),
                config.server_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, HandlerError> {
    address
        .parse()
        .map_err(|e| HandlerError::Mail(format!("invalid address {address}: {e}")))
}

impl MailSender for SmtpMailSender {
    fn send(&self, message: &MailMessage) -> Result<(), HandlerError> {
        let mut builder = Message::builder()
            .from(mailbox(&message.from)?)
            .subject(message.subject.clone());
        for to in &message.to {
            builder = builder.to(mailbox(to)?);
        }

        let png = ContentType::parse("image/png").map_err(|e| HandlerError::Mail(e.to_string()))?;
        let email = builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(message.body.clone()))
                    .singlepart(
                        Attachment::new(message.attachment_name.clone())
                            .body(message.attachment.clone(), png),
                    ),
            )
            .map_err(|e| HandlerError::Mail(e.to_string()))?;

        self.transport
            .send(&email)
            .map_err(|e| HandlerError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Mails the motion capture to the configured recipient.
///
/// The attachment is encoded from the event frame and carries the archive's
/// file name. It never reads the archive, which another handler may be
/// writing at the same moment.
pub struct MailHandler {
    sender: Box<dyn MailSender>,
    from: String,
    to: Vec<String>,
}

impl MailHandler {
    pub fn new(config: &MailConfig) -> Result<Self, RegistryError> {
        for address in [&config.from, &config.to] {
            address
                .parse::<Mailbox>()
                .map_err(|e| RegistryError::Mail(format!("invalid address {address}: {e}")))?;
        }
        let sender =
            SmtpMailSender::new(config).map_err(|e| RegistryError::Mail(e.to_string()))?;

        Ok(Self::with_sender(
            Box::new(sender),
            config.from.clone(),
            vec![config.to.clone()],
        ))
    }

    pub fn with_sender(sender: Box<dyn MailSender>, from: String, to: Vec<String>) -> Self {
        Self { sender, from, to }
    }
}

impl Handler for MailHandler {
    fn handle(&self, event: &MotionEvent) -> Result<(), HandlerError> {
        let message = MailMessage {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: SUBJECT.to_string(),
            body: format!("Motion detected at {}", event.display_time()),
            attachment_name: event.image_file_name(),
            attachment: event.frame.encode_png()?,
        };

        self.sender.send(&message)?;

        tracing::info!(to = ?self.to, "motion capture mailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::event::tests::test_event;
    use crate::handlers::ArchiveHandler;

    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<MailMessage>>>,
        fail: bool,
    }

    impl MailSender for RecordingSender {
        fn send(&self, message: &MailMessage) -> Result<(), HandlerError> {
            if self.fail {
                return Err(HandlerError::Mail("relay refused".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn handler(sender: RecordingSender) -> MailHandler {
        MailHandler::with_sender(
            Box::new(sender),
            "camera@example.net".to_string(),
            vec!["me@example.net".to_string()],
        )
    }

    #[test]
    fn test_composes_message() {
        let sender = RecordingSender::default();
        let event = test_event();

        handler(sender.clone()).handle(&event).unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            MailMessage {
                from: "camera@example.net".to_string(),
                to: vec!["me@example.net".to_string()],
                subject: "Motion detected".to_string(),
                body: "Motion detected at 2024-03-01 14:05:09".to_string(),
                attachment_name: "2024-03-01-14-05-09.png".to_string(),
                attachment: event.frame.encode_png().unwrap(),
            }
        );
    }

    #[test]
    fn test_attachment_ignores_partially_archived_image() {
        let dir = tempfile::tempdir().unwrap();
        let event = test_event();
        let archived = ArchiveHandler::new(dir.path().to_path_buf());
        // an archive write caught midway: file exists, bytes truncated
        std::fs::write(event.image_path(dir.path()), b"\x89PNG").unwrap();

        let sender = RecordingSender::default();
        let mail = handler(sender.clone());
        std::thread::scope(|s| {
            s.spawn(|| mail.handle(&event).unwrap());
            s.spawn(|| archived.handle(&event).unwrap());
        });

        let expected = event.frame.encode_png().unwrap();
        assert_eq!(sender.sent.lock().unwrap()[0].attachment, expected);
        assert_eq!(std::fs::read(event.image_path(dir.path())).unwrap(), expected);
    }

    #[test]
    fn test_sender_failure_is_reported() {
        let sender = RecordingSender {
            fail: true,
            ..RecordingSender::default()
        };
        let result = handler(sender).handle(&test_event());
        assert!(matches!(result, Err(HandlerError::Mail(_))));
    }

    #[test]
    fn test_rejects_invalid_address() {
        let config = MailConfig {
            from: "not an address".to_string(),
            to: "me@example.net".to_string(),
            server_host: "smtp.example.net".to_string(),
            server_port: 587,
            server_user: String::new(),
            server_password: String::new(),
        };
        assert!(matches!(
            MailHandler::new(&config),
            Err(RegistryError::Mail(_))
        ));
    }
}
