//! SMTP mail delivery over implicit TLS.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tidings_types::{DeliveryStatus, MailError, Mailer, OutgoingMail};

/// Default SMTPS port.
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Relay host and login. Any missing field makes delivery fail with
/// [`MailError::MissingCredentials`].
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SmtpSettings {
    pub fn is_complete(&self) -> bool {
        self.server.is_some() && self.username.is_some() && self.password.is_some()
    }
}

/// Sends mail through an SMTP relay, one connection per message.
pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    async fn deliver(&self, mail: &OutgoingMail) -> Result<DeliveryStatus, MailError> {
        let attachment = read_attachment(&mail.attachment).await?;

        let (Some(server), Some(username), Some(password)) = (
            self.settings.server.as_deref(),
            self.settings.username.as_deref(),
            self.settings.password.as_deref(),
        ) else {
            return Err(MailError::MissingCredentials);
        };

        let message = build_message(username, mail, attachment)?;
        let port = self.settings.port.unwrap_or(DEFAULT_SMTP_PORT);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(server)
            .map_err(|e| MailError::Delivery(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        tracing::info!(server, port, to = %mail.to, "sending mail");
        let response = transport
            .send(message)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        Ok(DeliveryStatus {
            recipient: mail.to.clone(),
            detail: format!(
                "{} {}",
                response.code(),
                response.message().collect::<Vec<_>>().join(" ")
            ),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send<'a>(
        &'a self,
        mail: &'a OutgoingMail,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryStatus, MailError>> + Send + 'a>> {
        Box::pin(self.deliver(mail))
    }
}

struct LoadedAttachment {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_attachment(path: &Path) -> Result<LoadedAttachment, MailError> {
    let missing = || MailError::MissingAttachment {
        path: path.display().to_string(),
    };
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(missing()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
        Err(e) => return Err(MailError::Io(e)),
    }

    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(LoadedAttachment { filename, bytes })
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        message: e.to_string(),
    })
}

fn build_message(
    sender: &str,
    mail: &OutgoingMail,
    attachment: LoadedAttachment,
) -> Result<Message, MailError> {
    let octet_stream = ContentType::parse("application/octet-stream")
        .map_err(|e| MailError::Build(e.to_string()))?;

    Message::builder()
        .from(mailbox(sender)?)
        .to(mailbox(&mail.to)?)
        .subject(mail.subject.clone())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(mail.body.clone()))
                .singlepart(Attachment::new(attachment.filename).body(attachment.bytes, octet_stream)),
        )
        .map_err(|e| MailError::Build(e.to_string()))
}
