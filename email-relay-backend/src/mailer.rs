use crate::required_variable;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::{borrow::Cow, fmt::Display};

const SMTP_URL: &str = "smtps://smtp.gmail.com";

/// Capability to deliver outgoing mail. The production implementation speaks
/// SMTP; tests substitute a recording fake.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

#[derive(Clone, Debug)]
pub struct Email {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: EmailBody,
}

/// The caller chooses which representations to supply, so a relayed mail can
/// be plain text, HTML, or both as a multipart alternative.
#[derive(Clone, Debug)]
pub enum EmailBody {
    Text(String),
    Html(String),
    Multipart { text: String, html: String },
}

pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    pub fn from_environment() -> anyhow::Result<Self> {
        let smtp_url = smtp_url();
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&smtp_url)?
            .authentication(vec![Mechanism::Plain]);

        // Credentials are only attached when the connection URL is over TLS. If
        // the environment is misconfigured to use plain SMTP, the connection is
        // rejected rather than sending the password in the clear.
        if smtp_url.starts_with("smtps://") {
            builder = builder.credentials(Credentials::new(
                required_variable("EMAIL_USER")?,
                required_variable("EMAIL_PASS")?,
            ));
        }

        Ok(Self {
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let builder = Message::builder()
            .from(parse_mailbox(&email.from)?)
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.clone());
        let message = match &email.body {
            EmailBody::Text(text) => builder.header(ContentType::TEXT_PLAIN).body(text.clone()),
            EmailBody::Html(html) => builder.header(ContentType::TEXT_HTML).body(html.clone()),
            EmailBody::Multipart { text, html } => builder
                .multipart(MultiPart::alternative_plain_html(text.clone(), html.clone())),
        }
        .map_err(|error| MailError::Build(format!("{error}")))?;
        match self.mailer.send(message).await {
            Ok(_) => Ok(()),
            Err(error) => Err(MailError::Smtp(format!("{error}"))),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|_| MailError::InvalidAddress(address.into()))
}

fn smtp_url() -> Cow<'static, str> {
    std::env::var("SMTP_URL")
        .map(Cow::Owned)
        .unwrap_or(SMTP_URL.into())
}

#[derive(Debug)]
pub enum MailError {
    InvalidAddress(String),
    Build(String),
    Smtp(String),
}

impl Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::InvalidAddress(address) => write!(f, "Invalid email address {address}"),
            MailError::Build(description) => write!(f, "Error building message: {description}"),
            MailError::Smtp(description) => write!(f, "Error sending message: {description}"),
        }
    }
}

impl std::error::Error for MailError {}

#[cfg(test)]
pub mod test_support {
    use super::{Email, MailError, MailTransport};
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub struct FakeMailTransport {
        submitted: Mutex<Vec<Email>>,
        fail_sends: bool,
    }

    impl FakeMailTransport {
        pub fn new() -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                fail_sends: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail_sends: true,
                ..Self::new()
            }
        }

        pub fn submitted_messages(&self) -> Vec<Email> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for FakeMailTransport {
        async fn send(&self, email: &Email) -> Result<(), MailError> {
            self.submitted.lock().unwrap().push(email.clone());
            if self.fail_sends {
                Err(MailError::Smtp("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }
}
