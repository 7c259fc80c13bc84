pub mod mailer;

use actix_web::{dev::Server, web, App, HttpResponse, HttpServer};
use mailer::{Email, EmailBody, MailError, MailTransport};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, net::TcpListener};
use tracing::{debug, error};

pub fn run<MailTransportT: MailTransport + 'static>(
    listener: TcpListener,
    handler: EmailRelayHandler<MailTransportT>,
) -> std::io::Result<Server> {
    let handler = web::Data::new(handler);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(handler.clone())
            .route("/send-email", web::post().to(send_email::<MailTransportT>))
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub fn operator_mailbox() -> Result<String, EnvironmentError> {
    required_variable("EMAIL_USER")
}

pub(crate) fn required_variable(name: &'static str) -> Result<String, EnvironmentError> {
    std::env::var(name).map_err(|_| EnvironmentError::MissingVariable(name))
}

async fn send_email<MailTransportT: MailTransport + 'static>(
    handler: web::Data<EmailRelayHandler<MailTransportT>>,
    request: web::Json<SendEmailRequest>,
) -> HttpResponse {
    match handler.handle(request.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(SuccessResponse {
            message: "Email sent successfully!",
        }),
        Err(error) => {
            error.log();
            error.into_response()
        }
    }
}

/// Relays a caller-supplied mail to the operator's own mailbox. Unlike a
/// contact form there is no fixed layout; sender, subject and body all come
/// from the request.
pub struct EmailRelayHandler<MailTransportT: MailTransport> {
    transport: MailTransportT,
    operator_mailbox: String,
}

impl<MailTransportT: MailTransport> EmailRelayHandler<MailTransportT> {
    pub fn new(transport: MailTransportT, operator_mailbox: String) -> Self {
        Self {
            transport,
            operator_mailbox,
        }
    }

    pub async fn handle(&self, request: SendEmailRequest) -> Result<(), RelayError> {
        let validated = request.validate()?;
        let email = Email {
            to: self.operator_mailbox.clone(),
            from: validated.from.into(),
            subject: validated.subject.into(),
            body: validated.body,
        };
        self.transport
            .send(&email)
            .await
            .map_err(RelayError::Delivery)
    }
}

#[derive(Deserialize, Debug)]
pub struct SendEmailRequest {
    from: Option<String>,
    subject: Option<String>,
    text: Option<String>,
    html: Option<String>,
}

impl SendEmailRequest {
    fn validate(&self) -> Result<ValidatedSendRequest, RelayError> {
        let SendEmailRequest {
            from: Some(from),
            subject: Some(subject),
            text,
            html,
        } = self
        else {
            return Err(RelayError::MissingFields);
        };

        if from.is_empty() || subject.is_empty() {
            return Err(RelayError::MissingFields);
        }

        // At least one body representation must be present. Empty strings
        // count as absent, the same as the required fields above.
        let body = match (nonempty(text), nonempty(html)) {
            (Some(text), Some(html)) => EmailBody::Multipart {
                text: text.into(),
                html: html.into(),
            },
            (Some(text), None) => EmailBody::Text(text.into()),
            (None, Some(html)) => EmailBody::Html(html.into()),
            (None, None) => return Err(RelayError::MissingFields),
        };

        Ok(ValidatedSendRequest {
            from,
            subject,
            body,
        })
    }
}

fn nonempty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

struct ValidatedSendRequest<'a> {
    from: &'a str,
    subject: &'a str,
    body: EmailBody,
}

#[derive(Serialize)]
struct SuccessResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

#[derive(Debug)]
pub enum RelayError {
    MissingFields,
    Delivery(MailError),
}

impl RelayError {
    fn log(&self) {
        match self {
            RelayError::MissingFields => {
                debug!("Rejected send request with missing required fields");
            }
            RelayError::Delivery(error) => {
                error!("Error relaying email: {error}");
            }
        }
    }

    fn into_response(self) -> HttpResponse {
        match self {
            RelayError::MissingFields => HttpResponse::BadRequest().json(ErrorResponse {
                error: "Missing required fields",
            }),
            RelayError::Delivery(_) => HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to send email",
            }),
        }
    }
}

impl Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::MissingFields => write!(f, "Missing required fields in request"),
            RelayError::Delivery(error) => write!(f, "Error delivering mail: {error}"),
        }
    }
}

impl std::error::Error for RelayError {}

#[derive(Debug)]
pub enum EnvironmentError {
    MissingVariable(&'static str),
}

impl Display for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentError::MissingVariable(name) => {
                write!(f, "Missing environment variable {name}")
            }
        }
    }
}

impl std::error::Error for EnvironmentError {}
