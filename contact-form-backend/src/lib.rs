pub mod mailer;
mod templates;

use actix_web::{dev::Server, web, App, HttpResponse, HttpServer};
use mailer::{Email, MailError, MailTransport};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, net::TcpListener};
use tracing::{debug, error};

const AUTO_REPLY_SENDER_NAME: &str = "Alex Varga";
const AUTO_REPLY_SUBJECT: &str = "Thanks for contacting me!";

pub fn run<MailTransportT: MailTransport + 'static>(
    listener: TcpListener,
    handler: ContactFormHandler<MailTransportT>,
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
    handler: web::Data<ContactFormHandler<MailTransportT>>,
    submission: web::Json<ContactSubmission>,
) -> HttpResponse {
    match handler.handle(submission.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(SuccessResponse {
            success: true,
            message: "Email sent successfully",
        }),
        Err(error) => {
            error.log();
            error.into_response()
        }
    }
}

pub struct ContactFormHandler<MailTransportT: MailTransport> {
    transport: MailTransportT,
    operator_mailbox: String,
}

impl<MailTransportT: MailTransport> ContactFormHandler<MailTransportT> {
    pub fn new(transport: MailTransportT, operator_mailbox: String) -> Self {
        Self {
            transport,
            operator_mailbox,
        }
    }

    /// Sends the notification mail to the operator, then the auto-reply to the
    /// submitter. The auto-reply is skipped when the notification fails so
    /// that the submitter is not told about a message nobody received.
    pub async fn handle(&self, submission: ContactSubmission) -> Result<(), ContactFormError> {
        let validated = submission.validate()?;
        self.send(self.notification_email(&validated)).await?;
        self.send(self.auto_reply_email(&validated)).await?;
        Ok(())
    }

    fn notification_email(&self, submission: &ValidatedSubmission) -> Email {
        Email {
            to: self.operator_mailbox.clone(),
            from: self.operator_mailbox.clone(),
            subject: format!("New message from {}", submission.name),
            html: templates::render_notification(submission),
        }
    }

    fn auto_reply_email(&self, submission: &ValidatedSubmission) -> Email {
        Email {
            to: submission.email.into(),
            from: format!("{AUTO_REPLY_SENDER_NAME} <{}>", self.operator_mailbox),
            subject: AUTO_REPLY_SUBJECT.into(),
            html: templates::render_auto_reply(submission.name),
        }
    }

    async fn send(&self, email: Email) -> Result<(), ContactFormError> {
        self.transport
            .send(&email)
            .await
            .map_err(ContactFormError::Delivery)
    }
}

#[derive(Deserialize, Debug)]
pub struct ContactSubmission {
    name: Option<String>,
    email: Option<String>,
    message: Option<String>,
}

impl ContactSubmission {
    fn validate(&self) -> Result<ValidatedSubmission, ContactFormError> {
        let ContactSubmission {
            name: Some(name),
            email: Some(email),
            message: Some(message),
        } = self
        else {
            return Err(ContactFormError::MissingFields);
        };

        // Empty strings count as missing, matching what a browser submits for
        // an untouched form field.
        if name.is_empty() || email.is_empty() || message.is_empty() {
            return Err(ContactFormError::MissingFields);
        }

        Ok(ValidatedSubmission {
            name,
            email,
            message,
        })
    }
}

pub(crate) struct ValidatedSubmission<'a> {
    pub(crate) name: &'a str,
    pub(crate) email: &'a str,
    pub(crate) message: &'a str,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
}

#[derive(Debug)]
pub enum ContactFormError {
    MissingFields,
    Delivery(MailError),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::MissingFields => {
                debug!("Rejected contact form submission with missing fields");
            }
            ContactFormError::Delivery(error) => {
                error!("Error sending contact form email: {error}");
            }
        }
    }

    fn into_response(self) -> HttpResponse {
        match self {
            ContactFormError::MissingFields => HttpResponse::BadRequest().json(ErrorResponse {
                success: false,
                error: "Missing fields",
            }),
            ContactFormError::Delivery(_) => {
                HttpResponse::InternalServerError().json(ErrorResponse {
                    success: false,
                    error: "Email failed to send",
                })
            }
        }
    }
}

impl Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::MissingFields => write!(f, "Missing fields in request"),
            ContactFormError::Delivery(error) => write!(f, "Error delivering mail: {error}"),
        }
    }
}

impl std::error::Error for ContactFormError {}

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::test_support::FakeMailTransport;
    use actix_web::body::to_bytes;
    use googletest::prelude::*;
    use serde_json::{json, Value};

    const OPERATOR_MAILBOX: &str = "operator@example.com";

    #[tokio::test]
    async fn sends_notification_then_auto_reply_on_valid_submission() -> Result<()> {
        let subject = handler_with(FakeMailTransport::new());

        let result = subject
            .handle(submission("Ann", "ann@example.com", "Hi\nthere"))
            .await;

        verify_that!(result, ok(anything()))?;
        verify_that!(
            subject.transport.submitted_messages(),
            elements_are![
                matches_pattern!(Email {
                    to: eq(OPERATOR_MAILBOX),
                    from: eq(OPERATOR_MAILBOX),
                    subject: eq("New message from Ann"),
                    html: contains_substring("Hi<br>there"),
                }),
                matches_pattern!(Email {
                    to: eq("ann@example.com"),
                    from: eq("Alex Varga <operator@example.com>"),
                    subject: eq("Thanks for contacting me!"),
                    html: contains_substring("Hi Ann,"),
                }),
            ]
        )
    }

    #[tokio::test]
    async fn rejects_submission_with_missing_name() -> Result<()> {
        let subject = handler_with(FakeMailTransport::new());

        let result = subject
            .handle(ContactSubmission {
                name: None,
                email: Some("ann@example.com".into()),
                message: Some("A message".into()),
            })
            .await;

        verify_that!(result, err(displays_as(eq("Missing fields in request"))))?;
        verify_that!(subject.transport.submitted_messages(), elements_are![])
    }

    #[tokio::test]
    async fn rejects_submission_with_empty_email() -> Result<()> {
        let subject = handler_with(FakeMailTransport::new());

        let result = subject.handle(submission("Ann", "", "A message")).await;

        verify_that!(result, err(displays_as(eq("Missing fields in request"))))?;
        verify_that!(subject.transport.submitted_messages(), elements_are![])
    }

    #[tokio::test]
    async fn does_not_send_auto_reply_when_notification_fails() -> Result<()> {
        let subject = handler_with(FakeMailTransport::failing());

        let result = subject
            .handle(submission("Ann", "ann@example.com", "A message"))
            .await;

        verify_that!(
            result,
            err(displays_as(contains_substring("Error delivering mail")))
        )?;
        verify_that!(subject.transport.submitted_messages().len(), eq(1))
    }

    #[tokio::test]
    async fn responds_with_success_payload_when_mail_is_sent() -> Result<()> {
        let subject = web::Data::new(handler_with(FakeMailTransport::new()));

        let response = send_email(
            subject,
            web::Json(submission("Ann", "ann@example.com", "A message")),
        )
        .await;

        verify_that!(response.status().as_u16(), eq(200))?;
        verify_that!(
            body_json(response).await,
            eq(json!({"success": true, "message": "Email sent successfully"}))
        )
    }

    #[tokio::test]
    async fn responds_with_client_error_payload_when_fields_are_missing() -> Result<()> {
        let subject = web::Data::new(handler_with(FakeMailTransport::new()));

        let response = send_email(
            subject,
            web::Json(ContactSubmission {
                name: None,
                email: None,
                message: None,
            }),
        )
        .await;

        verify_that!(response.status().as_u16(), eq(400))?;
        verify_that!(
            body_json(response).await,
            eq(json!({"success": false, "error": "Missing fields"}))
        )
    }

    #[tokio::test]
    async fn responds_with_server_error_payload_when_delivery_fails() -> Result<()> {
        let subject = web::Data::new(handler_with(FakeMailTransport::failing()));

        let response = send_email(
            subject,
            web::Json(submission("Ann", "ann@example.com", "A message")),
        )
        .await;

        verify_that!(response.status().as_u16(), eq(500))?;
        verify_that!(
            body_json(response).await,
            eq(json!({"success": false, "error": "Email failed to send"}))
        )
    }

    fn handler_with(transport: FakeMailTransport) -> ContactFormHandler<FakeMailTransport> {
        ContactFormHandler::new(transport, OPERATOR_MAILBOX.into())
    }

    fn submission(name: &str, email: &str, message: &str) -> ContactSubmission {
        ContactSubmission {
            name: Some(name.into()),
            email: Some(email.into()),
            message: Some(message.into()),
        }
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
