use crate::ValidatedSubmission;
use chrono::{Datelike, Utc};
use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format_unescaped, TinyTemplate};

const NOTIFICATION_TEMPLATE_NAME: &str = "notification";
const AUTO_REPLY_TEMPLATE_NAME: &str = "auto-reply";
const NOTIFICATION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.html"
));
const AUTO_REPLY_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/auto-reply.html"
));

#[derive(Serialize)]
struct NotificationContext<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
    year: i32,
}

#[derive(Serialize)]
struct AutoReplyContext<'a> {
    name: &'a str,
    year: i32,
}

pub(crate) fn render_notification(submission: &ValidatedSubmission) -> String {
    let mut tt = TinyTemplate::new();
    tt.add_formatter("render_line_breaks", render_line_breaks);
    tt.add_template(NOTIFICATION_TEMPLATE_NAME, NOTIFICATION_TEMPLATE)
        .unwrap();
    let context = NotificationContext {
        name: submission.name,
        email: submission.email,
        message: submission.message,
        year: current_year(),
    };
    tt.render(NOTIFICATION_TEMPLATE_NAME, &context).unwrap()
}

pub(crate) fn render_auto_reply(name: &str) -> String {
    let mut tt = TinyTemplate::new();
    tt.add_template(AUTO_REPLY_TEMPLATE_NAME, AUTO_REPLY_TEMPLATE)
        .unwrap();
    let context = AutoReplyContext {
        name,
        year: current_year(),
    };
    tt.render(AUTO_REPLY_TEMPLATE_NAME, &context).unwrap()
}

// Submitted text goes into the mail verbatim. Only newlines are rewritten so
// that the message keeps its line structure in an HTML body.
fn render_line_breaks(value: &Value, output: &mut String) -> Result<(), Error> {
    let mut formatted = String::new();
    format_unescaped(value, &mut formatted)?;
    output.push_str(&formatted.replace('\n', "<br>"));
    Ok(())
}

fn current_year() -> i32 {
    Utc::now().year()
}
