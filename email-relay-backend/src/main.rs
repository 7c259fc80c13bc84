use email_relay_backend::{mailer::SmtpMailTransport, operator_mailbox, run, EmailRelayHandler};
use std::net::TcpListener;
use tracing::info;

const BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let handler =
        EmailRelayHandler::new(SmtpMailTransport::from_environment()?, operator_mailbox()?);
    let listener = TcpListener::bind((BIND_ADDRESS, listen_port()))?;
    info!("Server running on port {}", listener.local_addr()?.port());
    run(listener, handler)?.await?;
    Ok(())
}

fn listen_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
