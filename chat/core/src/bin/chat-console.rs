//! Chat Console
//!
//! Line-based surface for the chat core. Reads questions from stdin, prints
//! the timeline after each exchange, and reports transient notices on stderr.
//!
//! # Usage
//!
//! ```bash
//! # Open the configured default session
//! chat-console
//!
//! # Open session 42 against a specific backend
//! CHAT_WIDGET_BASE_URL=https://chat.example.com chat-console 42
//!
//! # With verbose logging
//! RUST_LOG=debug chat-console
//! ```
//!
//! # Commands
//!
//! - `:open <id>`: switch to another session
//! - `:quit`: exit (end of input works too)
//!
//! # Environment Variables
//!
//! - `CHAT_WIDGET_BASE_URL`: chat service base URL
//! - `CHAT_WIDGET_SESSION`: session opened on startup
//! - `CHAT_WIDGET_TIMEOUT_SECS`: HTTP request timeout
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use chat_core::{
    load_config, ChannelNotifier, ChatClient, ConfigOverrides, HttpChatBackend, Message,
    MessageOrigin, MessageStatus, Notification, SessionId, SessionLoad,
};

/// One line of console input
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Open(&'a str),
    /// `:open` without a session id
    OpenWithoutId,
    Ask(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim_end();
    if line == ":quit" {
        return Command::Quit;
    }
    match line.strip_prefix(":open") {
        Some(rest) if rest.is_empty() => Command::OpenWithoutId,
        Some(rest) if rest.starts_with(char::is_whitespace) => match rest.trim() {
            "" => Command::OpenWithoutId,
            id => Command::Open(id),
        },
        _ => Command::Ask(line),
    }
}

/// Render one timeline entry as a console line
fn render(message: &Message) -> String {
    let who = match message.origin() {
        MessageOrigin::User => "you",
        MessageOrigin::Assistant => "bot",
    };
    let marker = match message.status {
        MessageStatus::Loading => " …",
        MessageStatus::Error => " !",
        MessageStatus::Local | MessageStatus::Success => "",
    };
    format!("[{who}{marker}] {}", message.text)
}

/// Print notices as they arrive
async fn print_notifications(mut rx: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        eprintln!("({:?}) {}", notification.level, notification.message);
    }
}

async fn open(client: &mut ChatClient, session_id: SessionId) -> anyhow::Result<()> {
    match client.open_session(session_id.clone()).await? {
        SessionLoad::Restored { records } => {
            info!(session_id = %session_id, records, "Session restored");
        }
        SessionLoad::Unavailable => {
            info!(session_id = %session_id, "Session history unavailable, starting fresh");
        }
    }
    for message in client.timeline().iter() {
        println!("{}", render(message));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_console=info".parse()?)
                .add_directive("chat_core=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config()?;
    if let Some(session) = std::env::args().nth(1) {
        ConfigOverrides::new()
            .with_session_id(SessionId::new(session))
            .apply(&mut config)?;
    }
    info!(
        base_url = %config.base_url,
        source = %config.source(),
        "Starting chat console"
    );

    let backend = Arc::new(HttpChatBackend::from_config(&config)?);
    let (notifier, notifications) = ChannelNotifier::new();
    tokio::spawn(print_notifications(notifications));

    let mut client = ChatClient::new(&config, backend, Arc::new(notifier));
    open(&mut client, config.default_session_id.clone()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Quit => break,
            Command::Open(id) => open(&mut client, SessionId::new(id)).await?,
            Command::OpenWithoutId => eprintln!("usage: :open <session id>"),
            Command::Ask(text) => {
                if let Some(reply) = client.submit(text).await? {
                    println!("{}", render(&reply));
                }
            }
        }
    }

    info!("Chat console exiting");
    Ok(())
}
