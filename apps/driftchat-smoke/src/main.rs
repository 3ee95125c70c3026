use std::{env, process, sync::Arc};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use url::Url;

use client_core::ConversationId;
use client_ws::{
    ConversationManager, CredentialProvider, EnvCredentialProvider, ManagerConfig,
    RestHistoryFetcher, WsConnector,
};

mod logging;

#[tokio::main]
async fn main() {
    logging::init();

    let Some(conversation) = env::args().nth(1) else {
        eprintln!("usage: driftchat-smoke <conversation-id>");
        eprintln!("env: DRIFTCHAT_WS_URL, DRIFTCHAT_BASE_URL, DRIFTCHAT_TOKEN, DRIFTCHAT_LOG");
        process::exit(2);
    };

    let ws_base = parse_url_env("DRIFTCHAT_WS_URL", "ws://localhost:4000");
    let api_base = parse_url_env("DRIFTCHAT_BASE_URL", "http://localhost:4000");

    let credentials: Arc<dyn CredentialProvider> =
        Arc::new(EnvCredentialProvider::new("DRIFTCHAT_TOKEN"));
    let history = Arc::new(RestHistoryFetcher::new(api_base, Arc::clone(&credentials)));
    let manager = ConversationManager::new(
        Arc::new(WsConnector),
        credentials,
        history,
        ManagerConfig::new(ws_base),
    );

    let handle = match manager
        .open_conversation(ConversationId::new(conversation))
        .await
    {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("failed to open conversation: {err}");
            process::exit(1);
        }
    };

    handle.subscribe(|message| {
        println!(
            "[{}] {}: {}",
            message.created_at_ms, message.sender_id, message.content
        );
    });
    handle.on_state_change(|state| info!(?state, "session state"));
    handle.on_error(|err| eprintln!("conversation error: {err}"));

    info!(conversation = %handle.conversation_id(), "connected; type to send, Ctrl-D to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = handle.send(line).await {
                    eprintln!("send failed: {err}");
                }
            }
            Ok(None) => break,
            Err(err) => {
                eprintln!("stdin error: {err}");
                break;
            }
        }
    }

    handle.close().await;
}

fn parse_url_env(var: &str, default: &str) -> Url {
    let raw = env::var(var).unwrap_or_else(|_| default.to_owned());
    match Url::parse(&raw) {
        Ok(url) => url,
        Err(err) => {
            eprintln!("invalid {var} '{raw}': {err}");
            process::exit(2);
        }
    }
}
