//! IRC bridge: forwards relayed lines to an HTTP webhook

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Serialize)]
struct IrcPayload<'a> {
    text: &'a str,
}

/// Drain the IRC channel until every sender is gone.
///
/// Without a webhook configured the lines are only logged.
pub async fn run_irc_bridge(mut rx: mpsc::UnboundedReceiver<String>, webhook_url: Option<String>) {
    let client = reqwest::Client::new();

    while let Some(line) = rx.recv().await {
        let Some(url) = webhook_url.as_deref() else {
            info!(target: "irc", "{}", line);
            continue;
        };

        match client.post(url).json(&IrcPayload { text: &line }).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                warn!(status = %resp.status(), "IRC webhook rejected line");
            }
            Err(e) => {
                warn!(error = %e, "IRC webhook request failed");
            }
        }
    }

    info!("IRC bridge stopped");
}
