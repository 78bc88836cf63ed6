// ===============================
// src/listener.rs
// ===============================
//
// Command Listener over Slack Socket Mode.
// - every envelope with an envelope_id is acked right away (no redelivery)
// - app_mention containing "relatório" -> trailing-24h acrylic digest reply
// - "disconnect" from Slack -> open a fresh connection
// - socket errors end the listener (no supervision, no backoff)
//
use chrono::Local;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::bling::OrderSource;
use crate::error::RelayError;
use crate::metrics::{DIGESTS, SOCKET_ENVELOPES};
use crate::report::NOTHING_TO_REPORT;
use crate::scheduler::build_acrylic_digest;
use crate::slack::{deliver, Ack, Event, MessageSink, SlackClient, SocketEnvelope};

const REPORT_KEYWORD: &str = "relatório";

/// What to do with one inbound envelope, after the ack.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Digest { channel: String },
    Reconnect,
    Ignore,
}

pub fn wants_report(text: &str) -> bool {
    text.to_lowercase().contains(REPORT_KEYWORD)
}

pub fn classify(env: &SocketEnvelope) -> Command {
    match env.kind() {
        "disconnect" => Command::Reconnect,
        "events_api" => match env.event() {
            Some(Event { kind: Some(kind), text: Some(text), channel: Some(channel) })
                if kind == "app_mention" && wants_report(&text) =>
            {
                Command::Digest { channel }
            }
            _ => Command::Ignore,
        },
        _ => Command::Ignore,
    }
}

pub struct CommandListener<S, M> {
    slack: SlackClient,
    source: S,
    sink: M,
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Refresh,
    Closed,
}

impl<S: OrderSource, M: MessageSink> CommandListener<S, M> {
    pub fn new(slack: SlackClient, source: S, sink: M) -> Self {
        Self { slack, source, sink }
    }

    pub async fn run(self) {
        loop {
            let ws_url = match self.slack.open_connection().await {
                Ok(u) => u,
                Err(e) => {
                    error!(error = %e, "listener: apps.connections.open failed");
                    return;
                }
            };
            match self.session(&ws_url).await {
                Ok(SessionEnd::Refresh) => {
                    info!("listener: refresh requested, reconnecting");
                }
                Ok(SessionEnd::Closed) => {
                    warn!("listener: socket closed, listener stopped");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "listener: socket error, listener stopped");
                    return;
                }
            }
        }
    }

    async fn session(&self, ws_url: &str) -> Result<SessionEnd, RelayError> {
        let url = Url::parse(ws_url)?;
        let (mut ws, _) = connect_async(url.as_str()).await?;
        info!("listener: socket mode connected");

        while let Some(frame) = ws.next().await {
            let txt = match frame? {
                Message::Text(t) => t,
                Message::Close(_) => return Ok(SessionEnd::Closed),
                _ => continue,
            };
            let env = match serde_json::from_str::<SocketEnvelope>(&txt) {
                Ok(env) => env,
                Err(e) => {
                    // not even a JSON object: there is no envelope_id to ack
                    warn!(?e, "listener: undecodable frame, skipped");
                    continue;
                }
            };
            SOCKET_ENVELOPES.with_label_values(&[env.kind()]).inc();

            if let Some(id) = env.envelope_id.as_deref() {
                let ack = serde_json::to_string(&Ack { envelope_id: id })?;
                ws.send(Message::Text(ack)).await?;
                debug!(envelope_id = %id, "listener: acked");
            }

            match classify(&env) {
                Command::Digest { channel } => self.answer_report(&channel).await,
                Command::Reconnect => return Ok(SessionEnd::Refresh),
                Command::Ignore => {}
            }
        }
        Ok(SessionEnd::Closed)
    }

    pub async fn answer_report(&self, channel: &str) {
        info!(%channel, "listener: report requested");
        let today = Local::now().date_naive();
        match build_acrylic_digest(&self.source, today).await {
            Some(digest) => {
                deliver(&self.sink, channel, &digest).await;
                DIGESTS.with_label_values(&["command", "sent"]).inc();
            }
            None => {
                deliver(&self.sink, channel, NOTHING_TO_REPORT).await;
                DIGESTS.with_label_values(&["command", "empty"]).inc();
            }
        }
    }
}
