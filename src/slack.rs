// ===============================
// src/slack.rs
// ===============================
//
// Slack Web API (bot token) + Socket Mode bootstrap (app token).
// Only the handful of calls the relay needs:
//   auth.test, chat.postMessage, apps.connections.open
//
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::error::RelayError;
use crate::metrics::SLACK_SEND_ERRORS;

/// Delivery Sink: posts a text message to a channel.
pub trait MessageSink {
    fn send(&self, channel: &str, text: &str) -> impl Future<Output = Result<(), RelayError>> + Send;
}

/// Post and swallow the failure after logging it; delivery is best effort.
pub async fn deliver<M: MessageSink>(sink: &M, channel: &str, text: &str) -> bool {
    match sink.send(channel, text).await {
        Ok(()) => {
            info!(%channel, "slack: message sent");
            true
        }
        Err(e) => {
            error!(%channel, error = %e, code = %e.code(), "slack: send failed");
            SLACK_SEND_ERRORS.with_label_values(&[e.code()]).inc();
            false
        }
    }
}

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    app_token: String,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_base", &self.api_base)
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .finish()
    }
}

// ---- Minimal Web API models ----
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl ApiReply {
    fn into_result(self) -> Result<Self, RelayError> {
        if self.ok {
            Ok(self)
        } else {
            Err(RelayError::Slack(self.error.unwrap_or_else(|| "unknown_error".to_string())))
        }
    }
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

impl SlackClient {
    pub fn new(http: reqwest::Client, api_base: String, bot_token: String, app_token: String) -> Self {
        Self { http, api_base, bot_token, app_token }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), method)
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<ApiReply, RelayError> {
        let mut req = self.http.post(self.method_url(method)).bearer_auth(token);
        if let Some(b) = body {
            req = req.json(b);
        }
        let rsp = req.send().await?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(RelayError::Status { status, body });
        }
        rsp.json::<ApiReply>().await?.into_result()
    }

    /// Validates the bot token; returns the bot user id.
    pub async fn auth_test(&self) -> Result<String, RelayError> {
        let reply = self.call::<()>("auth.test", &self.bot_token, None).await?;
        Ok(reply.user_id.unwrap_or_default())
    }

    /// Socket Mode: ask for a fresh websocket URL.
    pub async fn open_connection(&self) -> Result<String, RelayError> {
        let reply = self.call::<()>("apps.connections.open", &self.app_token, None).await?;
        reply.url.ok_or_else(|| RelayError::Slack("missing_url".to_string()))
    }
}

impl MessageSink for SlackClient {
    async fn send(&self, channel: &str, text: &str) -> Result<(), RelayError> {
        self.call("chat.postMessage", &self.bot_token, Some(&PostMessage { channel, text }))
            .await
            .map(|_| ())
    }
}

// ---- Socket Mode envelopes ----
//
// Two-step decode: the header (id + type) must survive any payload shape so
// the envelope can always be acked; the event is read afterwards, best effort.
#[derive(Debug, Deserialize)]
pub struct SocketEnvelope {
    #[serde(default)]
    pub envelope_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl SocketEnvelope {
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    /// `payload.event`, or None when absent or not shaped like a message event
    /// (e.g. `channel_created` carries `channel` as an object).
    pub fn event(&self) -> Option<Event> {
        let raw = self.payload.as_ref()?.get("event")?;
        Event::deserialize(raw).ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct Event {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Ack<'a> {
    pub envelope_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_reply_error_code_is_kept() {
        let reply: ApiReply = serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        match reply.into_result() {
            Err(RelayError::Slack(code)) => assert_eq!(code, "channel_not_found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn api_reply_ok_carries_fields() {
        let reply: ApiReply =
            serde_json::from_str(r#"{"ok":true,"user_id":"U123","url":"wss://x"}"#).unwrap();
        let reply = reply.into_result().unwrap();
        assert_eq!(reply.user_id.as_deref(), Some("U123"));
        assert_eq!(reply.url.as_deref(), Some("wss://x"));
    }

    #[test]
    fn envelope_decodes_app_mention() {
        let raw = r#"{"envelope_id":"e-1","type":"events_api","accepts_response_payload":false,
            "payload":{"event":{"type":"app_mention","text":"<@U1> relatório","channel":"C9","user":"U2"}}}"#;
        let env: SocketEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.envelope_id.as_deref(), Some("e-1"));
        assert_eq!(env.kind(), "events_api");
        let ev = env.event().unwrap();
        assert_eq!(ev.kind.as_deref(), Some("app_mention"));
        assert_eq!(ev.channel.as_deref(), Some("C9"));
    }

    #[test]
    fn odd_payloads_keep_the_envelope_id() {
        let null_text = r#"{"envelope_id":"e-9","type":"events_api",
            "payload":{"event":{"type":"message","text":null,"channel":"C1"}}}"#;
        let env: SocketEnvelope = serde_json::from_str(null_text).unwrap();
        assert_eq!(env.envelope_id.as_deref(), Some("e-9"));
        let ev = env.event().unwrap();
        assert!(ev.text.is_none());

        let channel_object = r#"{"envelope_id":"e-10","type":"events_api",
            "payload":{"event":{"type":"channel_created","channel":{"id":"C1","name":"vendas"}}}}"#;
        let env: SocketEnvelope = serde_json::from_str(channel_object).unwrap();
        assert_eq!(env.envelope_id.as_deref(), Some("e-10"));
        assert!(env.event().is_none());

        let no_type: SocketEnvelope = serde_json::from_str(r#"{"envelope_id":"e-11","type":null,"payload":7}"#).unwrap();
        assert_eq!(no_type.kind(), "");
        assert!(no_type.event().is_none());
    }

    #[test]
    fn ack_shape() {
        let ack = serde_json::to_string(&Ack { envelope_id: "e-1" }).unwrap();
        assert_eq!(ack, r#"{"envelope_id":"e-1"}"#);
    }

    #[test]
    fn debug_redacts_tokens() {
        let c = SlackClient::new(reqwest::Client::new(), "https://slack.com/api".into(), "xoxb-1".into(), "xapp-1".into());
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("xoxb-1"));
        assert!(!dbg.contains("xapp-1"));
    }
}
