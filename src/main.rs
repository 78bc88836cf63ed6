// ===============================
// src/main.rs
// ===============================
/*
 # jalankan dengan .env berisi BLING_API_KEY, SLACK_* dan (opsional) METRICS_PORT
 cargo run --release

 # cek aktivitas relay
curl -s localhost:9898/metrics | egrep '^(orders_notified_total|acrylic_digests_total|slack_send_errors_total)'
*/
/*
=============================================================================
Project : bling_slack_relay — Bling order relay for Slack in Rust
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Polls Bling for new open orders, relays them to Slack, keeps a
          durable dedup file, posts a daily acrylic sales digest and answers
          "relatório" mentions over Socket Mode.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod domain;
mod config;
mod error;
mod metrics;
mod stores;
mod classifier;
mod report;
mod bling;      // order source (REST)
mod slack;      // Web API + socket mode models
mod dedup;
mod scheduler;
mod listener;   // socket mode command listener

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bling::BlingClient;
use crate::dedup::DedupStore;
use crate::error::RelayError;
use crate::listener::CommandListener;
use crate::scheduler::{Relay, RelayState};
use crate::slack::SlackClient;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), RelayError> {
    // ---- Config ----
    let args = config::load();
    let missing = args.report_missing();

    info!(
        bling = %args.bling_api_url,
        slack = %args.slack_api_url,
        dedup_file = %args.dedup_file,
        poll_interval_secs = args.poll_interval_secs,
        digest_hour = args.digest_hour,
        missing,
        "startup config"
    );

    // ---- Metrics ----
    metrics::init();
    if let Some(port) = args.metrics_port {
        metrics::serve_metrics(port);
    }

    // ---- Clients ----
    let http = reqwest::Client::new();
    let bling = BlingClient::new(
        http.clone(),
        args.bling_api_url.clone(),
        args.bling_api_key.clone().unwrap_or_default(),
    );
    let slack = SlackClient::new(
        http,
        args.slack_api_url.clone(),
        args.slack_bot_token.clone().unwrap_or_default(),
        args.slack_app_token.clone().unwrap_or_default(),
    );

    // ---- Dedup state (before auth, same as the loop will see it) ----
    let store = DedupStore::new(&args.dedup_file);
    let sent = match store.load().await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, path = %args.dedup_file, "dedup: load failed, starting empty");
            Default::default()
        }
    };
    let mut state = RelayState::new(sent);

    // ---- Slack auth: fatal on failure ----
    let bot_user_id = slack.auth_test().await?;
    info!(%bot_user_id, "slack: authenticated");

    // ---- Command listener (own task, not supervised) ----
    tokio::spawn(CommandListener::new(slack.clone(), bling.clone(), slack.clone()).run());

    // ---- Scheduler loop ----
    let relay = Relay {
        source: bling,
        sink: slack,
        store,
        channels: args.channels(),
        digest_at: args.digest_at(),
        interval: args.poll_interval(),
    };
    relay.run(&mut state).await;
    Ok(())
}
