// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : bling_slack_relay — Bling order relay for Slack in Rust
Module  : config.rs
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
use chrono::NaiveTime;
use clap::Parser;
use dotenvy::dotenv;
use std::time::Duration;
use tracing::error;

#[derive(Parser, Clone, Debug)]
#[command(name = "bling_slack_relay", version, about = "Relay Bling orders to Slack")]
pub struct Args {
    // ===== Credentials & channels (required, but absence is only logged) =====
    #[arg(long, env = "BLING_API_KEY", hide_env_values = true)]
    pub bling_api_key: Option<String>,
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: Option<String>,
    /// App-level token used for Socket Mode
    #[arg(long, env = "SLACK_APP_TOKEN", hide_env_values = true)]
    pub slack_app_token: Option<String>,
    #[arg(long, env = "SLACK_CHANNEL_ID")]
    pub slack_channel_id: Option<String>,
    #[arg(long, env = "SLACK_ACRYLIC_CHANNEL_ID")]
    pub slack_acrylic_channel_id: Option<String>,

    // ===== Endpoints =====
    #[arg(long, env = "BLING_API_URL", default_value = "https://bling.com.br/Api/v2")]
    pub bling_api_url: String,
    #[arg(long, env = "SLACK_API_URL", default_value = "https://slack.com/api")]
    pub slack_api_url: String,

    // ===== Loop =====
    #[arg(long, env = "DEDUP_FILE", default_value = "sent_orders.txt")]
    pub dedup_file: String,
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,
    /// Local hour (0-23) from which the daily digest may fire
    #[arg(long, env = "DIGEST_HOUR", default_value_t = 8, value_parser = clap::value_parser!(u32).range(0..24))]
    pub digest_hour: u32,

    // ===== Metrics =====
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Channel ids the scheduler posts to.
#[derive(Clone, Debug, Default)]
pub struct Channels {
    pub orders: String,
    pub acrylic: String,
}

impl Args {
    /// Log every missing required value. Nothing here is fatal: calls that
    /// need a missing value fail later on their own.
    pub fn report_missing(&self) -> usize {
        let required = [
            ("BLING_API_KEY", &self.bling_api_key),
            ("SLACK_BOT_TOKEN", &self.slack_bot_token),
            ("SLACK_APP_TOKEN", &self.slack_app_token),
            ("SLACK_CHANNEL_ID", &self.slack_channel_id),
            ("SLACK_ACRYLIC_CHANNEL_ID", &self.slack_acrylic_channel_id),
        ];
        let mut missing = 0;
        for (key, value) in required {
            if value.as_deref().map_or(true, str::is_empty) {
                error!(%key, "config: required value not set");
                missing += 1;
            }
        }
        missing
    }

    pub fn channels(&self) -> Channels {
        Channels {
            orders: self.slack_channel_id.clone().unwrap_or_default(),
            acrylic: self.slack_acrylic_channel_id.clone().unwrap_or_default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn digest_at(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.digest_hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }
}

pub fn load() -> Args {
    // .env first so clap's env fallbacks can see it
    let _ = dotenv();
    Args::parse()
}
