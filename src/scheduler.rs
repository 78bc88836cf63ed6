// ===============================
// src/scheduler.rs
// ===============================
//
// Main control loop. Each cycle:
// 1) daily acrylic digest, once per calendar date, from `digest_at` onwards
// 2) fetch today's open orders, relay the unseen ones, persist the dedup set
// then sleep a fixed interval. Runs until the process is killed.
//
use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::bling::OrderSource;
use crate::classifier;
use crate::config::Channels;
use crate::dedup::DedupStore;
use crate::domain::DateRange;
use crate::metrics::{ACRYLIC_FORWARDED, DEDUP_SIZE, DIGESTS, ORDERS_NOTIFIED, POLL_CYCLES};
use crate::report;
use crate::slack::{deliver, MessageSink};

/// Mutable state owned by the loop; never shared with the listener.
#[derive(Debug, Default)]
pub struct RelayState {
    pub sent: HashSet<String>,
    pub last_digest: Option<NaiveDate>,
}

impl RelayState {
    pub fn new(sent: HashSet<String>) -> Self {
        Self { sent, last_digest: None }
    }
}

pub struct Relay<S, M> {
    pub source: S,
    pub sink: M,
    pub store: DedupStore,
    pub channels: Channels,
    pub digest_at: NaiveTime,
    pub interval: Duration,
}

/// Trailing-24h digest; shared by the daily trigger and the mention command.
pub async fn build_acrylic_digest<S: OrderSource>(source: &S, today: NaiveDate) -> Option<String> {
    let orders = source.fetch(Some(DateRange::trailing_day(today))).await;
    if orders.is_empty() {
        info!("digest: no orders in the last 24h");
        return None;
    }
    report::acrylic_digest(&orders)
}

impl<S: OrderSource, M: MessageSink> Relay<S, M> {
    pub async fn run(&self, state: &mut RelayState) {
        info!(
            interval_secs = self.interval.as_secs(),
            digest_at = %self.digest_at,
            known_orders = state.sent.len(),
            "scheduler: started"
        );
        loop {
            self.cycle(state, Local::now()).await;
            sleep(self.interval).await;
        }
    }

    pub async fn cycle(&self, state: &mut RelayState, now: DateTime<Local>) {
        POLL_CYCLES.inc();
        self.maybe_daily_digest(state, now).await;
        self.poll_orders(state).await;
    }

    async fn maybe_daily_digest(&self, state: &mut RelayState, now: DateTime<Local>) {
        let today = now.date_naive();
        if now.time() < self.digest_at || state.last_digest == Some(today) {
            return;
        }
        // recorded up front: at most one digest per date, even when empty
        state.last_digest = Some(today);

        match build_acrylic_digest(&self.source, today).await {
            Some(digest) => {
                deliver(&self.sink, &self.channels.acrylic, &digest).await;
                DIGESTS.with_label_values(&["scheduled", "sent"]).inc();
            }
            None => {
                info!(%today, "digest: no acrylic sales to report today");
                DIGESTS.with_label_values(&["scheduled", "empty"]).inc();
            }
        }
    }

    async fn poll_orders(&self, state: &mut RelayState) {
        let orders = self.source.fetch(None).await;
        if orders.is_empty() {
            info!("poll: no orders to send");
            return;
        }

        let mut fresh = 0usize;
        for order in &orders {
            if state.sent.contains(&order.id) {
                continue;
            }
            let msg = report::order_message(order);
            deliver(&self.sink, &self.channels.orders, &msg).await;
            state.sent.insert(order.id.clone());
            ORDERS_NOTIFIED.inc();
            fresh += 1;

            if classifier::forwards_to_acrylic(order) {
                deliver(&self.sink, &self.channels.acrylic, &msg).await;
                ACRYLIC_FORWARDED.inc();
            }
        }

        DEDUP_SIZE.set(state.sent.len() as i64);
        if let Err(e) = self.store.save(&state.sent).await {
            error!(error = %e, path = %self.store.path().display(), "dedup: save failed");
        }
        info!(fetched = orders.len(), fresh, "poll: cycle done");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::tests::{item, order};
    use crate::domain::Order;
    use crate::error::RelayError;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Returns the same orders for any range; records the ranges asked for.
    #[derive(Clone, Default)]
    pub(crate) struct FakeSource {
        pub orders: Arc<Mutex<Vec<Order>>>,
        pub calls: Arc<Mutex<Vec<Option<DateRange>>>>,
    }

    impl OrderSource for FakeSource {
        async fn fetch(&self, range: Option<DateRange>) -> Vec<Order> {
            self.calls.lock().unwrap().push(range);
            self.orders.lock().unwrap().clone()
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeSink {
        pub sent: Arc<Mutex<Vec<(String, String)>>>,
        pub fail: bool,
    }

    impl FakeSink {
        pub(crate) fn to(&self, channel: &str) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| c == channel)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    impl MessageSink for FakeSink {
        async fn send(&self, channel: &str, text: &str) -> Result<(), RelayError> {
            self.sent.lock().unwrap().push((channel.to_string(), text.to_string()));
            if self.fail {
                Err(RelayError::Slack("not_in_channel".into()))
            } else {
                Ok(())
            }
        }
    }

    fn relay(dir: &TempDir, source: FakeSource, sink: FakeSink) -> Relay<FakeSource, FakeSink> {
        Relay {
            source,
            sink,
            store: DedupStore::new(dir.path().join("sent_orders.txt")),
            channels: Channels { orders: "C-ORD".into(), acrylic: "C-ACR".into() },
            digest_at: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            interval: Duration::from_secs(60),
        }
    }

    fn at(h: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, d, h, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn same_order_is_notified_once_across_cycles() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default();
        source.orders.lock().unwrap().push(order("4512", "204764247", vec![item("Pedal", "", 1)]));
        let sink = FakeSink::default();
        let r = relay(&dir, source, sink.clone());

        let mut state = RelayState::new(r.store.load().await.unwrap());
        r.cycle(&mut state, at(7, 10)).await;

        // restart: state comes back from disk
        let mut state = RelayState::new(r.store.load().await.unwrap());
        r.cycle(&mut state, at(7, 10)).await;

        assert_eq!(sink.to("C-ORD").len(), 1);
        assert!(sink.to("C-ACR").is_empty());
    }

    #[tokio::test]
    async fn empty_fetch_does_not_touch_dedup_file() {
        let dir = TempDir::new().unwrap();
        let r = relay(&dir, FakeSource::default(), FakeSink::default());
        let mut state = RelayState::default();
        r.cycle(&mut state, at(7, 10)).await;
        assert!(!r.store.path().exists());
    }

    #[tokio::test]
    async fn known_orders_still_trigger_a_save() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default();
        source.orders.lock().unwrap().push(order("1", "204764247", vec![]));
        let r = relay(&dir, source, FakeSink::default());
        let mut state = RelayState::new(["1".to_string()].into_iter().collect());
        r.cycle(&mut state, at(7, 10)).await;
        assert_eq!(std::fs::read_to_string(r.store.path()).unwrap(), "1\n");
    }

    #[tokio::test]
    async fn acrylic_orders_are_copied_unless_store_is_excluded() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default();
        source.orders.lock().unwrap().extend([
            order("1", "204765146", vec![item("Produto Acrílico Azul", "", 3)]),
            order("2", "204768359", vec![item("Acrílico", "", 1)]),
        ]);
        let sink = FakeSink::default();
        let r = relay(&dir, source, sink.clone());
        let mut state = RelayState::default();
        r.cycle(&mut state, at(7, 10)).await;

        assert_eq!(sink.to("C-ORD").len(), 2);
        let acrylic = sink.to("C-ACR");
        assert_eq!(acrylic.len(), 1);
        assert_eq!(acrylic[0], sink.to("C-ORD")[0]);
    }

    #[tokio::test]
    async fn daily_digest_fires_once_per_date() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default();
        source.orders.lock().unwrap().push(order("1", "204765146", vec![item("Acrílico", "", 2)]));
        let sink = FakeSink::default();
        let r = relay(&dir, source.clone(), sink.clone());
        let mut state = RelayState::default();

        r.cycle(&mut state, at(7, 10)).await;
        r.cycle(&mut state, at(8, 10)).await;
        r.cycle(&mut state, at(9, 10)).await;
        r.cycle(&mut state, at(23, 10)).await;
        r.cycle(&mut state, at(8, 11)).await;

        let digests: Vec<String> =
            sink.to("C-ACR").into_iter().filter(|t| t.starts_with(report::DIGEST_TITLE)).collect();
        assert_eq!(digests.len(), 2);
        assert_eq!(state.last_digest, Some(NaiveDate::from_ymd_opt(2024, 5, 11).unwrap()));

        let ranges = source.calls.lock().unwrap().clone();
        let day10 = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert!(ranges.contains(&Some(DateRange::trailing_day(day10))));
    }

    #[tokio::test]
    async fn empty_digest_still_marks_the_date() {
        let dir = TempDir::new().unwrap();
        let sink = FakeSink::default();
        let r = relay(&dir, FakeSource::default(), sink.clone());
        let mut state = RelayState::default();
        r.cycle(&mut state, at(8, 10)).await;
        assert_eq!(state.last_digest, Some(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()));
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_send_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default();
        source.orders.lock().unwrap().push(order("7", "204764247", vec![]));
        let sink = FakeSink { fail: true, ..Default::default() };
        let r = relay(&dir, source, sink.clone());
        let mut state = RelayState::default();
        r.cycle(&mut state, at(7, 10)).await;
        r.cycle(&mut state, at(7, 10)).await;
        assert_eq!(sink.to("C-ORD").len(), 1);
        assert!(state.sent.contains("7"));
    }
}
