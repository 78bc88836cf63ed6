// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder, TEXT_FORMAT};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{debug, error, info, warn};

// Relay-only registry; nothing from the default process collector.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Polling --------
pub static POLL_CYCLES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("poll_cycles_total", "scheduler cycles").unwrap());

pub static ORDERS_FETCHED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_fetched_total", "open orders returned by bling").unwrap());

pub static ORDERS_NOTIFIED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("orders_notified_total", "new orders relayed to the primary channel").unwrap()
});

pub static ACRYLIC_FORWARDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("acrylic_forwarded_total", "orders copied to the acrylic channel").unwrap()
});

pub static BLING_FETCH_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bling_fetch_errors_total", "failed order fetches (label: kind)"),
        &["kind"],
    )
    .unwrap()
});

pub static DEDUP_SIZE: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("dedup_entries", "order ids already relayed").unwrap());

// -------- Digest / Slack --------
pub static DIGESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "acrylic_digests_total",
            "acrylic digests built (labels: trigger=scheduled|command, outcome=sent|empty)",
        ),
        &["trigger", "outcome"],
    )
    .unwrap()
});

pub static SLACK_SEND_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("slack_send_errors_total", "chat.postMessage failures (label: error)"),
        &["error"],
    )
    .unwrap()
});

pub static SOCKET_ENVELOPES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("socket_envelopes_total", "socket mode envelopes received (label: type)"),
        &["type"],
    )
    .unwrap()
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(POLL_CYCLES.clone())),
        REGISTRY.register(Box::new(ORDERS_FETCHED.clone())),
        REGISTRY.register(Box::new(ORDERS_NOTIFIED.clone())),
        REGISTRY.register(Box::new(ACRYLIC_FORWARDED.clone())),
        REGISTRY.register(Box::new(BLING_FETCH_ERRORS.clone())),
        REGISTRY.register(Box::new(DEDUP_SIZE.clone())),
        REGISTRY.register(Box::new(DIGESTS.clone())),
        REGISTRY.register(Box::new(SLACK_SEND_ERRORS.clone())),
        REGISTRY.register(Box::new(SOCKET_ENVELOPES.clone())),
    ] {
        if let Err(e) = m {
            warn!(?e, "metrics: register failed");
        }
    }
}

/// Relay series in Prometheus text exposition format.
fn encode_metrics() -> Vec<u8> {
    let mut out = Vec::new();
    match TextEncoder::new().encode(&REGISTRY.gather(), &mut out) {
        Ok(()) if !out.is_empty() => out,
        Ok(()) => b"# relay metrics not registered\n".to_vec(),
        Err(e) => {
            warn!(?e, "metrics: encode failed");
            b"# relay metrics unavailable\n".to_vec()
        }
    }
}

/// Complete HTTP/1.1 reply to one scrape.
fn scrape_response() -> Vec<u8> {
    let body = encode_metrics();
    let mut rsp = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {TEXT_FORMAT}; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    rsp.extend_from_slice(&body);
    rsp
}

// Request line and path are not inspected: every connection is a scrape.
fn answer_scrape(mut stream: TcpStream) {
    let mut request = [0u8; 1024];
    if let Err(e) = stream.read(&mut request) {
        debug!(?e, "metrics: scrape request unreadable");
        return;
    }
    if let Err(e) = stream.write_all(&scrape_response()).and_then(|_| stream.flush()) {
        debug!(?e, "metrics: scrape reply not delivered");
    }
}

/// Blocking accept loop on its own OS thread; the relay loop never waits on it.
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                error!(%addr, ?e, "metrics: bind failed, endpoint disabled");
                return;
            }
        };
        info!(%addr, "metrics: endpoint up");
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => answer_scrape(stream),
                Err(e) => warn!(?e, "metrics: accept error"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_output_contains_registered_families() {
        init();
        DIGESTS.with_label_values(&["command", "empty"]).inc();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("acrylic_digests_total"));
    }

    #[test]
    fn scrape_over_tcp_returns_sized_text_reply() {
        init();
        POLL_CYCLES.inc();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            answer_scrape(stream);
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"GET /metrics HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        server.join().unwrap();

        let (head, body) = reply.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
        assert!(body.contains("poll_cycles_total"));
    }
}
