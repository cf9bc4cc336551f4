use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

static LIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "live_chat_connections",
        "Connections currently registered in the connection registry",
    )
    .expect("failed to create live_chat_connections");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register live_chat_connections");
    gauge
});

static HANDSHAKES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "live_chat_handshakes_total",
            "WebSocket handshakes by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create live_chat_handshakes_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_chat_handshakes_total");
    counter
});

static MESSAGES_PERSISTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_chat_messages_persisted_total",
        "Chat messages written to the message store",
    )
    .expect("failed to create live_chat_messages_persisted_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_chat_messages_persisted_total");
    counter
});

static PERSISTENCE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_chat_persistence_failures_total",
        "Chat messages the message store failed to write",
    )
    .expect("failed to create live_chat_persistence_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_chat_persistence_failures_total");
    counter
});

static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "live_chat_deliveries_total",
            "Message delivery attempts by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create live_chat_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_chat_deliveries_total");
    counter
});

static PRESENCE_PUSHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_chat_presence_pushes_total",
        "Presence lists pushed to live connections",
    )
    .expect("failed to create live_chat_presence_pushes_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_chat_presence_pushes_total");
    counter
});

pub fn set_live_connections(count: usize) {
    LIVE_CONNECTIONS.set(count as i64);
}

pub fn record_handshake(outcome: &str) {
    HANDSHAKES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_persisted() {
    MESSAGES_PERSISTED_TOTAL.inc();
}

pub fn record_persistence_failure() {
    PERSISTENCE_FAILURES_TOTAL.inc();
}

pub fn record_delivery(outcome: &str) {
    DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_presence_push() {
    PRESENCE_PUSHES_TOTAL.inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
