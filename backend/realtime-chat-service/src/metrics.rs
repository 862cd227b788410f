use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

static WS_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("chat_ws_sessions", "Live WebSocket sessions in this process")
        .expect("failed to create chat_ws_sessions");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register chat_ws_sessions");
    gauge
});

static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("chat_messages_sent_total", "Messages persisted by the core")
        .expect("failed to create chat_messages_sent_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_messages_sent_total");
    counter
});

static FANOUT_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "chat_fanout_deliveries_total",
        "Events handed to live session channels",
    )
    .expect("failed to create chat_fanout_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_fanout_deliveries_total");
    counter
});

static NOTIFICATIONS_CREATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "chat_notifications_created_total",
            "Notifications persisted, by type",
        ),
        &["type"],
    )
    .expect("failed to create chat_notifications_created_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_notifications_created_total");
    counter
});

static FRIEND_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "chat_friend_transitions_total",
            "Friend edge transitions, by transition",
        ),
        &["transition"],
    )
    .expect("failed to create chat_friend_transitions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register chat_friend_transitions_total");
    counter
});

pub fn session_opened() {
    WS_SESSIONS.inc();
}

pub fn session_closed() {
    WS_SESSIONS.dec();
}

pub fn message_sent() {
    MESSAGES_SENT_TOTAL.inc();
}

pub fn fanout_delivered(count: usize) {
    FANOUT_DELIVERIES_TOTAL.inc_by(count as u64);
}

pub fn notification_created(notification_type: &str) {
    NOTIFICATIONS_CREATED_TOTAL
        .with_label_values(&[notification_type])
        .inc();
}

/// `transition` is one of requested, accepted, declined, blocked
pub fn friend_transition(transition: &str) {
    FRIEND_TRANSITIONS_TOTAL
        .with_label_values(&[transition])
        .inc();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_registered() {
        message_sent();
        friend_transition("requested");
        notification_created("new_message");

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.contains(&"chat_messages_sent_total".to_string()));
        assert!(names.contains(&"chat_friend_transitions_total".to_string()));
        assert!(names.contains(&"chat_notifications_created_total".to_string()));
    }
}
