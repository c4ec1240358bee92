use std::convert::Infallible;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use axum::{
    extract::Extension,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use storefront_events::Event;
use storefront_infra::StateEnvelope;

use crate::app::services::AppServices;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /stream
///
/// Purchase state changes as Server-Sent Events, one `state` event per
/// transition, in the order the store applied them.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<UnboundedReceiverStream<Result<SseEvent, Infallible>>> {
    let (tx, rx) = unbounded_channel::<Result<SseEvent, Infallible>>();

    // Subscribe before returning so no transition after this request is missed.
    let subscription = services.store().subscribe();

    tokio::task::spawn_blocking(move || {
        let mut last_heartbeat = Instant::now();

        loop {
            match subscription.recv_timeout(Duration::from_millis(1000)) {
                Ok(envelope) => {
                    let Some(data) = state_change_json(&envelope) else {
                        continue;
                    };
                    let event = SseEvent::default().event("state").data(data);
                    if tx.send(Ok(event)).is_err() {
                        break;
                    }
                    last_heartbeat = Instant::now();
                }
                Err(RecvTimeoutError::Timeout) => {
                    if tx.is_closed() {
                        break;
                    }
                    if last_heartbeat.elapsed() > HEARTBEAT_INTERVAL {
                        let heartbeat = SseEvent::default().event("heartbeat").data("{}");
                        if tx.send(Ok(heartbeat)).is_err() {
                            break;
                        }
                        last_heartbeat = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("state stream closed");
    });

    Sse::new(UnboundedReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL))
}

fn state_change_json(envelope: &StateEnvelope) -> Option<String> {
    let payload = envelope.payload();
    serde_json::to_string(&serde_json::json!({
        "event_id": envelope.event_id().to_string(),
        "event_type": payload.event_type(),
        "product_id": envelope.product_id(),
        "sequence_number": envelope.sequence_number(),
        "previous": payload.previous(),
        "state": payload.state(),
        "occurred_at": payload.occurred_at().to_rfc3339(),
    }))
    .ok()
}
