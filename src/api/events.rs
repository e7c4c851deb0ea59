//! Client event feed
//!
//! Forwards hub events to clients via Server-Sent Events (SSE).

use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
};
use futures::stream::Stream;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::AppState;

/// GET /api/events
/// Stream reconciliation and dashboard events as they happen
async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.hub.subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(|event| match event {
        Ok(event) => {
            let name = event.name();
            match serde_json::to_string(&event) {
                Ok(data) => Some(Ok(SseEvent::default().event(name).data(data))),
                Err(error) => {
                    tracing::error!(event = name, error = %error, "Failed to encode event");
                    None
                }
            }
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            // Slow consumer: drop what it missed and keep going
            tracing::warn!(skipped, "Event subscriber lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn events_router() -> Router<AppState> {
    Router::new().route("/api/events", get(stream_events))
}
