//! Server-Sent Events (SSE) utilities
//!
//! Bridges a survey-handle subscription on the notification hub to an SSE
//! response stream for connected clients.

use crate::events::NotificationHub;
use axum::response::sse::{Event, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Create an SSE stream of the events published to one survey handle
pub fn survey_event_stream(
    hub: &NotificationHub,
    survey_handle: &str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected to survey {}", survey_handle);

    let rx = hub.subscribe(survey_handle);

    // Convert broadcast receiver to stream
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    debug!("Broadcasting SSE event: {}", event.type_str());
                    Some(Ok(Event::default().event(event.type_str()).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // BroadcastStream error (lagged or closed)
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
