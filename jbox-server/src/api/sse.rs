//! Server-Sent Events stream
//!
//! A new observer first receives the current queue snapshot, then every
//! broadcast event.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::api::server::AppContext;
use crate::events::JukeboxEvent;

/// GET /events - SSE event stream
pub async fn event_stream(State(ctx): State<AppContext>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before taking the snapshot so nothing falls in between
    let mut rx = ctx.state.subscribe_events();
    let initial = JukeboxEvent::queue_updated(ctx.state.queue_snapshot().await);
    info!("New SSE client connected, total clients: {}", ctx.state.event_tx.receiver_count());

    let stream = async_stream::stream! {
        if let Some(event) = to_sse(&initial) {
            yield Ok(event);
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(sse) = to_sse(&event) {
                        debug!("Broadcasting SSE event: {}", event.event_type());
                        yield Ok(sse);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse(event: &JukeboxEvent) -> Option<Event> {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
