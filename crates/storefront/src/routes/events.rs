//! Server-sent cart events.

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument};

use iwishbag_cart::CartEvent;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// GET /api/cart/events
///
/// Streams the caller's [`CartEvent`]s as JSON, one SSE message per event,
/// with the event kind as the SSE event name. Lagging clients get a `lagged`
/// message with the number of skipped events.
#[instrument(skip(state))]
pub async fn stream_events(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let cart = state.carts().store_for(user_id).await?;
    let mut events = cart.events();

    let sse_stream = stream! {
        loop {
            match events.recv().await {
                Ok(event) => yield Ok(to_sse(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    yield Ok(Event::default().event("lagged").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(%user_id, "cart event stream closed");
    };

    Ok(Sse::new(sse_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

fn to_sse(event: &CartEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_else(|_| {
        r#"{"type":"error","message":"Failed to serialize event"}"#.to_string()
    });
    Event::default().event(event.name()).data(json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use iwishbag_core::QuoteId;

    /// Render events the way a client receives them.
    async fn render(events: Vec<CartEvent>) -> String {
        let frames: Vec<std::result::Result<Event, Infallible>> =
            events.iter().map(|event| Ok(to_sse(event))).collect();
        let response = Sse::new(futures::stream::iter(frames)).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_event_name_and_json_payload() {
        let quote_id = QuoteId::generate();

        let text = render(vec![CartEvent::ItemAdded { quote_id }]).await;

        assert_eq!(
            text,
            format!("event: item_added\ndata: {{\"type\":\"item_added\",\"quote_id\":\"{quote_id}\"}}\n\n")
        );
    }

    #[tokio::test]
    async fn test_every_kind_is_named() {
        let text = render(vec![
            CartEvent::SyncStarted,
            CartEvent::SyncCompleted { version: 3 },
            CartEvent::CartCleared { removed: 2 },
            CartEvent::ConflictDetected {
                local_version: None,
                remote_version: 1,
            },
        ])
        .await;

        assert!(text.contains("event: sync_started\ndata: {\"type\":\"sync_started\"}\n"));
        assert!(text.contains("event: sync_completed\ndata: {\"type\":\"sync_completed\",\"version\":3}\n"));
        assert!(text.contains("event: cart_cleared\ndata: {\"type\":\"cart_cleared\",\"removed\":2}\n"));
        assert!(text.contains(
            "event: conflict_detected\ndata: {\"type\":\"conflict_detected\",\"local_version\":null,\"remote_version\":1}\n"
        ));
    }
}
