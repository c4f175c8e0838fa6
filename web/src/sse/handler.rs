use crate::AppState;
use async_stream::stream;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use log::*;
use std::convert::Infallible;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// SSE handler that attaches one downstream client to the relay.
/// Every relayed record arrives as a single `data: <json>` frame, and a
/// `: ping` comment goes out on a fixed keep-alive interval regardless of traffic.
pub(crate) async fn sse_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let mut subscription = app_state.relay.subscribe();
    debug!("Establishing SSE connection {}", subscription.id().as_str());

    let period = app_state.config.keep_alive();
    let mut keep_alive = interval_at(Instant::now() + period, period);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Dropping the stream drops the subscription and the timer, which unregisters the client
    let stream = stream! {
        loop {
            let event = tokio::select! {
                payload = subscription.recv() => match payload {
                    Some(payload) => Event::default().data(&*payload),
                    None => break,
                },
                _ = keep_alive.tick() => Event::default().comment("ping"),
            };
            yield Ok::<_, Infallible>(event);
        }
    };

    (
        [
            (CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (CACHE_CONTROL, "no-cache, no-transform"),
            (CONNECTION, "keep-alive"),
        ],
        Sse::new(stream),
    )
}
