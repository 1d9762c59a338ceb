//! Server-sent event stream of the restart log.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::http::server::AppState;
use crate::service::RestartEvent;

/// Terminator the UI waits for.
pub const DONE_MARKER: &str = "[DONE]";

/// Replay the current run, then follow it live until it finishes or the
/// server shuts down.
pub async fn restart_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (backlog, rx) = state.restart.subscribe();
    let mut shutdown = state.shutdown.subscribe();

    let live = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Restart log viewer fell behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let events = until_done(Box::pin(stream::iter(backlog).chain(live)))
        .take_until(async move {
            let _ = shutdown.recv().await;
        })
        .map(|event| Ok(to_sse(&event)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Yield events up to and including the first `Done`, then end without
/// polling the source again.
pub fn until_done<S>(events: S) -> impl Stream<Item = RestartEvent>
where
    S: Stream<Item = RestartEvent> + Unpin,
{
    stream::unfold((events, false), |(mut events, finished)| async move {
        if finished {
            return None;
        }
        let event = events.next().await?;
        let finished = event.is_done();
        Some((event, (events, finished)))
    })
}

fn to_sse(event: &RestartEvent) -> Event {
    match event {
        RestartEvent::Line { text } => Event::default().data(text),
        RestartEvent::Done { .. } => Event::default().data(DONE_MARKER),
    }
}
