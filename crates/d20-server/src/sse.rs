//! Server-sent events stream.
//!
//! Each `GET /events` connection becomes one [`Observer`]. The observer task
//! forwards hub events into a small channel that backs the response body. The
//! response stream owns a drop guard on the observer's cancellation token, so
//! when the client goes away and axum drops the body, the observer is
//! cancelled and unregisters.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use d20_core::{Environment, Observer, TableEvent};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;

use crate::{auth::Authenticated, state::AppState};

/// Events buffered between the observer task and the response body.
const STREAM_BUFFER: usize = 1;

/// `GET /events`: live `ROLL` and `STATS` snapshots.
pub async fn events<E: Environment>(
    State(state): State<AppState<E>>,
    Authenticated(participant): Authenticated,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let observer = Observer::connect(&state.hub);
    let id = observer.id();
    tracing::debug!(%id, name = %participant.name, "event stream opened");

    let cancel = CancellationToken::new();
    let (sink, receiver) = mpsc::channel::<Arc<TableEvent>>(STREAM_BUFFER);

    let token = cancel.clone();
    tokio::spawn(async move {
        let exit = observer.run(sink, token).await;
        tracing::debug!(%id, ?exit, "event stream closed");
    });

    let guard = cancel.drop_guard();
    let stream = ReceiverStream::new(receiver).map(move |event| {
        let _held = &guard;
        Ok(Event::default().event(event.kind.as_str()).data(event.data.as_str()))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
