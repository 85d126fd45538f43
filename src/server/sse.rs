use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct SseParams {
    /// Only forward events for this job id. `telemetry_updated` is always
    /// forwarded.
    pub job_id: Option<String>,
}

/// Guard that logs at debug level when the SSE stream is dropped (client disconnects).
struct SseDropGuard;

impl Drop for SseDropGuard {
    fn drop(&mut self) {
        tracing::debug!("SSE client disconnected");
    }
}

pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SseParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("SSE client connected");

    let rx = state.event_tx.subscribe();
    let filter_job_id = params.job_id.filter(|id| !id.is_empty());

    let _drop_guard = SseDropGuard;

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let _ = &_drop_guard;
        match result {
            Ok(event) => {
                if let Some(ref wanted) = filter_job_id {
                    if let crate::daemon::events::TelemetryEvent::JobChanged { job_id, .. } = &event
                    {
                        if job_id != wanted {
                            return None;
                        }
                    }
                }

                match serde_json::to_string(&event) {
                    Ok(data) => Some(Ok(Event::default().event(event.name()).data(data))),
                    Err(e) => {
                        tracing::warn!("Failed to serialize SSE event: {}", e);
                        None
                    }
                }
            }
            Err(_) => Some(Ok(
                Event::default().comment("lagged: some events were missed")
            )),
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
