use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::sse::{Event, Sse},
    Json,
};
use log::{error, info};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::mpsc as tokio_mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    cancellable_sse::{create_cancellable_sse_stream, CancellableSseStream, StreamRegistry},
    services::{GeminiService, RelayError},
    types::{ChatRequest, StreamEvent, StreamResponse},
};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub stream_id: String,
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default().data(serde_json::to_string(event).unwrap_or_default())
}

pub async fn create_stream(
    State(gemini): State<GeminiService>,
    State(streams): State<StreamRegistry>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<StreamResponse>, RelayError> {
    let Json(request) = payload?;
    gemini.validate(&request)?;
    if gemini.config().api_key.is_none() {
        return Err(RelayError::MissingApiKey);
    }

    let stream_id = streams.register(request);
    info!("Registered SSE stream: {stream_id}");

    Ok(Json(StreamResponse { stream_id }))
}

pub async fn chat_stream(
    State(gemini): State<GeminiService>,
    State(streams): State<StreamRegistry>,
    Query(params): Query<StreamQuery>,
) -> Result<Sse<CancellableSseStream>, RelayError> {
    let stream_id = params.stream_id;
    let (request, token) = streams
        .claim(&stream_id)
        .ok_or_else(|| RelayError::StreamNotFound(stream_id.clone()))?;

    info!("Starting message stream: {stream_id}");

    Ok(create_cancellable_sse_stream(
        streams,
        stream_id,
        token,
        move |tx, token| async move { relay_events(gemini, request, tx, token).await },
    ))
}

async fn relay_events(
    gemini: GeminiService,
    request: ChatRequest,
    tx: tokio_mpsc::Sender<Result<Event, Infallible>>,
    token: CancellationToken,
) {
    let (chunk_tx, mut chunk_rx) = tokio_mpsc::channel::<String>(32);

    let forward = {
        let tx = tx.clone();
        async move {
            while let Some(content) = chunk_rx.recv().await {
                if tx
                    .send(Ok(sse_event(&StreamEvent::Content { content })))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    };

    let (result, ()) = tokio::join!(
        gemini.stream_reply(&request, chunk_tx, token.clone()),
        forward
    );

    let last = match result {
        Ok(()) if token.is_cancelled() => StreamEvent::Cancelled,
        Ok(()) => StreamEvent::Done,
        Err(e) => {
            error!("Error in SSE stream: {e}");
            StreamEvent::Error {
                content: e.to_string(),
            }
        }
    };
    tx.send(Ok(sse_event(&last))).await.ok();
}

pub async fn cancel_stream(
    State(streams): State<StreamRegistry>,
    Query(params): Query<StreamQuery>,
) -> &'static str {
    if streams.cancel(&params.stream_id) {
        info!("Cancelled stream: {}", params.stream_id);
        "Stream cancelled"
    } else {
        "Stream not found"
    }
}
