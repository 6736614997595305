use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::stream;
use log::error;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    services::{GeminiService, RelayError},
    types::ChatRequest,
};

/// Plain passthrough: the reply text is streamed back as the response body.
pub async fn chat_handler(
    State(gemini): State<GeminiService>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(request) = payload?;
    let upstream = gemini.open_stream(&request).await?;

    let (tx, rx) = mpsc::channel::<String>(32);
    tokio::spawn(async move {
        if let Err(e) = gemini.relay(upstream, tx, CancellationToken::new()).await {
            error!("relay failed mid-stream: {e}");
        }
    });

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(Bytes::from(chunk)), rx))
    }));

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response())
}
