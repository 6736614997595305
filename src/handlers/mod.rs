pub mod chat;
pub mod sse;

pub use chat::*;
pub use sse::*;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{cancellable_sse::StreamRegistry, middleware::trace_requests, services::GeminiService};

/// Every relay endpoint, for any state that can hand out the relay services.
pub fn api_router<S>(max_body_bytes: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    GeminiService: FromRef<S>,
    StreamRegistry: FromRef<S>,
{
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/create-stream", post(create_stream))
        .route("/api/chat-stream", get(chat_stream))
        .route("/api/cancel-stream", get(cancel_stream).post(cancel_stream))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(trace_requests))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::types::{ChatRequest, ErrorBody, Message, StreamResponse};
    use axum::{
        body::{to_bytes, Body},
        http::{header, HeaderMap, Request, StatusCode},
        response::{IntoResponse, Response},
    };
    use futures::StreamExt;
    use std::time::Duration;
    use tower::ServiceExt;

    const HELLO_STREAM: &str = concat!(
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hello\"}]}}]}\r\n\r\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\", world\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
    );

    const FIRST_CHUNK: &str =
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hello\"}]}}]}\r\n\r\n";

    #[derive(Clone, FromRef)]
    struct TestState {
        gemini: GeminiService,
        streams: StreamRegistry,
    }

    /// Serves `body` for any model call that carries the expected key.
    async fn mock_upstream(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/v1beta/models/{action}",
            post(move |headers: HeaderMap| async move {
                if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
                    return (StatusCode::UNAUTHORIZED, "missing key").into_response();
                }
                (status, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1beta")
    }

    /// Sends one chunk, then keeps the connection open without ever finishing.
    async fn stalling_upstream() -> String {
        let app = Router::new().route(
            "/v1beta/models/{action}",
            post(|| async {
                let first = futures::stream::once(async {
                    Ok::<_, std::io::Error>(FIRST_CHUNK)
                });
                let body = Body::from_stream(first.chain(futures::stream::pending()));
                ([(header::CONTENT_TYPE, "text/event-stream")], body)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1beta")
    }

    fn app_with(api_base: String, api_key: Option<&str>, max_body_bytes: usize) -> (Router, StreamRegistry) {
        let config = RelayConfig {
            api_key: api_key.map(str::to_string),
            api_base,
            ..RelayConfig::default()
        };
        let streams = StreamRegistry::new(Duration::from_secs(60));
        let state = TestState {
            gemini: GeminiService::new(config),
            streams: streams.clone(),
        };
        (api_router(max_body_bytes).with_state(state), streams)
    }

    fn app(api_base: String) -> (Router, StreamRegistry) {
        app_with(api_base, Some("test-key"), 1024 * 1024)
    }

    fn post_json(uri: &str, body: &ChatRequest) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    fn question() -> ChatRequest {
        ChatRequest {
            history: vec![Message::user("say hello")],
            image: None,
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn error_body(response: Response) -> ErrorBody {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_plain_relay_streams_text() {
        let (app, _) = app(mock_upstream(StatusCode::OK, HELLO_STREAM).await);

        let response = app.oneshot(post_json("/api/chat", &question())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(body_text(response).await, "Hello, world");
    }

    #[tokio::test]
    async fn test_plain_relay_rejects_bot_last_message() {
        let (app, _) = app("http://127.0.0.1:9/v1beta".into());
        let request = ChatRequest {
            history: vec![Message::user("q"), Message::bot("a")],
            image: None,
        };

        let response = app.oneshot(post_json("/api/chat", &request)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert_eq!(body.error, "Something went wrong on the server.");
        assert_eq!(body.details, "Last message in history must be from the user.");
    }

    #[tokio::test]
    async fn test_plain_relay_without_api_key() {
        let (app, _) = app_with("http://127.0.0.1:9/v1beta".into(), None, 1024);

        let response = app.oneshot(post_json("/api/chat", &question())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_body(response).await.details.contains("API_KEY"));
    }

    #[tokio::test]
    async fn test_plain_relay_reports_upstream_failure() {
        let upstream = mock_upstream(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"API key not valid"}}"#,
        )
        .await;
        let (app, _) = app(upstream);

        let response = app.oneshot(post_json("/api/chat", &question())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_body(response).await.details.contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_chat_only_accepts_post() {
        let (app, _) = app("http://127.0.0.1:9/v1beta".into());
        let request = Request::builder().uri("/api/chat").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    fn raw_post(uri: &str, content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let cases = [
            (Some("application/json"), "{\"history\": 5}"),
            (Some("application/json"), r#"{"history":[{"id":"1","text":"hi"}]}"#),
            (Some("application/json"), "{\"history\": ["),
            (None, r#"{"history":[]}"#),
        ];

        for (content_type, body) in cases {
            let (app, _) = app("http://127.0.0.1:9/v1beta".into());
            let response = app
                .oneshot(raw_post("/api/chat", content_type, body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(error_body(response).await.error, "Something went wrong on the server.");
        }
    }

    #[tokio::test]
    async fn test_create_stream_rejects_untyped_body_with_bad_request() {
        let (app, streams) = app("http://127.0.0.1:9/v1beta".into());

        let response = app
            .oneshot(raw_post("/api/create-stream", Some("application/json"), r#"{"history":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let (app, _) = app_with("http://127.0.0.1:9/v1beta".into(), Some("test-key"), 64);
        let payload = serde_json::to_string(&ChatRequest {
            history: vec![Message::user("x".repeat(500))],
            image: None,
        })
        .unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, payload.len())
            .body(Body::from(payload))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_sse_relay_round_trip() {
        let (app, streams) = app(mock_upstream(StatusCode::OK, HELLO_STREAM).await);

        let response = app
            .clone()
            .oneshot(post_json("/api/create-stream", &question()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created: StreamResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(streams.len(), 1);

        let request = Request::builder()
            .uri(format!("/api/chat-stream?stream_id={}", created.stream_id))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let body = body_text(response).await;
        let hello = body.find(r#"{"type":"content","content":"Hello"}"#).unwrap();
        let world = body.find(r#"{"type":"content","content":", world"}"#).unwrap();
        let done = body.find(r#"{"type":"done"}"#).unwrap();
        assert!(hello < world && world < done);
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_sse_relay_reports_upstream_error_as_event() {
        let upstream = mock_upstream(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"quota exceeded"}}"#,
        )
        .await;
        let (app, _) = app(upstream);

        let response = app
            .clone()
            .oneshot(post_json("/api/create-stream", &question()))
            .await
            .unwrap();
        let created: StreamResponse = serde_json::from_str(&body_text(response).await).unwrap();

        let request = Request::builder()
            .uri(format!("/api/chat-stream?stream_id={}", created.stream_id))
            .body(Body::empty())
            .unwrap();
        let body = body_text(app.oneshot(request).await.unwrap()).await;

        assert!(body.contains(r#""type":"error""#));
        assert!(body.contains("quota exceeded"));
        assert!(!body.contains(r#"{"type":"done"}"#));
    }

    #[tokio::test]
    async fn test_unknown_stream_is_not_found() {
        let (app, _) = app("http://127.0.0.1:9/v1beta".into());
        let request = Request::builder()
            .uri("/api/chat-stream?stream_id=nope")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancelled_stream_cannot_be_opened() {
        let (app, streams) = app("http://127.0.0.1:9/v1beta".into());
        let stream_id = streams.register(question());

        let request = Request::builder()
            .uri(format!("/api/cancel-stream?stream_id={stream_id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await, "Stream cancelled");

        let request = Request::builder()
            .uri(format!("/api/chat-stream?stream_id={stream_id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn open_sse(app: &Router, streams: &StreamRegistry) -> (String, axum::body::BodyDataStream) {
        let stream_id = streams.register(question());
        let request = Request::builder()
            .uri(format!("/api/chat-stream?stream_id={stream_id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        (stream_id, response.into_body().into_data_stream())
    }

    /// Reads SSE frames until `needle` shows up, returning everything read.
    async fn read_until(body: &mut axum::body::BodyDataStream, needle: &str) -> String {
        let mut received = String::new();
        while !received.contains(needle) {
            let chunk = body.next().await.expect("stream ended early").unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        received
    }

    #[tokio::test]
    async fn test_cancel_ends_running_stream() {
        let (app, streams) = app(stalling_upstream().await);

        tokio::time::timeout(Duration::from_secs(10), async {
            let (stream_id, mut body) = open_sse(&app, &streams).await;
            read_until(&mut body, r#"{"type":"content","content":"Hello"}"#).await;

            let request = Request::builder()
                .uri(format!("/api/cancel-stream?stream_id={stream_id}"))
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(body_text(response).await, "Stream cancelled");

            let mut rest = String::new();
            while let Some(chunk) = body.next().await {
                rest.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            }
            assert!(rest.trim_end().ends_with(r#"data: {"type":"cancelled"}"#), "got: {rest}");
            assert!(!rest.contains(r#"{"type":"done"}"#));
            assert!(streams.is_empty());
        })
        .await
        .expect("cancelled stream never finished");
    }

    #[tokio::test]
    async fn test_dropping_event_stream_stops_relay() {
        let (app, streams) = app(stalling_upstream().await);

        tokio::time::timeout(Duration::from_secs(10), async {
            let (_, mut body) = open_sse(&app, &streams).await;
            read_until(&mut body, r#""content":"Hello""#).await;
            assert_eq!(streams.len(), 1);

            drop(body);
            while !streams.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("relay kept running after the browser went away");
    }

    #[tokio::test]
    async fn test_create_stream_validates_before_registering() {
        let (app, streams) = app("http://127.0.0.1:9/v1beta".into());
        let request = ChatRequest {
            history: vec![],
            image: None,
        };

        let response = app.oneshot(post_json("/api/create-stream", &request)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(streams.is_empty());
    }
}
