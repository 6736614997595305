//! Browser side of the relay: `fetch` for the control calls, `EventSource` for the reply.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::warn;
use std::{cell::RefCell, rc::Rc};
use thiserror::Error;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{EventSource, File, Headers, MessageEvent, Request, RequestInit, Response};

use crate::models::stream_slot::CloseHandle;
use crate::types::{ChatRequest, ErrorBody, ImageAttachment, StreamEvent, StreamResponse};

/// Mirrors the relay's default limit so oversized files fail before upload.
pub const MAX_IMAGE_BYTES: f64 = 20.0 * 1024.0 * 1024.0;

#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("browser error: {0}")]
    Browser(String),
    #[error("{0}")]
    Server(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("{0}")]
    InvalidFile(String),
}

impl From<JsValue> for ClientError {
    fn from(value: JsValue) -> Self {
        ClientError::Browser(format!("{value:?}"))
    }
}

pub enum StreamUpdate {
    Event(StreamEvent),
    Disconnected,
}

fn window() -> Result<web_sys::Window, ClientError> {
    web_sys::window().ok_or_else(|| ClientError::Browser("no window".into()))
}

async fn fetch(request: &Request) -> Result<Response, ClientError> {
    let value = JsFuture::from(window()?.fetch_with_request(request)).await?;
    Ok(value.dyn_into::<Response>()?)
}

async fn error_from(response: Response) -> ClientError {
    let status = response.status();
    let text = match response.text() {
        Ok(promise) => JsFuture::from(promise)
            .await
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    };
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ClientError::Server(body.details),
        Err(_) => ClientError::Server(format!("Failed to connect to the chatbot service ({status}).")),
    }
}

pub async fn create_stream(request: &ChatRequest) -> Result<String, ClientError> {
    let body = serde_json::to_string(request).map_err(|e| ClientError::Decode(e.to_string()))?;

    let headers = Headers::new()?;
    headers.set("Content-Type", "application/json")?;
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(&headers);
    init.set_body(&JsValue::from_str(&body));

    let request = Request::new_with_str_and_init("/api/create-stream", &init)?;
    let response = fetch(&request).await?;
    if !response.ok() {
        return Err(error_from(response).await);
    }

    let json = JsFuture::from(response.json()?).await?;
    let created: StreamResponse =
        serde_wasm_bindgen::from_value(json).map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(created.stream_id)
}

pub async fn cancel_stream(stream_id: &str) -> Result<(), ClientError> {
    let url = format!("/api/cancel-stream?stream_id={}", urlencoding::encode(stream_id));
    let request = Request::new_with_str(&url)?;
    let response = fetch(&request).await?;
    if !response.ok() {
        return Err(error_from(response).await);
    }
    Ok(())
}

impl CloseHandle for EventSource {
    fn close(&self) {
        EventSource::close(self);
    }
}

/// Opens the SSE reply stream. `handler` returns false once it wants no more updates.
pub fn open_event_stream<F>(stream_id: &str, handler: F) -> Result<EventSource, ClientError>
where
    F: FnMut(StreamUpdate) -> bool + 'static,
{
    let url = format!("/api/chat-stream?stream_id={}", urlencoding::encode(stream_id));
    let event_source = EventSource::new(&url)?;
    let handler = Rc::new(RefCell::new(handler));

    let on_message = {
        let event_source = event_source.clone();
        let handler = Rc::clone(&handler);
        Closure::wrap(Box::new(move |event: MessageEvent| {
            let Some(data) = event.data().as_string() else {
                return;
            };
            match serde_json::from_str::<StreamEvent>(&data) {
                Ok(stream_event) => {
                    let keep_open = (&mut *handler.borrow_mut())(StreamUpdate::Event(stream_event));
                    if !keep_open {
                        event_source.close();
                    }
                }
                Err(e) => warn!("ignoring malformed stream event: {e}"),
            }
        }) as Box<dyn FnMut(_)>)
    };

    let on_error = {
        let event_source = event_source.clone();
        let handler = Rc::clone(&handler);
        Closure::wrap(Box::new(move |_: web_sys::Event| {
            // EventSource would reconnect and replay the request otherwise
            event_source.close();
            (&mut *handler.borrow_mut())(StreamUpdate::Disconnected);
        }) as Box<dyn FnMut(_)>)
    };

    event_source.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    event_source.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    on_message.forget();
    on_error.forget();
    Ok(event_source)
}

pub async fn read_image(file: File) -> Result<ImageAttachment, ClientError> {
    let mime_type = file.type_();
    if !mime_type.starts_with("image/") {
        return Err(ClientError::InvalidFile(format!("{} is not an image", file.name())));
    }
    if file.size() > MAX_IMAGE_BYTES {
        return Err(ClientError::InvalidFile(format!(
            "{} is larger than 20 MB",
            file.name()
        )));
    }

    let buffer = JsFuture::from(file.array_buffer()).await?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    Ok(ImageAttachment {
        base64: STANDARD.encode(bytes),
        mime_type,
    })
}
