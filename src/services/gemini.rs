use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::RelayConfig;
use crate::services::error::RelayError;
use crate::types::{ChatRequest, ImageAttachment, Message, Sender};

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: u16,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamPayload {
    Failure { error: ApiError },
    Chunk(GenerateContentChunk),
}

#[derive(Debug, Deserialize)]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

fn role_for(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "user",
        Sender::Bot => "model",
    }
}

pub fn validate_request(request: &ChatRequest, max_image_bytes: usize) -> Result<(), RelayError> {
    let last = request
        .history
        .last()
        .ok_or_else(|| RelayError::InvalidRequest("history must not be empty".into()))?;

    if last.sender != Sender::User {
        return Err(RelayError::InvalidRequest(
            "Last message in history must be from the user.".into(),
        ));
    }
    if last.text.trim().is_empty() {
        return Err(RelayError::InvalidRequest("message text must not be empty".into()));
    }
    if let Some(image) = &request.image {
        validate_image(image, max_image_bytes)?;
    }
    Ok(())
}

fn validate_image(image: &ImageAttachment, max_bytes: usize) -> Result<(), RelayError> {
    if !image.mime_type.starts_with("image/") {
        return Err(RelayError::InvalidImage(format!(
            "unsupported type {}",
            image.mime_type
        )));
    }
    let decoded = STANDARD
        .decode(image.base64.as_bytes())
        .map_err(|e| RelayError::InvalidImage(e.to_string()))?;
    if decoded.is_empty() {
        return Err(RelayError::InvalidImage("image is empty".into()));
    }
    if decoded.len() > max_bytes {
        return Err(RelayError::InvalidImage(format!(
            "image is {} bytes, limit is {max_bytes}",
            decoded.len()
        )));
    }
    Ok(())
}

fn history_content(message: &Message) -> Content {
    Content {
        role: Some(role_for(message.sender)),
        parts: vec![Part::Text {
            text: message.text.clone(),
        }],
    }
}

/// Pulls the text out of one `data:` payload of the upstream stream.
pub fn extract_text(payload: &str) -> Result<String, RelayError> {
    let parsed: StreamPayload =
        serde_json::from_str(payload).map_err(|e| RelayError::Decode(e.to_string()))?;

    match parsed {
        StreamPayload::Failure { error } => Err(RelayError::Upstream {
            status: error.code,
            message: error.message,
        }),
        StreamPayload::Chunk(chunk) => Ok(chunk
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default()),
    }
}

fn upstream_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ApiError,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Re-assembles server-sent events from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseLineDecoder {
    /// Feeds bytes in, returns the data of every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes whatever is left once the upstream body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            let line = line.trim_end_matches('\r');
            if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

#[derive(Clone)]
pub struct GeminiService {
    client: Client,
    config: Arc<RelayConfig>,
}

impl GeminiService {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn validate(&self, request: &ChatRequest) -> Result<(), RelayError> {
        validate_request(request, self.config.max_image_bytes)
    }

    pub fn build_request(&self, request: &ChatRequest) -> Result<GenerateContentRequest, RelayError> {
        self.validate(request)?;
        let (prompt, earlier) = request
            .history
            .split_last()
            .ok_or_else(|| RelayError::InvalidRequest("history must not be empty".into()))?;

        let mut contents: Vec<Content> = earlier
            .iter()
            .filter(|m| !m.text.trim().is_empty())
            .map(history_content)
            .collect();

        let mut prompt_content = history_content(prompt);
        if let Some(image) = &request.image {
            prompt_content.parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.base64.clone(),
                },
            });
        }
        contents.push(prompt_content);

        Ok(GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: self.config.system_instruction.clone(),
                }],
            },
            contents,
        })
    }

    fn endpoint(&self) -> Result<Url, RelayError> {
        let mut url = Url::parse(&format!(
            "{}/models/{}:streamGenerateContent",
            self.config.api_base, self.config.model
        ))?;
        url.query_pairs_mut().append_pair("alt", "sse");
        Ok(url)
    }

    /// Sends the request upstream; any failure before the first byte surfaces here.
    pub async fn open_stream(&self, request: &ChatRequest) -> Result<reqwest::Response, RelayError> {
        let body = self.build_request(request)?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(RelayError::MissingApiKey)?;

        info!(
            "relaying {} messages to {} (image: {})",
            body.contents.len(),
            self.config.model,
            request.image.is_some()
        );

        let response = self
            .client
            .post(self.endpoint()?)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message: upstream_error_message(&text),
            });
        }
        Ok(response)
    }

    /// Forwards text fragments from an open upstream response into `tx`.
    ///
    /// Returns early without error when `cancel` fires or the receiver goes away.
    pub async fn relay(
        &self,
        response: reqwest::Response,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), RelayError> {
        let mut stream = response.bytes_stream();
        let mut decoder = SseLineDecoder::default();

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("relay cancelled");
                    return Ok(());
                }
                item = stream.next() => item,
            };
            let Some(item) = item else { break };
            let bytes = item?;

            for payload in decoder.push(&bytes) {
                if !forward(&tx, &payload).await? {
                    debug!("receiver dropped, stopping relay");
                    return Ok(());
                }
            }
        }

        if let Some(payload) = decoder.finish() {
            forward(&tx, &payload).await?;
        }
        debug!("upstream stream closed");
        Ok(())
    }

    pub async fn stream_reply(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), RelayError> {
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                info!("relay cancelled before upstream answered");
                return Ok(());
            }
            response = self.open_stream(request) => response?,
        };
        self.relay(response, tx, cancel).await
    }
}

async fn forward(tx: &mpsc::Sender<String>, payload: &str) -> Result<bool, RelayError> {
    let text = extract_text(payload)?;
    if text.is_empty() {
        return Ok(true);
    }
    Ok(tx.send(text).await.is_ok())
}
