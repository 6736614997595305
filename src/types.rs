use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Complete,
    Streaming,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    #[serde(default)]
    pub status: MessageStatus,
    /// MIME type of the image the user attached, if any. The bytes are not kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender: Sender::User,
            status: MessageStatus::Complete,
            image_mime: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender: Sender::Bot,
            status: MessageStatus::Complete,
            image_mime: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub base64: String,
    pub mime_type: String,
}

impl ImageAttachment {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamResponse {
    pub stream_id: String,
}

/// Payload of each SSE event sent from the relay to the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Content { content: String },
    Error { content: String },
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_wire_format() {
        let message = Message::user("hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["sender"], "USER");
        assert_eq!(json["status"], "complete");
        assert!(json.get("image_mime").is_none());
    }

    #[test]
    fn test_message_without_status_defaults_to_complete() {
        let raw = r#"{"id":"1","text":"hello","sender":"BOT"}"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(message.sender, Sender::Bot);
        assert_eq!(message.status, MessageStatus::Complete);
    }

    #[test]
    fn test_chat_request_image_is_camel_case() {
        let raw = r#"{
            "history": [{"id":"1","text":"what is wrong here?","sender":"USER"}],
            "image": {"base64":"aGk=","mimeType":"image/png"}
        }"#;
        let request: ChatRequest = serde_json::from_str(raw).unwrap();
        let image = request.image.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.base64, "aGk=");
    }

    #[test]
    fn test_stream_event_tags() {
        let content = StreamEvent::Content { content: "fn main".into() };
        assert_eq!(
            serde_json::to_string(&content).unwrap(),
            r#"{"type":"content","content":"fn main"}"#
        );
        assert_eq!(serde_json::to_string(&StreamEvent::Done).unwrap(), r#"{"type":"done"}"#);
        let parsed: StreamEvent = serde_json::from_str(r#"{"type":"cancelled"}"#).unwrap();
        assert_eq!(parsed, StreamEvent::Cancelled);
    }

    #[test]
    fn test_image_data_url() {
        let image = ImageAttachment {
            base64: "/9j/4AAQ".into(),
            mime_type: "image/jpeg".into(),
        };
        assert_eq!(image.data_url(), "data:image/jpeg;base64,/9j/4AAQ");
    }
}
