use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Message, MessageStatus};

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";
pub const EMPTY_REPLY_NOTICE: &str = "The model returned an empty response.";
pub const INTERRUPTED_NOTICE: &str = "This reply was interrupted before it finished.";
const TITLE_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// What the sidebar needs to list a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
}

/// Every chat the browser knows about, newest first.
///
/// All mutation goes through the methods below so that the store always holds
/// at least one session and `active_id` always names one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active_id: String,
}

impl Default for SessionStore {
    fn default() -> Self {
        let session = Session::new();
        Self {
            active_id: session.id.clone(),
            sessions: vec![session],
        }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                title: s.title.clone(),
            })
            .collect()
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> &Session {
        self.sessions
            .iter()
            .find(|s| s.id == self.active_id)
            .unwrap_or(&self.sessions[0])
    }

    pub fn active_messages(&self) -> &[Message] {
        &self.active().messages
    }

    fn active_mut(&mut self) -> &mut Session {
        let idx = self
            .sessions
            .iter()
            .position(|s| s.id == self.active_id)
            .unwrap_or(0);
        &mut self.sessions[idx]
    }

    pub fn create_session(&mut self) -> String {
        if self.active().is_empty() {
            return self.active_id.clone();
        }
        let session = Session::new();
        let id = session.id.clone();
        self.sessions.insert(0, session);
        self.active_id = id.clone();
        id
    }

    pub fn switch_to(&mut self, id: &str) -> bool {
        if self.sessions.iter().any(|s| s.id == id) {
            self.active_id = id.to_string();
            true
        } else {
            false
        }
    }

    pub fn delete_session(&mut self, id: &str) -> bool {
        let Some(idx) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };
        self.sessions.remove(idx);

        if self.sessions.is_empty() {
            self.sessions.push(Session::new());
        }
        if self.active_id == id {
            self.active_id = self.sessions[0].id.clone();
        }
        true
    }

    pub fn append_user_message(&mut self, text: &str, image_mime: Option<String>) -> Message {
        let mut message = Message::user(text);
        message.image_mime = image_mime;

        let session = self.active_mut();
        if !session.messages.iter().any(Message::is_user) {
            session.title = derive_title(text);
        }
        session.messages.push(message.clone());
        session.touch();
        message
    }

    /// Appends an empty bot message that streamed chunks will fill in.
    pub fn push_placeholder(&mut self) -> String {
        let mut placeholder = Message::bot("");
        placeholder.status = MessageStatus::Streaming;
        let id = placeholder.id.clone();

        let session = self.active_mut();
        session.messages.push(placeholder);
        session.touch();
        id
    }

    /// Returns false when the message no longer exists, e.g. its session was deleted.
    pub fn append_chunk(&mut self, message_id: &str, chunk: &str) -> bool {
        match self.find_message_mut(message_id) {
            Some(message) => {
                message.text.push_str(chunk);
                true
            }
            None => false,
        }
    }

    pub fn finish_message(&mut self, message_id: &str) {
        if let Some(message) = self.find_message_mut(message_id) {
            if message.status != MessageStatus::Streaming {
                return;
            }
            if message.text.trim().is_empty() {
                message.text = EMPTY_REPLY_NOTICE.to_string();
                message.status = MessageStatus::Error;
            } else {
                message.status = MessageStatus::Complete;
            }
        }
    }

    pub fn fail_message(&mut self, message_id: &str, reason: &str) {
        if let Some(message) = self.find_message_mut(message_id) {
            message.text = format!("Sorry, something went wrong: {reason}");
            message.status = MessageStatus::Error;
        }
    }

    /// Stops a placeholder at whatever it holds. An empty one is dropped.
    pub fn cancel_message(&mut self, message_id: &str) {
        for session in &mut self.sessions {
            let Some(idx) = session.messages.iter().position(|m| m.id == message_id) else {
                continue;
            };
            let message = &mut session.messages[idx];
            if message.status != MessageStatus::Streaming {
                return;
            }
            if message.text.is_empty() {
                session.messages.remove(idx);
            } else {
                message.status = MessageStatus::Complete;
            }
            session.touch();
            return;
        }
    }

    pub fn has_message(&self, message_id: &str) -> bool {
        self.sessions
            .iter()
            .any(|s| s.messages.iter().any(|m| m.id == message_id))
    }

    pub fn is_streaming(&self) -> bool {
        self.sessions
            .iter()
            .flat_map(|s| s.messages.iter())
            .any(|m| m.status == MessageStatus::Streaming)
    }

    /// Messages of the active session worth sending upstream.
    pub fn request_history(&self) -> Vec<Message> {
        self.active_messages()
            .iter()
            .filter(|m| m.status == MessageStatus::Complete)
            .cloned()
            .collect()
    }

    fn find_message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.sessions
            .iter_mut()
            .find_map(|s| s.messages.iter_mut().find(|m| m.id == message_id))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restores a persisted store, falling back to a fresh one when the data is unusable.
    pub fn from_json(raw: &str) -> Self {
        let mut store = match serde_json::from_str::<SessionStore>(raw) {
            Ok(store) => store,
            Err(e) => {
                log::warn!("discarding unreadable session data: {e}");
                return Self::default();
            }
        };

        if store.sessions.is_empty() {
            return Self::default();
        }
        if !store.sessions.iter().any(|s| s.id == store.active_id) {
            store.active_id = store.sessions[0].id.clone();
        }

        // a reload kills any in-flight stream
        for message in store.sessions.iter_mut().flat_map(|s| s.messages.iter_mut()) {
            if message.status == MessageStatus::Streaming {
                if message.text.trim().is_empty() {
                    message.text = INTERRUPTED_NOTICE.to_string();
                }
                message.status = MessageStatus::Error;
            }
        }
        store
    }
}

fn derive_title(text: &str) -> String {
    let line = text.trim().lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return DEFAULT_SESSION_TITLE.to_string();
    }
    if line.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = line.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", truncated.trim_end())
    } else {
        line.to_string()
    }
}
