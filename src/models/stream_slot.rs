/// An open connection delivering a reply, closed once nobody wants it.
pub trait CloseHandle {
    fn close(&self);
}

struct ActiveStream<H> {
    placeholder_id: String,
    stream_id: Option<String>,
    connection: Option<H>,
}

/// What is left once a stream is torn down. `stream_id` is set when the relay
/// had registered the stream, so the caller can release it there too.
#[derive(Debug, PartialEq, Eq)]
pub struct Released {
    pub placeholder_id: String,
    pub stream_id: Option<String>,
}

/// Tracks the one reply allowed to stream at a time.
pub struct StreamSlot<H> {
    active: Option<ActiveStream<H>>,
}

impl<H> Default for StreamSlot<H> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<H: CloseHandle> StreamSlot<H> {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn placeholder_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.placeholder_id.as_str())
    }

    pub fn is_current(&self, placeholder_id: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.placeholder_id == placeholder_id)
    }

    /// Claims the slot for a new placeholder. False while another reply streams.
    pub fn begin(&mut self, placeholder_id: impl Into<String>) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(ActiveStream {
            placeholder_id: placeholder_id.into(),
            stream_id: None,
            connection: None,
        });
        true
    }

    /// False when the placeholder was cancelled while the relay registered it.
    pub fn attach_stream_id(&mut self, placeholder_id: &str, stream_id: &str) -> bool {
        match self.current_mut(placeholder_id) {
            Some(active) => {
                active.stream_id = Some(stream_id.to_string());
                true
            }
            None => false,
        }
    }

    /// A connection arriving for a stale placeholder is closed straight away.
    pub fn attach_connection(&mut self, placeholder_id: &str, connection: H) -> bool {
        match self.current_mut(placeholder_id) {
            Some(active) => {
                if let Some(previous) = active.connection.replace(connection) {
                    previous.close();
                }
                true
            }
            None => {
                connection.close();
                false
            }
        }
    }

    /// Ends the stream if `placeholder_id` still owns it, closing its connection.
    pub fn finish(&mut self, placeholder_id: &str) -> Option<Released> {
        if !self.is_current(placeholder_id) {
            return None;
        }
        self.cancel()
    }

    /// Ends whatever is streaming, closing its connection.
    pub fn cancel(&mut self) -> Option<Released> {
        let active = self.active.take()?;
        if let Some(connection) = &active.connection {
            connection.close();
        }
        Some(Released {
            placeholder_id: active.placeholder_id,
            stream_id: active.stream_id,
        })
    }

    fn current_mut(&mut self, placeholder_id: &str) -> Option<&mut ActiveStream<H>> {
        self.active
            .as_mut()
            .filter(|a| a.placeholder_id == placeholder_id)
    }
}
