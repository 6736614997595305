use axum::response::sse::{Event, KeepAlive, Sse};
use dashmap::DashMap;
use futures::stream::Stream;
use log::{debug, info};
use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::ChatRequest;

pub struct CancellableSseStream {
    receiver: mpsc::Receiver<Result<Event, Infallible>>,
    cancel_token: CancellationToken,
}

impl Stream for CancellableSseStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for CancellableSseStream {
    // the browser went away, stop talking to upstream
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct PendingStream {
    request: Option<ChatRequest>,
    token: CancellationToken,
    registered_at: Instant,
}

/// Relay requests waiting for, or attached to, a browser `EventSource`.
#[derive(Clone)]
pub struct StreamRegistry {
    streams: Arc<DashMap<String, PendingStream>>,
    ttl: Duration,
}

impl StreamRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn register(&self, request: ChatRequest) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.streams.insert(
            id.clone(),
            PendingStream {
                request: Some(request),
                token: CancellationToken::new(),
                registered_at: Instant::now(),
            },
        );
        id
    }

    /// Hands out the registered request exactly once.
    pub fn claim(&self, id: &str) -> Option<(ChatRequest, CancellationToken)> {
        let mut entry = self.streams.get_mut(id)?;
        let request = entry.request.take()?;
        Some((request, entry.token.clone()))
    }

    pub fn cancel(&self, id: &str) -> bool {
        match self.streams.remove(id) {
            Some((_, pending)) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn finish(&self, id: &str) {
        self.streams.remove(id);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Drops requests nobody claimed within the TTL. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let before = self.streams.len();
        let ttl = self.ttl;
        self.streams
            .retain(|_, pending| pending.request.is_none() || pending.registered_at.elapsed() < ttl);
        let removed = before.saturating_sub(self.streams.len());
        if removed > 0 {
            debug!("expired {removed} unclaimed streams");
        }
        removed
    }

    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.ttl);
            loop {
                interval.tick().await;
                registry.sweep_expired();
            }
        })
    }
}

pub fn create_cancellable_sse_stream<F, Fut>(
    registry: StreamRegistry,
    stream_id: String,
    cancel_token: CancellationToken,
    process_fn: F,
) -> Sse<CancellableSseStream>
where
    F: FnOnce(mpsc::Sender<Result<Event, Infallible>>, CancellationToken) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(100);
    let task_token = cancel_token.clone();

    tokio::spawn(async move {
        // hold a sender so the browser only sees the end after the registry is clean
        let _keep_open = tx.clone();
        process_fn(tx, task_token).await;
        registry.finish(&stream_id);
        info!("SSE stream {stream_id} finished");
    });

    Sse::new(CancellableSseStream {
        receiver: rx,
        cancel_token,
    })
    .keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn request() -> ChatRequest {
        ChatRequest {
            history: vec![Message::user("hi")],
            image: None,
        }
    }

    #[test]
    fn test_claim_hands_out_request_once() {
        let registry = StreamRegistry::new(Duration::from_secs(60));
        let original = request();
        let id = registry.register(original.clone());

        let (claimed, token) = registry.claim(&id).unwrap();
        assert_eq!(claimed, original);
        assert!(!token.is_cancelled());
        assert!(registry.claim(&id).is_none());
        assert!(registry.claim("unknown").is_none());
    }

    #[test]
    fn test_cancel_fires_token_of_claimed_stream() {
        let registry = StreamRegistry::new(Duration::from_secs(60));
        let id = registry.register(request());
        let (_, token) = registry.claim(&id).unwrap();

        assert!(registry.cancel(&id));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_only_removes_stale_unclaimed_streams() {
        let registry = StreamRegistry::new(Duration::ZERO);
        let stale = registry.register(request());
        let claimed = registry.register(request());
        registry.claim(&claimed).unwrap();

        assert_eq!(registry.sweep_expired(), 1);
        assert!(registry.claim(&stale).is_none());
        assert_eq!(registry.len(), 1);

        registry.finish(&claimed);
        assert!(registry.is_empty());
    }
}
