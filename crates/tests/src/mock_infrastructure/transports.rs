//! Scripted [`Transport`] implementations.

use async_trait::async_trait;
use manifold_core::router::{Transport, TransportError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// A transport that replays a script, then falls back to a fixed outcome.
pub struct MockTransport {
    name: String,
    delay: Option<Duration>,
    script: Mutex<VecDeque<Result<Value, TransportError>>>,
    fallback: Result<Value, TransportError>,
    calls: AtomicUsize,
}

impl MockTransport {
    /// A transport that always succeeds, echoing its own name.
    #[must_use]
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: None,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(json!({ "served_by": name })),
            calls: AtomicUsize::new(0),
        }
    }

    /// A transport that always fails with a connection error.
    #[must_use]
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: None,
            script: Mutex::new(VecDeque::new()),
            fallback: Err(TransportError::ConnectionFailed(message.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Prepends scripted outcomes consumed before the fallback applies.
    #[must_use]
    pub fn with_script(self, outcomes: Vec<Result<Value, TransportError>>) -> Self {
        *self.script.lock() = outcomes.into();
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request(&self, _operation: &str, _params: &Value) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}
