//! Scripted backend for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{BackendError, GenerateRequest, GenerativeBackend, ProviderResponse};

/// Backend that replays queued results in order.
///
/// Once the queue is empty every call answers with the fallback text.
pub struct ScriptedBackend {
    model_id: String,
    script: Mutex<VecDeque<Result<ProviderResponse, BackendError>>>,
    fallback: String,
    requests: Mutex<Vec<GenerateRequest>>,
    call_count: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            model_id: "scripted".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: "Mock answer".to_string(),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = text.into();
        self
    }

    /// Queue the result of the next unscripted call
    pub fn push(&self, result: Result<ProviderResponse, BackendError>) -> &Self {
        lock(&self.script).push_back(result);
        self
    }

    pub fn push_network_error(&self, cause: &str) -> &Self {
        self.push(Err(BackendError::Network(cause.to_string())))
    }

    pub fn push_http_error(&self, status: u16, body: &str) -> &Self {
        self.push(Err(BackendError::Http {
            status,
            body: body.to_string(),
        }))
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<GenerateRequest> {
        lock(&self.requests).clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, BackendError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderResponse::text(self.fallback.clone())))
    }
}
