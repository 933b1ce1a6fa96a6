//! In-memory transport
//!
//! Records every accepted payload. Switching it into failing mode makes every
//! send fail without recording, which is how the offline path is exercised
//! in tests and dry runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::Notify;

use beacon_core::ports::ITransport;

use crate::TransportError;

/// Transport that keeps payloads in memory
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    sent: Mutex<Vec<Value>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
    delivered: Notify,
}

impl InMemoryTransport {
    /// Creates a transport that accepts every payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that rejects every payload
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.set_failing(true);
        transport
    }

    /// Switches failing mode on or off
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Payloads accepted so far, in send order
    pub fn sent(&self) -> Vec<Value> {
        self.lock().clone()
    }

    /// Number of accepted payloads
    pub fn sent_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of send calls, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Forgets recorded payloads and attempts
    pub fn reset(&self) {
        self.lock().clear();
        self.attempts.store(0, Ordering::SeqCst);
    }

    /// Waits until at least `count` payloads have been accepted
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.delivered.notified();
            if self.sent_count() >= count {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl ITransport for InMemoryTransport {
    async fn send(&self, payload: &Value) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("in-memory transport is failing".into()).into());
        }
        self.lock().push(payload.clone());
        self.delivered.notify_waiters();
        Ok(())
    }
}
