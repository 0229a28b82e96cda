use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Caller-owned execution budget: an optional wall-clock expiry plus a
/// cancellation flag shared by every clone and every child.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

impl Deadline {
    pub fn none() -> Self {
        Self {
            expires_at: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn at(expires_at: Instant) -> Self {
        Self {
            expires_at: Some(expires_at),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Narrows the expiry to at most `timeout` from now. Cancellation stays shared.
    pub fn child(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let expires_at = match self.expires_at {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };
        Self {
            expires_at: Some(expires_at),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn is_bounded(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// `None` means unbounded; an expired or cancelled deadline yields `Some(ZERO)`.
    pub fn remaining(&self) -> Option<Duration> {
        if self.is_cancelled() {
            return Some(Duration::ZERO);
        }
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}
