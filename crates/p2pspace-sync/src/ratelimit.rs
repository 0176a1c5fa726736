//! Per-peer rate limiting.
//!
//! Two token buckets gate each peer: one for inbound frames and one for
//! the signature verifications those frames can trigger. When a bucket is
//! empty the frame is dropped; a warning is emitted at most once a second.

/// A refilling token bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_ms: i64,
}

impl TokenBucket {
    pub fn new(burst: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: burst as f64,
            tokens: burst as f64,
            refill_per_sec: refill_per_sec as f64,
            last_ms: 0,
        }
    }

    fn refill(&mut self, now_ms: i64) {
        if now_ms > self.last_ms {
            let elapsed = (now_ms - self.last_ms) as f64 / 1000.0;
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        }
        self.last_ms = now_ms.max(self.last_ms);
    }

    /// Take `n` tokens if available.
    pub fn try_take(&mut self, n: u32, now_ms: i64) -> bool {
        self.refill(now_ms);
        let n = n as f64;
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }
}

/// The pair of buckets guarding one peer.
#[derive(Debug, Clone)]
pub struct PeerLimiter {
    messages: TokenBucket,
    verifies: TokenBucket,
    last_warn_ms: Option<i64>,
}

/// Message bucket: burst 60, refill 20/s.
const MESSAGE_BURST: u32 = 60;
const MESSAGE_REFILL: u32 = 20;

/// Verification bucket: burst 80, refill 20/s.
const VERIFY_BURST: u32 = 80;
const VERIFY_REFILL: u32 = 20;

impl PeerLimiter {
    pub fn new() -> Self {
        Self {
            messages: TokenBucket::new(MESSAGE_BURST, MESSAGE_REFILL),
            verifies: TokenBucket::new(VERIFY_BURST, VERIFY_REFILL),
            last_warn_ms: None,
        }
    }

    /// Charge one inbound frame.
    pub fn allow_message(&mut self, now_ms: i64) -> bool {
        self.messages.try_take(1, now_ms)
    }

    /// Charge `n` signature verifications.
    pub fn allow_verifications(&mut self, n: u32, now_ms: i64) -> bool {
        self.verifies.try_take(n, now_ms)
    }

    /// Whether a drop warning may be logged now (at most one per second).
    pub fn warn_ready(&mut self, now_ms: i64) -> bool {
        match self.last_warn_ms {
            Some(last) if now_ms - last < 1_000 => false,
            _ => {
                self.last_warn_ms = Some(now_ms);
                true
            }
        }
    }
}

impl Default for PeerLimiter {
    fn default() -> Self {
        Self::new()
    }
}
