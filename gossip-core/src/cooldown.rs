//! Resend-OTP cooldown.
//!
//! Retries are always user-initiated; this gate only limits how often the
//! user may ask for a fresh code. Time is passed in so the gate stays pure.

use std::time::{Duration, Instant};
use thiserror::Error;

/// Default wait between OTP emails.
pub const DEFAULT_RESEND_COOLDOWN: Duration = Duration::from_secs(60);

/// A resend was requested inside the cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Please wait {remaining_secs}s before requesting another code")]
pub struct CooldownError {
    /// Whole seconds left, rounded up
    pub remaining_secs: u64,
}

/// Tracks when the last OTP email was requested.
#[derive(Debug, Clone)]
pub struct ResendCooldown {
    window: Duration,
    started: Option<Instant>,
}

impl ResendCooldown {
    /// Create an idle cooldown with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            started: None,
        }
    }

    /// Start (or restart) the window at `now`.
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
    }

    /// Forget any running window.
    pub fn reset(&mut self) {
        self.started = None;
    }

    /// Time left in the window at `now`, zero when idle or elapsed.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.started {
            Some(started) => self
                .window
                .saturating_sub(now.saturating_duration_since(started)),
            None => Duration::ZERO,
        }
    }

    /// Fail if a resend at `now` would fall inside the window.
    pub fn check(&self, now: Instant) -> Result<(), CooldownError> {
        let remaining = self.remaining(now);
        if remaining.is_zero() {
            return Ok(());
        }
        let mut remaining_secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            remaining_secs += 1;
        }
        Err(CooldownError { remaining_secs })
    }
}

impl Default for ResendCooldown {
    fn default() -> Self {
        Self::new(DEFAULT_RESEND_COOLDOWN)
    }
}
