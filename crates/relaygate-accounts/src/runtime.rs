//! In-memory runtime state per `(provider, account_id)`.
//!
//! This state is never persisted: a process restart forgets cooldowns and
//! in-flight counts on purpose.

use std::time::{Duration, Instant};

use relaygate_common::RateLimitReason;

#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    rate_limited_until: Option<Instant>,
    rate_limit_reason: Option<RateLimitReason>,
    in_flight: u32,
    last_success_at: Option<Instant>,
}

impl RuntimeState {
    pub fn is_rate_limited(&self, now: Instant) -> bool {
        self.rate_limited_until.is_some_and(|until| now < until)
    }

    pub fn rate_limited_until(&self) -> Option<Instant> {
        self.rate_limited_until
    }

    pub fn rate_limit_reason(&self) -> Option<RateLimitReason> {
        self.rate_limit_reason
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn last_success_at(&self) -> Option<Instant> {
        self.last_success_at
    }

    pub fn mark_rate_limited(&mut self, now: Instant, cooldown: Duration, reason: RateLimitReason) {
        self.rate_limited_until = Some(now + cooldown);
        self.rate_limit_reason = Some(reason);
    }

    pub fn mark_success(&mut self, now: Instant) {
        self.rate_limited_until = None;
        self.rate_limit_reason = None;
        self.last_success_at = Some(now);
    }

    pub fn mark_in_flight(&mut self) {
        self.in_flight += 1;
    }

    pub fn release_in_flight(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}
