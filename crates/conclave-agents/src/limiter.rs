//! Client-side rate limiting for inference calls.
//!
//! Tracks a rolling 60-second window of requests and token counts plus a
//! per-calendar-day request counter. Admission is checked before a request
//! is submitted; completed requests are recorded with their actual token
//! usage. Everything is parameterized on the clock so the window arithmetic
//! is testable without sleeping.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

/// The three provider limits enforced locally.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Requests per rolling minute.
    pub requests_per_minute: u32,
    /// Tokens per rolling minute.
    pub tokens_per_minute: u32,
    /// Requests per calendar day (local time).
    pub requests_per_day: u32,
}

/// Sliding-window rate limiter for one model endpoint.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    /// Completed requests inside the rolling minute: (time, tokens).
    window: VecDeque<(DateTime<Utc>, u32)>,
    /// The local calendar day the daily counter belongs to.
    day: NaiveDate,
    /// Requests recorded on `day`.
    day_requests: u32,
}

impl RateLimiter {
    /// Create a limiter with the given limits and an empty window.
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            window: VecDeque::new(),
            day: Local::now().date_naive(),
            day_requests: 0,
        }
    }

    /// Whether a request estimated at `tokens` may be submitted now.
    pub fn can_submit(&mut self, tokens: u32) -> bool {
        self.can_submit_at(Utc::now(), tokens)
    }

    /// Record a completed request with its actual token usage.
    pub fn record(&mut self, tokens: u32) {
        self.record_at(Utc::now(), tokens);
    }

    /// Clock-injected admission check.
    pub fn can_submit_at(&mut self, now: DateTime<Utc>, tokens: u32) -> bool {
        self.prune(now);
        self.roll_day(now);

        if self.day_requests >= self.limits.requests_per_day {
            return false;
        }
        let requests = u32::try_from(self.window.len()).unwrap_or(u32::MAX);
        if requests >= self.limits.requests_per_minute {
            return false;
        }
        let window_tokens: u32 = self
            .window
            .iter()
            .fold(0_u32, |sum, (_, t)| sum.saturating_add(*t));
        window_tokens.saturating_add(tokens) <= self.limits.tokens_per_minute
    }

    /// Clock-injected usage recording.
    pub fn record_at(&mut self, now: DateTime<Utc>, tokens: u32) {
        self.prune(now);
        self.roll_day(now);
        self.window.push_back((now, tokens));
        self.day_requests = self.day_requests.saturating_add(1);
    }

    /// Drop window entries older than 60 seconds.
    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now
            .checked_sub_signed(Duration::seconds(60))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        while let Some((at, _)) = self.window.front() {
            if *at > cutoff {
                break;
            }
            self.window.pop_front();
        }
    }

    /// Reset the daily counter when the local calendar day changes.
    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.with_timezone(&Local).date_naive();
        if today != self.day {
            self.day = today;
            self.day_requests = 0;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limits() -> RateLimits {
        RateLimits {
            requests_per_minute: 3,
            tokens_per_minute: 1000,
            requests_per_day: 5,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn request_count_blocks_inside_the_window() {
        let mut limiter = RateLimiter::new(limits());
        for i in 0..3 {
            assert!(limiter.can_submit_at(at(i), 10));
            limiter.record_at(at(i), 10);
        }
        assert!(!limiter.can_submit_at(at(3), 10));
    }

    #[test]
    fn old_entries_roll_out_of_the_window() {
        let mut limiter = RateLimiter::new(limits());
        for i in 0..3 {
            limiter.record_at(at(i), 10);
        }
        assert!(!limiter.can_submit_at(at(30), 10));
        // 61 seconds after the first entry, one slot is free again.
        assert!(limiter.can_submit_at(at(61), 10));
    }

    #[test]
    fn token_budget_blocks_independently_of_request_count() {
        let mut limiter = RateLimiter::new(limits());
        limiter.record_at(at(0), 900);
        assert!(!limiter.can_submit_at(at(1), 200));
        assert!(limiter.can_submit_at(at(1), 100));
    }

    #[test]
    fn daily_cap_survives_window_pruning() {
        let mut limiter = RateLimiter::new(limits());
        // Five requests spread over five minutes: the window never fills,
        // but the daily counter does.
        for i in 0..5 {
            let t = at(i * 120);
            assert!(limiter.can_submit_at(t, 10), "request {i}");
            limiter.record_at(t, 10);
        }
        assert!(!limiter.can_submit_at(at(601), 10));
    }

    #[test]
    fn daily_counter_resets_on_day_rollover() {
        let mut limiter = RateLimiter::new(limits());
        for i in 0..5 {
            limiter.record_at(at(i * 120), 10);
        }
        assert!(!limiter.can_submit_at(at(601), 10));
        let next_day = at(0) + Duration::days(1);
        assert!(limiter.can_submit_at(next_day, 10));
    }
}
