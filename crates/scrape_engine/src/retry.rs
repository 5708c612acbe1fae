//! Backoff schedule and retry classification for the fetcher.

use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub ceiling: Duration,
    /// Upper bound for server-provided `Retry-After` hints.
    pub retry_after_ceiling: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            ceiling: Duration::from_secs(8),
            retry_after_ceiling: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0 for the first retry):
    /// `base * 2^attempt`, capped at the ceiling.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.ceiling)
    }

    /// Delay for a throttling response: the server hint if any, else the schedule.
    pub fn throttled_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.retry_after_ceiling),
            None => self.delay(attempt),
        }
    }
}

/// Statuses that are retried despite being valid HTTP responses.
pub fn is_throttling_status(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((when - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn delay_doubles_until_ceiling() {
        let backoff = Backoff {
            base: Duration::from_millis(100),
            ceiling: Duration::from_millis(500),
            ..Backoff::default()
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(500));
        assert_eq!(backoff.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn retry_after_seconds_and_dates() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn server_hint_is_clamped() {
        let backoff = Backoff::default();
        assert_eq!(
            backoff.throttled_delay(0, Some(Duration::from_secs(3600))),
            backoff.retry_after_ceiling
        );
        assert_eq!(backoff.throttled_delay(1, None), backoff.delay(1));
    }

    #[test]
    fn only_429_and_503_are_throttling() {
        assert!(is_throttling_status(429));
        assert!(is_throttling_status(503));
        assert!(!is_throttling_status(500));
        assert!(!is_throttling_status(404));
    }
}
