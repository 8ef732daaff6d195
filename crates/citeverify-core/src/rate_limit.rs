//! Per-source courtesy gates and the error type shared by source queries.
//!
//! Each source owns one [`SourceGate`]. Every HTTP call to that source waits
//! for a permit first, so no two calls to the same source are closer together
//! than the configured courtesy delay, however many references are in flight.
//! On 429 the gate is slowed down and the original pace is restored after a
//! quiet minute.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use thiserror::Error;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Maximum slowdown applied after repeated 429 responses.
const MAX_SLOWDOWN: u32 = 16;

/// Quiet period after which a slowed gate returns to its base pace.
const RESTORE_AFTER: Duration = Duration::from_secs(60);

/// Failure of a single call to an external source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbQueryError {
    /// Server returned 429 Too Many Requests.
    #[error("rate limited (429)")]
    RateLimited { retry_after: Option<Duration> },
    /// Server returned 404; the identifier is unknown to this source.
    #[error("not found (404)")]
    NotFound,
    /// Any other non-success status.
    #[error("HTTP {0}")]
    Http(u16),
    /// Connection, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Body was not the JSON we expected.
    #[error("invalid response: {0}")]
    Decode(String),
    /// The run was cancelled or hit its deadline.
    #[error("cancelled")]
    Cancelled,
}

impl DbQueryError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DbQueryError::RateLimited { .. }
            | DbQueryError::Transport(_)
            | DbQueryError::Decode(_) => true,
            DbQueryError::Http(status) => *status >= 500 || *status == 408,
            DbQueryError::NotFound | DbQueryError::Cancelled => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DbQueryError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Minimum-interval gate for one source, adaptive on 429.
pub struct SourceGate {
    /// `None` when the base period is zero (gating disabled).
    limiter: ArcSwapOption<DirectLimiter>,
    base_period: Duration,
    current_factor: AtomicU32,
    last_429: Mutex<Option<Instant>>,
}

impl SourceGate {
    /// Gate allowing one call per `period`. A zero period never waits.
    pub fn new(period: Duration) -> Self {
        Self {
            limiter: ArcSwapOption::from(build_limiter(period)),
            base_period: period,
            current_factor: AtomicU32::new(1),
            last_429: Mutex::new(None),
        }
    }

    pub fn base_period(&self) -> Duration {
        self.base_period
    }

    /// Current spacing between calls, including any 429 slowdown.
    pub fn current_period(&self) -> Duration {
        self.base_period * self.current_factor.load(Ordering::SeqCst)
    }

    /// Wait until this source may be called again.
    pub async fn acquire(&self) {
        self.try_restore();
        let limiter = self.limiter.load_full();
        if let Some(limiter) = limiter {
            limiter.until_ready().await;
        }
    }

    /// Record a 429: double the spacing, up to [`MAX_SLOWDOWN`]x.
    pub fn on_rate_limited(&self) {
        if let Ok(mut last) = self.last_429.lock() {
            *last = Some(Instant::now());
        }

        let _ = self
            .current_factor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                Some((f * 2).min(MAX_SLOWDOWN))
            });

        if let Some(limiter) = build_spent_limiter(self.current_period()) {
            self.limiter.store(Some(limiter));
        }
    }

    fn try_restore(&self) {
        let quiet = self
            .last_429
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed() >= RESTORE_AFTER))
            .unwrap_or(false);

        if quiet && self.current_factor.swap(1, Ordering::SeqCst) > 1 {
            self.limiter.store(build_spent_limiter(self.base_period));
        }
    }
}

fn build_limiter(period: Duration) -> Option<Arc<DirectLimiter>> {
    Quota::with_period(period).map(|quota| Arc::new(DirectLimiter::direct(quota)))
}

/// Replacement limiter for a gate already in use. Its only permit is taken
/// up front so the call right after a swap still waits a full period.
fn build_spent_limiter(period: Duration) -> Option<Arc<DirectLimiter>> {
    let limiter = build_limiter(period)?;
    let _ = limiter.check();
    Some(limiter)
}

/// Map a 429 response to [`DbQueryError::RateLimited`], honouring `Retry-After`.
pub fn check_rate_limit_response(resp: &reqwest::Response) -> Result<(), DbQueryError> {
    if resp.status().as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(DbQueryError::RateLimited { retry_after })
    } else {
        Ok(())
    }
}

/// Parse a Retry-After value: integer seconds, or an HTTP-date (treated as 5s).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integer_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::from_secs(0)));
    }

    #[test]
    fn parse_http_date() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn parse_garbage() {
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn ok_on_200() {
        let resp = reqwest::Response::from(http::Response::builder().status(200).body("").unwrap());
        assert!(check_rate_limit_response(&resp).is_ok());
    }

    #[test]
    fn rate_limited_with_retry_after() {
        let resp = reqwest::Response::from(
            http::Response::builder()
                .status(429)
                .header("retry-after", "10")
                .body("")
                .unwrap(),
        );
        let err = check_rate_limit_response(&resp).unwrap_err();
        assert_eq!(
            err,
            DbQueryError::RateLimited {
                retry_after: Some(Duration::from_secs(10))
            }
        );
    }

    #[test]
    fn transient_classification() {
        assert!(DbQueryError::Transport("reset".into()).is_transient());
        assert!(DbQueryError::Http(503).is_transient());
        assert!(DbQueryError::Http(408).is_transient());
        assert!(DbQueryError::RateLimited { retry_after: None }.is_transient());
        assert!(!DbQueryError::Http(400).is_transient());
        assert!(!DbQueryError::NotFound.is_transient());
        assert!(!DbQueryError::Cancelled.is_transient());
    }

    #[test]
    fn zero_period_disables_gate() {
        let gate = SourceGate::new(Duration::ZERO);
        assert!(gate.limiter.load().is_none());
    }

    #[test]
    fn rate_limited_doubles_period_and_caps() {
        let gate = SourceGate::new(Duration::from_millis(100));
        gate.on_rate_limited();
        assert_eq!(gate.current_period(), Duration::from_millis(200));
        for _ in 0..10 {
            gate.on_rate_limited();
        }
        assert_eq!(gate.current_period(), Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn restores_after_quiet_period() {
        let gate = SourceGate::new(Duration::from_millis(10));
        gate.on_rate_limited();
        gate.on_rate_limited();
        {
            let mut last = gate.last_429.lock().unwrap();
            *last = Some(Instant::now() - Duration::from_secs(61));
        }
        gate.acquire().await;
        assert_eq!(gate.current_period(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn slowdown_keeps_spacing_after_swap() {
        let gate = SourceGate::new(Duration::from_millis(100));
        gate.acquire().await;
        gate.on_rate_limited();
        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn restore_keeps_spacing_after_swap() {
        let gate = SourceGate::new(Duration::from_millis(100));
        gate.on_rate_limited();
        gate.acquire().await;
        {
            let mut last = gate.last_429.lock().unwrap();
            *last = Some(Instant::now() - Duration::from_secs(61));
        }
        let start = Instant::now();
        gate.acquire().await;
        assert_eq!(gate.current_period(), Duration::from_millis(100));
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn spaces_consecutive_calls() {
        let gate = SourceGate::new(Duration::from_millis(50));
        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
