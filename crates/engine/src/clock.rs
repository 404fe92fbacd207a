//! Corrected wall-clock time.
//!
//! Function instances run on hosts whose clocks drift apart, so timestamps that
//! are compared across providers are corrected by an offset obtained from a
//! time server. The offset is fetched once and cached until [`CorrectedClock::reset`].

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rsntp::AsyncSntpClient;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("time server {server} unreachable: {message}")]
    Unreachable { server: String, message: String },

    #[error("time server {0} sent a malformed reply")]
    MalformedReply(String),
}

/// Source of the local clock's offset against reference time.
#[async_trait]
pub trait OffsetSource: Send + Sync {
    async fn offset(&self) -> Result<TimeDelta, ClockError>;
}

/// A constant offset; zero disables correction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOffset(pub TimeDelta);

#[async_trait]
impl OffsetSource for FixedOffset {
    async fn offset(&self) -> Result<TimeDelta, ClockError> {
        Ok(self.0)
    }
}

// ---------------------------------------------------------------------------
// SNTP
// ---------------------------------------------------------------------------

/// Simple Network Time Protocol client backed by `rsntp`.
#[derive(Debug, Clone)]
pub struct SntpOffset {
    server: String,
    timeout: Duration,
}

impl SntpOffset {
    /// `server` is a `host:port` pair, e.g. `pool.ntp.org:123`.
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            timeout,
        }
    }
}

#[async_trait]
impl OffsetSource for SntpOffset {
    async fn offset(&self) -> Result<TimeDelta, ClockError> {
        let mut client = AsyncSntpClient::new();
        client.set_timeout(self.timeout);

        let result = client
            .synchronize(self.server.as_str())
            .await
            .map_err(|e| ClockError::Unreachable {
                server: self.server.clone(),
                message: e.to_string(),
            })?;

        result
            .clock_offset()
            .into_chrono_duration()
            .map_err(|_| ClockError::MalformedReply(self.server.clone()))
    }
}

// ---------------------------------------------------------------------------
// CorrectedClock
// ---------------------------------------------------------------------------

pub struct CorrectedClock {
    source: Box<dyn OffsetSource>,
    offset: Mutex<Option<TimeDelta>>,
    last_end: Mutex<Option<DateTime<Utc>>>,
}

impl CorrectedClock {
    pub fn new(source: impl OffsetSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            offset: Mutex::new(None),
            last_end: Mutex::new(None),
        }
    }

    /// A clock that reports uncorrected system time.
    pub fn system() -> Self {
        Self::new(FixedOffset::default())
    }

    /// Corrected current time.
    ///
    /// System time is read before the offset is (possibly) fetched, so the
    /// result describes the moment of the call. When the offset cannot be
    /// obtained the uncorrected time is returned and the next call tries again.
    pub async fn now(&self) -> DateTime<Utc> {
        let system_now = Utc::now();

        let cached = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        let offset = match cached {
            Some(offset) => offset,
            None => match self.source.offset().await {
                Ok(offset) => {
                    debug!(offset_ms = offset.num_milliseconds(), "clock offset synchronized");
                    *self.offset.lock().unwrap_or_else(|e| e.into_inner()) = Some(offset);
                    offset
                }
                Err(e) => {
                    warn!("clock offset unavailable, using system time: {e}");
                    TimeDelta::zero()
                }
            },
        };

        system_now + offset
    }

    /// Corrected time at which the previous invocation on this instance ended.
    pub fn last_end_time(&self) -> Option<DateTime<Utc>> {
        *self.last_end.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remember the end of the current invocation.
    pub async fn mark_end(&self) -> DateTime<Utc> {
        let now = self.now().await;
        *self.last_end.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
        now
    }

    /// Forget the cached offset and end time.
    pub fn reset(&self) {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.last_end.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl std::fmt::Debug for CorrectedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectedClock")
            .field("offset", &self.offset)
            .field("last_end", &self.last_end)
            .finish_non_exhaustive()
    }
}
