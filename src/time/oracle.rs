//! HTTP time authority client
//!
//! Understands the common JSON time APIs (`unixtime`, `utc_datetime`,
//! `datetime`, `dateTime`) and falls back to the HTTP `Date` header, which
//! every conforming server sends.

use crate::config::TimeConfig;
use crate::error::{Error, Result};
use crate::time::{fixed_offset, ExponentialBackoff, TimeSource};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use reqwest::blocking::Client;
use reqwest::header::DATE;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest pause between retries
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Blocking client for a remote time authority
pub struct HttpTimeOracle {
    client: Client,
    url: String,
    offset: FixedOffset,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl HttpTimeOracle {
    /// Create an oracle from configuration
    pub fn new(config: &TimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("timelock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::TimeSourceUnavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(HttpTimeOracle {
            client,
            url: config.url.clone(),
            offset: fixed_offset(config.utc_offset_minutes)?,
            retry_attempts: config.retry_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    /// Reference offset applied to every result
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn fetch_once(&self) -> Result<DateTime<Utc>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| Error::TimeSourceUnavailable(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TimeSourceUnavailable(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let date_header = response
            .headers()
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .map_err(|e| Error::TimeSourceUnavailable(format!("failed to read response: {}", e)))?;

        parse_time_response(&body, date_header.as_deref()).ok_or_else(|| {
            Error::TimeSourceUnavailable(format!("no usable timestamp in response from {}", self.url))
        })
    }
}

impl TimeSource for HttpTimeOracle {
    fn now(&self) -> Result<DateTime<FixedOffset>> {
        let mut backoff = ExponentialBackoff::new(self.retry_base_delay, MAX_RETRY_DELAY);
        let mut attempt = 1;

        loop {
            match self.fetch_once() {
                Ok(utc) => {
                    let now = utc.with_timezone(&self.offset);
                    debug!("Trusted time from {}: {}", self.url, now);
                    return Ok(now);
                }
                Err(e) if attempt < self.retry_attempts => {
                    let delay = backoff.next_delay();
                    warn!(
                        "Time query attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.retry_attempts, e, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Extract a UTC timestamp from a time authority response
///
/// JSON fields take precedence over the `Date` header, which only has
/// one-second resolution.
pub fn parse_time_response(body: &str, date_header: Option<&str>) -> Option<DateTime<Utc>> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(secs) = value.get("unixtime").and_then(|v| v.as_i64()) {
            if let Some(ts) = Utc.timestamp_opt(secs, 0).single() {
                return Some(ts);
            }
        }

        for field in ["utc_datetime", "datetime", "dateTime"] {
            let parsed = value
                .get(field)
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
            if let Some(ts) = parsed {
                return Some(ts.with_timezone(&Utc));
            }
        }
    }

    date_header
        .and_then(|h| DateTime::parse_from_rfc2822(h).ok())
        .map(|ts| ts.with_timezone(&Utc))
}
