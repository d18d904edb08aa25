// Telemetry data domain models
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub ts: i64,
    pub value: f64,
}

impl TelemetrySample {
    pub fn new(ts: i64, value: f64) -> Self {
        Self { ts, value }
    }
}

/// Closed range of epoch milliseconds a read is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ts: i64,
    pub end_ts: i64,
}

impl TimeWindow {
    /// The window `[now - lookback, now]`.
    pub fn lookback(now_ms: i64, lookback: Duration) -> Self {
        let span = i64::try_from(lookback.as_millis()).unwrap_or(i64::MAX);
        Self {
            start_ts: now_ms.saturating_sub(span),
            end_ts: now_ms,
        }
    }
}

/// Sample with the maximum timestamp, regardless of input order.
pub fn latest_sample(samples: &[TelemetrySample]) -> Option<TelemetrySample> {
    samples.iter().copied().max_by_key(|s| s.ts)
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
