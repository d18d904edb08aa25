// Telemetry read/write through the ThingsBoard telemetry plugin API
use crate::application::collaborators::TelemetryGateway;
use crate::domain::auth::AuthToken;
use crate::domain::entity::EntityRef;
use crate::domain::error::{LoadError, WriteError, WriteFailure};
use crate::domain::telemetry::{TelemetrySample, TimeWindow, latest_sample, now_ms};
use crate::infrastructure::thingsboard_api::{AUTH_HEADER, ThingsboardApi, failure_parts};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Upper bound on samples requested per key. Newest first, so the latest is always included.
const READ_LIMIT: u32 = 100;

pub type TimeseriesData = HashMap<String, Vec<TelemetrySample>>;

#[derive(Debug, Deserialize)]
struct RawSample {
    ts: i64,
    value: RawValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Body of a timeseries write: `{"ts": .., "values": {key: value}}`.
#[derive(Debug, Serialize)]
struct TimeseriesWrite<'a> {
    ts: i64,
    values: BTreeMap<&'a str, f64>,
}

impl<'a> TimeseriesWrite<'a> {
    fn single(ts: i64, key: &'a str, value: f64) -> Self {
        Self {
            ts,
            values: BTreeMap::from([(key, value)]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestTelemetryGateway {
    api: ThingsboardApi,
}

impl RestTelemetryGateway {
    pub fn new(api: ThingsboardApi) -> Self {
        Self { api }
    }

    /// Series for `keys` inside `window`, each sorted ascending by `ts`.
    pub async fn get_entity_timeseries(
        &self,
        entity: &EntityRef,
        keys: &[&str],
        window: TimeWindow,
        token: &AuthToken,
    ) -> Result<TimeseriesData, LoadError> {
        let url = self.api.telemetry_url(entity, "values/timeseries");
        let response = self
            .api
            .client()
            .get(&url)
            .header(AUTH_HEADER, token.bearer())
            .header("Accept", "application/json")
            .query(&[
                ("keys", keys.join(",")),
                ("startTs", window.start_ts.to_string()),
                ("endTs", window.end_ts.to_string()),
                ("limit", READ_LIMIT.to_string()),
                ("orderBy", "DESC".to_string()),
            ])
            .send()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(LoadError::Status { status, body });
        }

        let raw = response
            .json::<HashMap<String, Vec<RawSample>>>()
            .await
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|(key, samples)| {
                let mut series: Vec<TelemetrySample> = samples
                    .into_iter()
                    .filter_map(|s| match s.value.as_f64() {
                        Some(value) => Some(TelemetrySample::new(s.ts, value)),
                        None => {
                            tracing::debug!(key = %key, ts = s.ts, "Skipping non-numeric sample");
                            None
                        }
                    })
                    .collect();
                series.sort_by_key(|s| s.ts);
                (key, series)
            })
            .collect())
    }
}

#[async_trait]
impl TelemetryGateway for RestTelemetryGateway {
    async fn fetch_latest(
        &self,
        entity: &EntityRef,
        key: &str,
        window: TimeWindow,
        token: &AuthToken,
    ) -> Result<Option<TelemetrySample>, LoadError> {
        let data = self.get_entity_timeseries(entity, &[key], window, token).await?;
        let latest = data.get(key).and_then(|series| latest_sample(series));
        tracing::debug!(entity_id = %entity.id, key, found = latest.is_some(), "Fetched latest telemetry");
        Ok(latest)
    }

    async fn write(
        &self,
        entity: &EntityRef,
        key: &str,
        value: f64,
        token: &AuthToken,
    ) -> Result<(), WriteFailure> {
        let url = self.api.telemetry_url(entity, "timeseries/ANY");
        let body = TimeseriesWrite::single(now_ms(), key, value);

        let response = self
            .api
            .client()
            .post(&url)
            .header(AUTH_HEADER, token.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(entity_id = %entity.id, "Telemetry write rejected credential");
            return Err(WriteFailure::AuthExpired);
        }
        if !status.is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(WriteError::Status { status, body }.into());
        }

        tracing::info!(entity_id = %entity.id, key, value, ts = body.ts, "Telemetry written");
        Ok(())
    }
}
