//! HTTP session store backed by the care API.
//!
//! Endpoints (all require `Authorization: Bearer <token>`):
//!
//! - `GET  {base}/kick-count?days=N`
//! - `GET  {base}/kick-count/chart?days=N`
//! - `POST {base}/kick-count`

use super::{SessionStore, StoreError, GENERIC_ERROR_MESSAGE};
use crate::core::session::{PersistedSession, WeeklyChart};
use crate::credentials::CredentialSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// API endpoint configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://care.example.com/api`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ApiConfig {
    /// Create a new API configuration.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Base URL without a trailing slash.
    pub fn url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Kick-count collection endpoint.
    pub fn kick_count_url(&self) -> String {
        format!("{}/kick-count", self.url())
    }

    /// Chart endpoint.
    pub fn chart_url(&self) -> String {
        format!("{}/kick-count/chart", self.url())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KickCountList {
    #[serde(default)]
    kick_counts: Vec<KickCountRecord>,
}

#[derive(Debug, Deserialize)]
struct KickCountRecord {
    count: u32,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateKickCount<'a> {
    count: u32,
    notes: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedKickCount {
    kick_count: CreatedRecord,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    data: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    datasets: Vec<ChartDataset>,
}

#[derive(Debug, Deserialize)]
struct ChartDataset {
    #[serde(default)]
    data: Vec<f64>,
}

impl From<ChartEnvelope> for WeeklyChart {
    fn from(envelope: ChartEnvelope) -> Self {
        let ChartData { labels, datasets } = envelope.chart.data;
        let values = datasets
            .into_iter()
            .next()
            .map(|set| set.data)
            .unwrap_or_default();
        WeeklyChart { labels, values }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Pull the `error` field out of a failed response body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}

/// Session store talking to the care API.
pub struct HttpSessionStore {
    config: ApiConfig,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpSessionStore {
    /// Create a new store client.
    pub fn new(
        config: ApiConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn bearer(&self) -> Result<String, StoreError> {
        self.credentials
            .bearer_token()
            .ok_or(StoreError::CredentialMissing)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, StoreError> {
        let token = self.bearer()?;

        let response = request
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn list_sessions(&self, days: u32) -> Result<Vec<PersistedSession>, StoreError> {
        tracing::debug!(days, "listing kick-count sessions");
        let request = self
            .client
            .get(self.config.kick_count_url())
            .query(&[("days", days)]);

        let list: KickCountList = self.send(request).await?;
        Ok(list
            .kick_counts
            .into_iter()
            .map(|r| PersistedSession::from_store(r.count, r.timestamp, r.notes))
            .collect())
    }

    async fn create_session(
        &self,
        count: u32,
        notes: &str,
    ) -> Result<PersistedSession, StoreError> {
        tracing::debug!(count, notes, "creating kick-count session");
        let request = self
            .client
            .post(self.config.kick_count_url())
            .json(&CreateKickCount { count, notes });

        let created: CreatedKickCount = self.send(request).await?;
        Ok(PersistedSession::from_store(
            count,
            created.kick_count.timestamp,
            Some(notes.to_string()),
        ))
    }

    async fn weekly_chart(&self, days: u32) -> Result<WeeklyChart, StoreError> {
        tracing::debug!(days, "fetching kick-count chart");
        let request = self
            .client
            .get(self.config.chart_url())
            .query(&[("days", days)]);

        let envelope: ChartEnvelope = self.send(request).await?;
        Ok(envelope.into())
    }
}
