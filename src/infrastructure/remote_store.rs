use crate::domain::models::DayKey;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::payload::DayPayload;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Day(DayKey),
    All,
}

/// Remote persistence for day records.
#[async_trait]
pub trait RemoteDayStore: Send + Sync {
    async fn read(&self, day_key: DayKey) -> Result<Option<DayPayload>, InfraError>;

    async fn write(&self, day_key: DayKey, payload: &DayPayload) -> Result<(), InfraError>;

    async fn delete(&self, target: DeleteTarget) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestRemoteDayStore {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl ReqwestRemoteDayStore {
    pub fn new(base_url: &str) -> Result<Self, InfraError> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid remote base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "remote base url cannot be a base: {base_url}"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            bearer_token: None,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    fn days_endpoint(&self) -> Result<Url, InfraError> {
        self.base_url
            .join("days")
            .map_err(|error| InfraError::InvalidConfig(format!("invalid days endpoint: {error}")))
    }

    fn day_endpoint(&self, day_key: DayKey) -> Result<Url, InfraError> {
        let mut url = self.days_endpoint()?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::InvalidConfig("days URL cannot be a base".to_string()))?;
            segments.push(&day_key.to_string());
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.bearer_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn http_error(action: &str, status: StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("{action} failed: http {}", status.as_u16())
        } else {
            format!("{action} failed: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    async fn send(&self, action: &str, request: RequestBuilder) -> Result<(StatusCode, String), InfraError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while {action}: {error}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading response while {action}: {error}")))?;
        Ok((status, body))
    }
}

#[async_trait]
impl RemoteDayStore for ReqwestRemoteDayStore {
    async fn read(&self, day_key: DayKey) -> Result<Option<DayPayload>, InfraError> {
        let endpoint = self.day_endpoint(day_key)?;
        let (status, body) = self.send("reading day", self.client.get(endpoint)).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::http_error("reading day", status, &body));
        }
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }

        let payload: DayPayload = serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid day payload: {error}; body={body}"))
        })?;
        Ok(Some(payload))
    }

    async fn write(&self, day_key: DayKey, payload: &DayPayload) -> Result<(), InfraError> {
        let endpoint = self.day_endpoint(day_key)?;
        let (status, body) = self
            .send("writing day", self.client.put(endpoint).json(payload))
            .await?;
        if !status.is_success() {
            return Err(Self::http_error("writing day", status, &body));
        }
        Ok(())
    }

    async fn delete(&self, target: DeleteTarget) -> Result<(), InfraError> {
        let endpoint = match target {
            DeleteTarget::Day(day_key) => self.day_endpoint(day_key)?,
            DeleteTarget::All => self.days_endpoint()?,
        };
        let (status, body) = self.send("deleting days", self.client.delete(endpoint)).await?;
        if !status.is_success() {
            return Err(Self::http_error("deleting days", status, &body));
        }
        Ok(())
    }
}

/// Stand-in used when no remote is configured. Every call fails, so all
/// writes stay in the offline queue.
#[derive(Debug, Clone, Default)]
pub struct OfflineRemoteDayStore;

#[async_trait]
impl RemoteDayStore for OfflineRemoteDayStore {
    async fn read(&self, _day_key: DayKey) -> Result<Option<DayPayload>, InfraError> {
        Err(InfraError::Remote("remote store is not configured".to_string()))
    }

    async fn write(&self, _day_key: DayKey, _payload: &DayPayload) -> Result<(), InfraError> {
        Err(InfraError::Remote("remote store is not configured".to_string()))
    }

    async fn delete(&self, _target: DeleteTarget) -> Result<(), InfraError> {
        Err(InfraError::Remote("remote store is not configured".to_string()))
    }
}
