use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};

use super::server::{CasRequest, CreateRequest};
use super::{CasOutcome, CreateOutcome, LeaseEntry, LeaseStore};
use crate::error::LeaseStoreError;

/// Client for the lease server started with `leader-elector lease-server`.
#[derive(Debug, Clone)]
pub struct HttpLeaseStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpLeaseStore {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            auth_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

async fn unexpected(response: reqwest::Response) -> LeaseStoreError {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return LeaseStoreError::Unauthorized;
    }
    let body = response.text().await.unwrap_or_default();
    LeaseStoreError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl LeaseStore for HttpLeaseStore {
    async fn create_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<CreateOutcome, LeaseStoreError> {
        let body = CreateRequest {
            key: key.to_string(),
            value: value.to_string(),
            ttl_ms: ttl.as_millis() as u64,
        };
        let response = self
            .authorize(self.client.post(self.url("/v1/lease/create")))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(CreateOutcome::Created),
            StatusCode::CONFLICT => Ok(CreateOutcome::AlreadyExists),
            _ => Err(unexpected(response).await),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<LeaseEntry>, LeaseStoreError> {
        let response = self
            .authorize(self.client.get(self.url("/v1/lease")))
            .query(&[("key", key)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<LeaseEntry>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(response).await),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<CasOutcome, LeaseStoreError> {
        let body = CasRequest {
            key: key.to_string(),
            expected: expected.to_string(),
            value: value.to_string(),
            ttl_ms: ttl.as_millis() as u64,
        };
        let response = self
            .authorize(self.client.post(self.url("/v1/lease/cas")))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(CasOutcome::Swapped),
            StatusCode::CONFLICT => Ok(CasOutcome::Conflict),
            _ => Err(unexpected(response).await),
        }
    }
}
