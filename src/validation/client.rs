//! Decision service client.
//!
//! # Responsibilities
//! - POST the encoded descriptor to the validation endpoint
//! - Bound the call with the configured deadline
//! - Hand back status, headers and body untouched
//!
//! # Design Decisions
//! - Exactly one attempt per request
//! - A late response after the deadline is dropped, see [`race_deadline`]

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::ValidationConfig;
use crate::resilience::{race_deadline, DeadlineError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Raw answer from the decision service.
#[derive(Debug, Clone)]
pub struct DecisionResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl DecisionResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Reasons the decision service produced no usable response.
#[derive(Debug, Clone, Error)]
pub enum ValidatorError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("decision service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("validation call aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for ValidatorError {
    fn from(e: reqwest::Error) -> Self {
        ValidatorError::Transport(e.to_string())
    }
}

/// Something that can answer a validation request.
#[async_trait]
pub trait DecisionService: Send + Sync + 'static {
    /// Send one encoded descriptor and return the raw response.
    async fn validate(&self, body: String) -> Result<DecisionResponse, ValidatorError>;
}

/// Decision service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDecisionService {
    client: reqwest::Client,
    endpoint: String,
}

/// Multiple of the validation deadline after which a detached call is dropped.
const TRANSPORT_BACKSTOP_FACTOR: u32 = 10;

impl HttpDecisionService {
    pub fn new(config: &ValidationConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(transport_timeout(config))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

/// Hard limit on one HTTP exchange with the decision service.
///
/// The deadline race never cancels a call, so a service that hangs would
/// otherwise keep the detached task and its connection alive forever.
pub fn transport_timeout(config: &ValidationConfig) -> Duration {
    config.timeout() * TRANSPORT_BACKSTOP_FACTOR
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    async fn validate(&self, body: String) -> Result<DecisionResponse, ValidatorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(DecisionResponse {
            status,
            headers,
            body,
        })
    }
}

/// Runs one validation call against a deadline.
#[derive(Clone)]
pub struct RemoteValidator {
    service: Arc<dyn DecisionService>,
    deadline: Duration,
}

impl RemoteValidator {
    pub fn new(service: Arc<dyn DecisionService>, deadline: Duration) -> Self {
        Self { service, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Call the decision service, giving up after the deadline.
    ///
    /// On timeout the call keeps running in the background and its result
    /// is discarded.
    pub async fn call(&self, body: String) -> Result<DecisionResponse, ValidatorError> {
        let service = self.service.clone();

        match race_deadline(async move { service.validate(body).await }, self.deadline).await {
            Ok(result) => result,
            Err(DeadlineError::Elapsed(deadline)) => Err(ValidatorError::Timeout(deadline)),
            Err(DeadlineError::Aborted(reason)) => Err(ValidatorError::Aborted(reason)),
        }
    }
}
