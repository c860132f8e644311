// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Registration transport.
//!
//! [`RegistrationClient`] is the seam the rule cache talks through; the
//! [`HttpRegistrationClient`] implementation posts the payload as JSON to the
//! config server and hands back the status code together with the decoded
//! body, leaving success/failure classification to the cache.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::RegistrationError;
use crate::registration::{RegistrationPayload, RegistrationResult};

/// Path of the registration endpoint relative to the config server base URL.
pub const REGISTRATION_PATH: &str = "/rest/v1/relays/register";

/// Raw outcome of a registration round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResponse {
    pub status: u16,
    /// Decoded body. `None` when the server sent nothing or `null`, and for
    /// non-success statuses, whose bodies are never decoded.
    pub body: Option<RegistrationResult>,
}

impl RegistrationResponse {
    pub fn new(status: u16, body: Option<RegistrationResult>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait RegistrationClient: Send + Sync {
    /// Sends one registration request. Transport and decode problems are
    /// returned as errors; any HTTP status is returned as a response.
    async fn register(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<RegistrationResponse, RegistrationError>;

    /// Endpoint the client registers against, used in log records.
    fn registration_url(&self) -> &str;
}

/// Builds the registration endpoint URL from a config server base URL.
pub fn registration_url(config_server_base_url: &str) -> String {
    format!(
        "{}{}",
        config_server_base_url.trim_end_matches('/'),
        REGISTRATION_PATH
    )
}

/// [`RegistrationClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpRegistrationClient {
    client: Client,
    registration_url: String,
}

impl HttpRegistrationClient {
    /// Builds a client with rustls TLS, a per-request timeout and an optional
    /// HTTPS proxy.
    pub fn new(
        config_server_base_url: &str,
        timeout: Duration,
        https_proxy: Option<&str>,
    ) -> Result<Self, RegistrationError> {
        let mut builder = Client::builder().use_rustls_tls().timeout(timeout);
        if let Some(proxy) = https_proxy {
            let proxy = reqwest::Proxy::https(proxy)
                .map_err(RegistrationError::Client)?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(RegistrationError::Client)?;

        Ok(Self {
            client,
            registration_url: registration_url(config_server_base_url),
        })
    }
}

#[async_trait]
impl RegistrationClient for HttpRegistrationClient {
    async fn register(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<RegistrationResponse, RegistrationError> {
        debug!(
            url = %self.registration_url,
            metric_prefix = payload.metric_prefix(),
            host = payload.host(),
            "config server registration request"
        );

        let response = self
            .client
            .post(&self.registration_url)
            .json(payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                status = status.as_u16(),
                body = %body,
                "config server rejected registration"
            );
            return Ok(RegistrationResponse::new(status.as_u16(), None));
        }

        let bytes = response.bytes().await?;
        let body = decode_result(&bytes)?;
        Ok(RegistrationResponse::new(status.as_u16(), body))
    }

    fn registration_url(&self) -> &str {
        &self.registration_url
    }
}

fn decode_result(bytes: &[u8]) -> Result<Option<RegistrationResult>, RegistrationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(serde_json::from_slice::<Option<RegistrationResult>>(bytes)?)
}
