// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Reasons a single registration attempt did not produce rules.
///
/// The rule cache treats every variant the same way: the attempt is counted
/// as failed and the previous snapshot is kept.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Connection, TLS, DNS or timeout failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Config server answered outside the 2xx range.
    #[error("unexpected response status: {0}")]
    Status(u16),

    /// Success status but the body was not a valid registration result.
    #[error("failed to decode registration response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Success status with an empty or `null` body.
    #[error("registration response carried no body")]
    MissingBody,

    /// The HTTP client could not be built.
    #[error("failed to build registration client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Errors raised while loading or validating [`crate::config::RegistrarConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
