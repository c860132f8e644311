// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relay registration with a central config server.
//!
//! A relay announces its identity to the config server and receives the
//! relay rules it should route with. [`RuleCache`] keeps the rules from the
//! last successful registration and serves them to any number of concurrent
//! readers while refreshes happen in the background.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod refresh_loop;
pub mod registration;
pub mod rule;

pub use cache::{CacheState, RuleCache};
pub use client::{HttpRegistrationClient, RegistrationClient, RegistrationResponse};
pub use config::RegistrarConfig;
pub use error::{ConfigError, RegistrationError};
pub use metrics::{
    CompositeMetrics, CountingMetrics, MetricsSink, MetricsSnapshot, RegistrationCounters,
    StatsdMetrics,
};
pub use refresh_loop::spawn_refresh_loop;
pub use registration::{RegistrationPayload, RegistrationResult};
pub use rule::RelayRule;
