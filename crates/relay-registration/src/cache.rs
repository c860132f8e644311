// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Relay rule cache.
//!
//! The cache owns the rules obtained from the last successful registration.
//! Reads go through an `ArcSwapOption`, so they never wait on a refresh and
//! always see a whole snapshot. Refreshes are serialized by an async mutex
//! that only the refresh path takes.
//!
//! ```text
//! reader  -> RuleCache::effective_rules() -> ArcSwapOption::load_full()
//! refresh -> lock -> RegistrationClient::register() -> ArcSwapOption::store()
//! ```

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::client::RegistrationClient;
use crate::error::RegistrationError;
use crate::metrics::MetricsSink;
use crate::registration::{RegistrationPayload, RegistrationResult};
use crate::rule::RelayRule;

/// Whether the cache holds rules yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No registration has succeeded so far.
    Uninitialized,
    /// At least one registration succeeded; a snapshot is available.
    Ready,
}

/// Shared, periodically refreshed snapshot of relay rules.
pub struct RuleCache {
    payload: RegistrationPayload,
    client: Arc<dyn RegistrationClient>,
    metrics: Arc<dyn MetricsSink>,
    relay_rules: ArcSwapOption<Vec<RelayRule>>,
    audit_rules: ArcSwap<Vec<RelayRule>>,
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCache")
            .field("registration_url", &self.client.registration_url())
            .field("payload", &self.payload)
            .field("state", &self.state())
            .finish()
    }
}

impl RuleCache {
    /// Builds the cache and performs the first registration before
    /// returning. A failed first attempt leaves the cache uninitialized.
    pub async fn new(
        payload: RegistrationPayload,
        client: Arc<dyn RegistrationClient>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let cache = Self::unregistered(payload, client, metrics);
        info!(
            "Config server rule cache initialised. Registration URL {}",
            cache.client.registration_url()
        );
        cache.refresh().await;
        cache
    }

    /// Builds the cache without registering; the caller decides when the
    /// first [`RuleCache::refresh`] happens.
    pub fn unregistered(
        payload: RegistrationPayload,
        client: Arc<dyn RegistrationClient>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            payload,
            client,
            metrics,
            relay_rules: ArcSwapOption::empty(),
            // No source for audit rules exists yet; they stay empty.
            audit_rules: ArcSwap::from_pointee(Vec::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Performs exactly one registration attempt.
    ///
    /// On success the effective rules are replaced wholesale. On any failure
    /// the previous snapshot stays in place; the failure is counted and
    /// logged, never returned. Concurrent calls run one after another.
    pub async fn refresh(&self) {
        let _guard = self.refresh_lock.lock().await;

        match self.register().await {
            Ok(result) => {
                let specific = result.specific_relay_rules().len();
                let generic = result.generic_relay_rules().len();
                self.relay_rules
                    .store(Some(Arc::new(result.into_effective_rules())));
                self.metrics.increment_registration_success();
                info!(
                    specific_rules = specific,
                    generic_rules = generic,
                    "Config server registration success"
                );
            }
            Err(err) => {
                self.metrics.increment_registration_failure();
                error!(
                    url = %self.client.registration_url(),
                    error = %err,
                    "Config server registration failed"
                );
            }
        }
    }

    async fn register(&self) -> Result<RegistrationResult, RegistrationError> {
        let response = self.client.register(&self.payload).await?;
        if !response.is_success() {
            return Err(RegistrationError::Status(response.status));
        }
        response.body.ok_or(RegistrationError::MissingBody)
    }

    /// Rules from the last successful registration, specific rules first.
    /// `None` until a registration has succeeded.
    pub fn effective_rules(&self) -> Option<Arc<Vec<RelayRule>>> {
        self.relay_rules.load_full()
    }

    /// Audit rules. Always empty for now.
    pub fn audit_rules(&self) -> Arc<Vec<RelayRule>> {
        self.audit_rules.load_full()
    }

    pub fn state(&self) -> CacheState {
        if self.relay_rules.load().is_some() {
            CacheState::Ready
        } else {
            CacheState::Uninitialized
        }
    }

    /// Identity sent on every registration attempt.
    pub fn payload(&self) -> &RegistrationPayload {
        &self.payload
    }
}
