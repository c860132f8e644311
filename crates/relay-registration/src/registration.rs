// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request and response bodies exchanged with the config server's
//! registration endpoint.

use serde::{Deserialize, Serialize};

use crate::rule::RelayRule;

/// Identity this relay announces on every registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    metric_prefix: String,
    host: String,
    avg_metric_volume: u64,
    env: String,
    infrastructure: String,
}

impl RegistrationPayload {
    pub fn new(
        metric_prefix: impl Into<String>,
        host: impl Into<String>,
        avg_metric_volume: u64,
        env: impl Into<String>,
        infrastructure: impl Into<String>,
    ) -> Self {
        Self {
            metric_prefix: metric_prefix.into(),
            host: host.into(),
            avg_metric_volume,
            env: env.into(),
            infrastructure: infrastructure.into(),
        }
    }

    pub fn metric_prefix(&self) -> &str {
        &self.metric_prefix
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Expected average number of metrics per minute this relay will send.
    pub fn avg_metric_volume(&self) -> u64 {
        self.avg_metric_volume
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn infrastructure(&self) -> &str {
        &self.infrastructure
    }
}

/// Rules returned by a successful registration.
///
/// Both lists are required on the wire. Any other fields the server echoes
/// back (the identity it stored, for example) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    specific_relay_rules: Vec<RelayRule>,
    generic_relay_rules: Vec<RelayRule>,
}

impl RegistrationResult {
    pub fn new(specific_relay_rules: Vec<RelayRule>, generic_relay_rules: Vec<RelayRule>) -> Self {
        Self {
            specific_relay_rules,
            generic_relay_rules,
        }
    }

    pub fn specific_relay_rules(&self) -> &[RelayRule] {
        &self.specific_relay_rules
    }

    pub fn generic_relay_rules(&self) -> &[RelayRule] {
        &self.generic_relay_rules
    }

    /// Consumes the result and returns the rules in evaluation order:
    /// every specific rule, then every generic rule.
    pub fn into_effective_rules(self) -> Vec<RelayRule> {
        let mut rules = self.specific_relay_rules;
        rules.extend(self.generic_relay_rules);
        rules
    }
}
