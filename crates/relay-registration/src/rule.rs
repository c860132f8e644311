// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single relay rule handed out by the config server.
///
/// The pattern is kept as the raw string the server sent; compiling and
/// evaluating it is left to whoever routes metrics with the rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelayRule {
    #[serde(rename = "regex")]
    pattern: String,
    destination: String,
}

impl RelayRule {
    pub fn new(pattern: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            destination: destination.into(),
        }
    }

    /// Match pattern for metric names.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Relay target metrics matching [`RelayRule::pattern`] are sent to.
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl fmt::Display for RelayRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pattern, self.destination)
    }
}
