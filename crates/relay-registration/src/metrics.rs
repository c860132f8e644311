// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Registration metrics.
//!
//! The rule cache reports every attempt through [`MetricsSink`]. This module
//! ships three sinks: atomic counters the host can read back, a DogStatsD
//! emitter, and a fan-out that combines several sinks.

use std::fmt;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Counter name for successful registrations.
pub const REGISTRATION_SUCCESS_METRIC: &str = "configServer.registration.success";
/// Counter name for failed registrations.
pub const REGISTRATION_FAILURE_METRIC: &str = "configServer.registration.failed";

/// Destination for registration outcome counts. Implementations must not
/// panic and must not block for long; they run on the refresh path.
pub trait MetricsSink: Send + Sync {
    fn increment_registration_success(&self);
    fn increment_registration_failure(&self);
}

/// Registration counters (relaxed atomics).
#[derive(Debug, Default)]
pub struct RegistrationCounters {
    success: AtomicU64,
    failure: AtomicU64,
}

impl RegistrationCounters {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registration_success: self.success.load(Ordering::Relaxed),
            registration_failure: self.failure.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RegistrationCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub registration_success: u64,
    pub registration_failure: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "registration_success={}, registration_failure={}",
            self.registration_success, self.registration_failure
        )
    }
}

/// Sink that keeps counts in memory so the host can export or inspect them.
#[derive(Debug, Clone, Default)]
pub struct CountingMetrics {
    counters: Arc<RegistrationCounters>,
}

impl CountingMetrics {
    pub fn new(counters: Arc<RegistrationCounters>) -> Self {
        Self { counters }
    }

    pub fn counters(&self) -> Arc<RegistrationCounters> {
        self.counters.clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.counters.snapshot()
    }
}

impl MetricsSink for CountingMetrics {
    fn increment_registration_success(&self) {
        self.counters.success.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_registration_failure(&self) {
        self.counters.failure.fetch_add(1, Ordering::Relaxed);
    }
}

/// Sink that emits DogStatsD counters over UDP.
///
/// Sends are fire-and-forget on a non-blocking socket; a dropped datagram
/// only costs one count.
#[derive(Debug)]
pub struct StatsdMetrics {
    socket: UdpSocket,
    target: SocketAddr,
    namespace: Option<String>,
}

impl StatsdMetrics {
    /// Binds an ephemeral local socket that sends to `target`. An invalid
    /// `namespace` is logged and ignored.
    pub fn new(target: SocketAddr, namespace: Option<&str>) -> std::io::Result<Self> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            target,
            namespace: namespace.and_then(parse_metric_namespace),
        })
    }

    fn line(&self, metric: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}.{metric}:1|c"),
            None => format!("{metric}:1|c"),
        }
    }

    fn send(&self, metric: &str) {
        let line = self.line(metric);
        if let Err(err) = self.socket.send_to(line.as_bytes(), self.target) {
            debug!(target_addr = %self.target, error = %err, "failed to send statsd counter {metric}");
        }
    }
}

impl MetricsSink for StatsdMetrics {
    fn increment_registration_success(&self) {
        self.send(REGISTRATION_SUCCESS_METRIC);
    }

    fn increment_registration_failure(&self) {
        self.send(REGISTRATION_FAILURE_METRIC);
    }
}

/// Sink that forwards every call to each registered sink in order.
#[derive(Default)]
pub struct CompositeMetrics {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl CompositeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl fmt::Debug for CompositeMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeMetrics")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl MetricsSink for CompositeMetrics {
    fn increment_registration_success(&self) {
        for sink in &self.sinks {
            sink.increment_registration_success();
        }
    }

    fn increment_registration_failure(&self) {
        for sink in &self.sinks {
            sink.increment_registration_failure();
        }
    }
}

/// Validates a statsd namespace: it must start with an ASCII letter and
/// contain only ASCII alphanumerics, underscores and periods. Surrounding
/// whitespace is trimmed.
pub fn parse_metric_namespace(namespace: &str) -> Option<String> {
    let trimmed = namespace.trim();
    let first = trimmed.chars().next()?;
    if !first.is_ascii_alphabetic() {
        tracing::error!(
            "statsd namespace must start with a letter, got: '{}'. Ignoring namespace.",
            trimmed
        );
        return None;
    }
    if let Some(invalid) = trimmed
        .chars()
        .find(|&ch| !ch.is_ascii_alphanumeric() && ch != '_' && ch != '.')
    {
        tracing::error!(
            "statsd namespace contains invalid character '{}' in '{}'. Ignoring namespace.",
            invalid,
            trimmed
        );
        return None;
    }
    Some(trimmed.to_string())
}
