// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use relay_registration::{
    spawn_refresh_loop, CompositeMetrics, CountingMetrics, HttpRegistrationClient,
    MetricsSink, RegistrarConfig, RuleCache, StatsdMetrics,
};

#[tokio::main]
pub async fn main() {
    // Install logging before parsing so config diagnostics are not dropped.
    init_logging(&RegistrarConfig::log_level_from_env());
    let config = match RegistrarConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid relay registrar configuration: {err}. Shutting down.");
            return;
        }
    };
    debug!("Starting relay registrar");

    let client = match HttpRegistrationClient::new(
        &config.config_server_base_url,
        config.timeout,
        config.https_proxy.as_deref(),
    ) {
        Ok(client) => client,
        Err(err) => {
            error!("Unable to build registration client: {err}. Shutting down.");
            return;
        }
    };

    let counting = CountingMetrics::default();
    let mut metrics = CompositeMetrics::new().with_sink(Arc::new(counting.clone()));
    if let Some(addr) = config.statsd_addr {
        match StatsdMetrics::new(addr, config.statsd_namespace.as_deref()) {
            Ok(statsd) => {
                info!("Sending registration metrics to statsd at {addr}");
                metrics = metrics.with_sink(Arc::new(statsd));
            }
            Err(err) => error!("Unable to open statsd socket for {addr}: {err}"),
        }
    }
    let metrics: Arc<dyn MetricsSink> = Arc::new(metrics);

    let cache = Arc::new(RuleCache::new(config.payload(), Arc::new(client), metrics).await);
    match cache.effective_rules() {
        Some(rules) => {
            info!("Relay registered with {} effective rules", rules.len());
            for rule in rules.iter() {
                debug!("relay rule {rule}");
            }
        }
        None => error!("Initial registration failed; relay rules are not yet available"),
    }

    let cancel = CancellationToken::new();
    let refresh_handle = if config.refresh_interval.is_zero() {
        info!("Periodic rule refresh disabled");
        None
    } else {
        info!(
            "Refreshing relay rules every {} seconds",
            config.refresh_interval.as_secs()
        );
        Some(spawn_refresh_loop(
            cache.clone(),
            config.refresh_interval,
            cancel.clone(),
        ))
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {err}");
    }
    info!("Shutdown signal received, stopping relay registrar");

    cancel.cancel();
    if let Some(handle) = refresh_handle {
        if let Err(err) = handle.await {
            error!("Rule refresh task ended abnormally: {err}");
        }
    }
    info!("Final registration counters: {}", counting.snapshot());
}

fn init_logging(log_level: &str) {
    let env_filter = format!("h2=off,hyper=off,reqwest=off,rustls=off,{log_level}");
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}
