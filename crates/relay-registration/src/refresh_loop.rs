// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::RuleCache;

const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(1);
/// Upper bound on the period; larger values would overflow `Instant` math
/// when the ticker schedules its next deadline.
const MAX_REFRESH_PERIOD: Duration = Duration::from_secs(86400 * 365 * 30);

/// Spawns a task that refreshes `cache` every `period` until `cancel` fires.
///
/// The first refresh happens one period after spawning, since
/// [`RuleCache::new`] already registered once. A refresh in flight when the
/// token is cancelled runs to completion before the task exits. Periods
/// longer than thirty years are capped.
pub fn spawn_refresh_loop(
    cache: Arc<RuleCache>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = period.clamp(MIN_REFRESH_PERIOD, MAX_REFRESH_PERIOD);
    tokio::spawn(async move {
        let now = Instant::now();
        let start = now
            .checked_add(period)
            .or_else(|| now.checked_add(MIN_REFRESH_PERIOD))
            .unwrap_or(now);
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(period_ms = period.as_millis() as u64, "rule refresh loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("rule refresh loop shutting down");
                    break;
                }
                _ = ticker.tick() => cache.refresh().await,
            }
        }
    })
}
