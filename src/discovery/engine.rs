//! Reachability scanner - concurrent fan-out of echo probes

use super::*;
use crate::network::Prober;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Sweeps a suffix range under one IPv4 prefix with one probe per address
pub struct ReachabilityScanner {
    prober: Arc<dyn Prober>,
    timeout: Duration,
    semaphore: Option<Arc<Semaphore>>,
}

impl ReachabilityScanner {
    /// Create a scanner with the given per-address timeout and no concurrency cap
    pub fn new(prober: Arc<dyn Prober>, timeout: Duration) -> Self {
        Self {
            prober,
            timeout,
            semaphore: None,
        }
    }

    /// Limit how many probes are in flight at once
    pub fn with_parallel_limit(mut self, limit: usize) -> Self {
        self.semaphore = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// Probe every address of the request concurrently and wait for all of them.
    ///
    /// Outcomes keep the input order. A probe that errors counts as unreachable
    /// and never affects the others.
    pub async fn scan(&self, request: &ScanRequest) -> ScanReport {
        let addresses = request.addresses();
        let started = Instant::now();
        log::info!(
            "Scanning {}.{} to {}.{} ({} addresses)",
            request.prefix,
            request.start,
            request.prefix,
            request.end,
            addresses.len()
        );

        let tasks = addresses.into_iter().map(|address| self.probe_one(address));
        let outcomes = join_all(tasks).await;

        let report = ScanReport {
            prefix: request.prefix.to_string(),
            start: request.start,
            end: request.end,
            outcomes,
        };

        log::info!(
            "Scan finished in {:?}: {} of {} reachable",
            started.elapsed(),
            report.reachable_count(),
            report.outcomes.len()
        );
        report
    }

    async fn probe_one(&self, address: String) -> ScanOutcome {
        // Held until this probe completes; closed semaphores never happen here
        let _permit = match &self.semaphore {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        let result = self.prober.probe(&address, self.timeout, None).await;
        if let Some(message) = &result.message {
            log::debug!("{} unreachable: {}", address, message);
        }

        let reachable = result.is_success();
        ScanOutcome {
            address,
            reachable,
            status: result.status,
            round_trip_millis: reachable.then_some(result.round_trip_millis),
        }
    }
}
