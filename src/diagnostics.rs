//! Operation boundary used by front ends
//!
//! Wires configuration, the prober, the geo adapter, and the map sink together
//! and validates caller input before any probe is sent.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::DiagConfig;
use crate::discovery::{ReachabilityScanner, ScanReport, ScanRequest};
use crate::geo::{DisabledGeo, GeoLookup, IpApiClient};
use crate::map::{MapSink, NullMap};
use crate::network::{IcmpProber, ProbeResult, Prober};
use crate::trace::engine::WARMUP_ADDRESS;
use crate::trace::{HopRecord, PathTracer, TraceOptions};
use crate::utils::require_target;

/// Result of the single-ping operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingReport {
    pub target: String,
    pub result: ProbeResult,
}

/// Ping, scan, and trace operations over shared collaborators
pub struct Diagnostics {
    config: DiagConfig,
    prober: Arc<dyn Prober>,
    geo: Arc<dyn GeoLookup>,
    map: Arc<dyn MapSink>,
}

impl Diagnostics {
    /// Production wiring: ICMP prober, ip-api geo lookups (unless disabled), no map
    pub fn from_config(config: DiagConfig) -> crate::Result<Self> {
        config.validate()?;
        let geo: Arc<dyn GeoLookup> = if config.geo_enabled {
            Arc::new(IpApiClient::from_config(&config)?)
        } else {
            Arc::new(DisabledGeo)
        };

        Ok(Self {
            config,
            prober: Arc::new(IcmpProber::new()),
            geo,
            map: Arc::new(NullMap),
        })
    }

    /// Wire explicit collaborators
    pub fn with_parts(
        config: DiagConfig,
        prober: Arc<dyn Prober>,
        geo: Arc<dyn GeoLookup>,
        map: Arc<dyn MapSink>,
    ) -> Self {
        Self { config, prober, geo, map }
    }

    /// Send trace map commands to `map`
    pub fn with_map(mut self, map: Arc<dyn MapSink>) -> Self {
        self.map = map;
        self
    }

    pub fn config(&self) -> &DiagConfig {
        &self.config
    }

    /// Warm up on loopback, then ping `target` once with the default payload
    pub async fn ping(&self, target: &str) -> crate::Result<PingReport> {
        let target = require_target(target)?;

        let warmup = self
            .prober
            .probe(WARMUP_ADDRESS, self.config.warmup_timeout_duration(), None)
            .await;
        log::debug!("Warm-up probe: {}", warmup.status);

        let result = self
            .prober
            .probe(target, self.config.ping_timeout_duration(), None)
            .await;

        Ok(PingReport {
            target: target.to_string(),
            result,
        })
    }

    /// Validate textual sweep input and run the sweep
    pub async fn start_scan(&self, prefix: &str, start: &str, end: &str) -> crate::Result<ScanReport> {
        let request = ScanRequest::parse(prefix, start, end)?;
        Ok(self.scan(&request).await)
    }

    /// Run a sweep over an already validated request
    pub async fn scan(&self, request: &ScanRequest) -> ScanReport {
        let mut scanner = ReachabilityScanner::new(self.prober.clone(), self.config.scan_timeout_duration());
        if let Some(limit) = self.config.scan_parallel_limit {
            scanner = scanner.with_parallel_limit(limit);
        }
        scanner.scan(request).await
    }

    /// Options for a trace built from the configuration
    pub fn trace_options(&self) -> TraceOptions {
        TraceOptions::default()
            .with_max_hops(self.config.max_hops)
            .with_hop_timeout(self.config.hop_timeout_duration())
    }

    /// Tracer sharing this instance's collaborators
    pub fn tracer(&self) -> PathTracer {
        PathTracer::new(self.prober.clone(), self.geo.clone(), self.map.clone())
            .with_warmup_timeout(self.config.warmup_timeout_duration())
    }

    /// Validate input and start a trace; hops arrive as the stream is polled
    pub fn start_trace(&self, target: &str, options: TraceOptions) -> crate::Result<BoxStream<'static, HopRecord>> {
        let target = require_target(target)?;
        options.validate()?;
        Ok(self.tracer().trace(target, options))
    }
}
