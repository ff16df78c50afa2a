//! Path tracer - the TTL state machine
//!
//! Each TTL is probed only after the previous hop, including its geo lookup, is
//! complete. Hops are yielded lazily so callers can render them as they arrive.

use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::{HopRecord, TraceOptions, ERROR_ADDRESS, NO_RESPONSE};
use crate::geo::{self, GeoLookup};
use crate::map::{hop_label, MapCommand, MapSink};
use crate::network::{ProbeResult, ProbeStatus, Prober};
use crate::utils::{format_millis, resolve_target};

/// Loopback address of the warm-up probe
pub const WARMUP_ADDRESS: &str = "127.0.0.1";

/// Default warm-up timeout
pub const DEFAULT_WARMUP_TIMEOUT: Duration = Duration::from_millis(100);

/// Geo label of hops without a responder
const NO_GEO: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Map not cleared and warm-up not sent yet
    Start,
    Probing(u8),
    Finished,
}

struct TraceState {
    tracer: PathTracer,
    target: String,
    /// Address every hop is sent to, fixed before the first hop
    probe_address: String,
    options: TraceOptions,
    phase: Phase,
}

/// Drives TTL-stepped probes toward one target
#[derive(Clone)]
pub struct PathTracer {
    prober: Arc<dyn Prober>,
    geo: Arc<dyn GeoLookup>,
    map: Arc<dyn MapSink>,
    warmup_timeout: Duration,
}

impl PathTracer {
    pub fn new(prober: Arc<dyn Prober>, geo: Arc<dyn GeoLookup>, map: Arc<dyn MapSink>) -> Self {
        Self {
            prober,
            geo,
            map,
            warmup_timeout: DEFAULT_WARMUP_TIMEOUT,
        }
    }

    pub fn with_warmup_timeout(mut self, warmup_timeout: Duration) -> Self {
        self.warmup_timeout = warmup_timeout;
        self
    }

    /// Trace the path to `target`.
    ///
    /// Nothing happens until the stream is polled. The first poll clears the map,
    /// sends the warm-up probe and resolves `target` once; every item is one
    /// completed hop. The stream
    /// ends after the destination answers, after a fatal hop, or after
    /// `options.max_hops` hops.
    pub fn trace(&self, target: &str, options: TraceOptions) -> BoxStream<'static, HopRecord> {
        let target = target.trim().to_string();
        let state = TraceState {
            tracer: self.clone(),
            probe_address: target.clone(),
            target,
            options,
            phase: Phase::Start,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                match state.phase {
                    Phase::Start => {
                        state.probe_address = state.tracer.prepare(&state.target).await;
                        state.phase = Phase::Probing(1);
                    }
                    Phase::Probing(ttl) if ttl > state.options.max_hops => {
                        log::info!(
                            "Trace to {} ended after {} hops without reaching it",
                            state.target,
                            state.options.max_hops
                        );
                        state.phase = Phase::Finished;
                    }
                    Phase::Probing(ttl) => {
                        let (hop, next) = state
                            .tracer
                            .probe_hop(&state.probe_address, ttl, state.options.hop_timeout)
                            .await;
                        state.phase = next;
                        return Some((hop, state));
                    }
                    Phase::Finished => return None,
                }
            }
        })
        .boxed()
    }

    /// Clear the map, warm up, and pin the address all hops are sent to
    async fn prepare(&self, target: &str) -> String {
        log::info!("Tracing route to {}", target);
        self.map.submit(MapCommand::Clear);

        // Absorbs one-time socket setup cost so hop 1 is not skewed
        let warmup = self.prober.probe(WARMUP_ADDRESS, self.warmup_timeout, None).await;
        log::debug!("Warm-up probe: {} ({:.2} ms)", warmup.status, warmup.wall_clock_millis);

        match resolve_target(target).await {
            Ok(ip) => {
                if ip.to_string() != target {
                    log::info!("{} resolved to {}", target, ip);
                }
                ip.to_string()
            }
            Err(e) => {
                // Hop 1 reports the failure through the prober
                log::warn!("Could not resolve {}: {}", target, e);
                target.to_string()
            }
        }
    }

    /// Probe one TTL and decide what comes next
    async fn probe_hop(&self, target: &str, ttl: u8, timeout: Duration) -> (HopRecord, Phase) {
        let result = self.prober.probe(target, timeout, Some(ttl)).await;

        match result.status {
            status if status.is_response() => {
                let hop = self.resolved_hop(ttl, &result).await;
                let next = if result.status == ProbeStatus::Success {
                    log::info!("Destination {} reached at hop {}", target, ttl);
                    Phase::Finished
                } else {
                    next_ttl(ttl)
                };
                (hop, next)
            }
            ProbeStatus::TimedOut => {
                let hop = HopRecord {
                    hop_index: ttl,
                    address: NO_RESPONSE.to_string(),
                    status: result.status,
                    local_time_label: format_millis(result.wall_clock_millis),
                    network_time_label: "Timeout".to_string(),
                    geo_label: NO_GEO.to_string(),
                    latitude: None,
                    longitude: None,
                };
                (hop, next_ttl(ttl))
            }
            _ => {
                let status_text = result.status_text();
                log::warn!("Trace to {} stopped at hop {}: {}", target, ttl, status_text);
                let hop = HopRecord {
                    hop_index: ttl,
                    address: ERROR_ADDRESS.to_string(),
                    status: result.status,
                    local_time_label: format_millis(result.wall_clock_millis),
                    network_time_label: status_text.clone(),
                    geo_label: status_text,
                    latitude: None,
                    longitude: None,
                };
                (hop, Phase::Finished)
            }
        }
    }

    /// Hop answered by a router or the destination: enrich and plot it
    async fn resolved_hop(&self, ttl: u8, result: &ProbeResult) -> HopRecord {
        let address = result
            .responder
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| result.target_address.clone());

        let geo_info = geo::resolve_hop(self.geo.as_ref(), &address).await;
        let geo_label = geo_info.label();
        let coordinates = geo_info.coordinates();

        if let Some((lat, lon)) = coordinates {
            self.map.submit(MapCommand::AddPoint {
                lat,
                lon,
                label: hop_label(ttl, &address, &geo_label),
            });
        }

        HopRecord {
            hop_index: ttl,
            address,
            status: result.status,
            local_time_label: format_millis(result.wall_clock_millis),
            network_time_label: format!("{} ms", result.round_trip_millis),
            geo_label,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lon)| lon),
        }
    }
}

fn next_ttl(ttl: u8) -> Phase {
    ttl.checked_add(1).map(Phase::Probing).unwrap_or(Phase::Finished)
}
