//! Path tracing: TTL-stepped probes that discover the routers to a target

pub mod engine;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::network::ProbeStatus;

pub use engine::PathTracer;

/// Address recorded for a hop that did not answer
pub const NO_RESPONSE: &str = "*";

/// Address recorded for the terminal hop of a failed trace
pub const ERROR_ADDRESS: &str = "error";

/// One TTL iteration of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopRecord {
    /// TTL used for this hop, starting at 1
    pub hop_index: u8,
    pub address: String,
    pub status: ProbeStatus,
    /// Locally measured time, e.g. `0.84 ms`
    pub local_time_label: String,
    /// Protocol round trip (`1 ms`), `Timeout`, or the failure status text
    pub network_time_label: String,
    pub geo_label: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl HopRecord {
    /// The hop ends the trace
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ProbeStatus::Success | ProbeStatus::Error)
    }
}

/// Per-trace knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceOptions {
    pub max_hops: u8,
    pub hop_timeout: Duration,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            max_hops: 30,
            hop_timeout: Duration::from_millis(1000),
        }
    }
}

impl TraceOptions {
    pub fn with_max_hops(mut self, max_hops: u8) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_hop_timeout(mut self, hop_timeout: Duration) -> Self {
        self.hop_timeout = hop_timeout;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_hops == 0 {
            return Err(crate::DiagError::ConfigError("max hops must be between 1 and 255".to_string()));
        }
        if self.hop_timeout.is_zero() {
            return Err(crate::DiagError::ConfigError("hop timeout must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// How a trace ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceTermination {
    /// The destination answered with an echo reply
    ReachedDestination,
    /// A hop failed with a non-timeout error
    Failed,
    /// `max_hops` probes were sent without reaching the destination
    Exhausted,
}

impl TraceTermination {
    /// Derive the termination from the collected hops
    pub fn from_hops(hops: &[HopRecord]) -> Self {
        match hops.last().map(|hop| hop.status) {
            Some(ProbeStatus::Success) => TraceTermination::ReachedDestination,
            Some(ProbeStatus::Error) => TraceTermination::Failed,
            _ => TraceTermination::Exhausted,
        }
    }
}

/// A finished trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    pub target: String,
    pub hops: Vec<HopRecord>,
    pub termination: TraceTermination,
}

impl TraceReport {
    pub fn new(target: impl Into<String>, hops: Vec<HopRecord>) -> Self {
        let termination = TraceTermination::from_hops(&hops);
        Self {
            target: target.into(),
            hops,
            termination,
        }
    }

    /// Drain a hop stream into a report
    pub async fn collect<S>(target: impl Into<String>, hops: S) -> Self
    where
        S: Stream<Item = HopRecord>,
    {
        Self::new(target, hops.collect().await)
    }

    pub fn reached_destination(&self) -> bool {
        self.termination == TraceTermination::ReachedDestination
    }
}
