//! Host discovery: ICMP reachability sweeps over an IPv4 suffix range

pub mod engine;

use serde::{Deserialize, Serialize};

use crate::network::ProbeStatus;
use crate::utils::{parse_suffix, Ipv4Prefix};

pub use engine::ReachabilityScanner;

/// Reachability of a single swept address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub address: String,
    pub reachable: bool,
    /// Probe status behind `reachable`
    pub status: ProbeStatus,
    pub round_trip_millis: Option<u64>,
}

/// All outcomes of one sweep, in input (suffix) order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub prefix: String,
    pub start: u8,
    pub end: u8,
    pub outcomes: Vec<ScanOutcome>,
}

impl ScanReport {
    /// Number of hosts that answered
    pub fn reachable_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.reachable).count()
    }

    pub fn reachable(&self) -> impl Iterator<Item = &ScanOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.reachable)
    }
}

/// A validated sweep request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub prefix: Ipv4Prefix,
    pub start: u8,
    pub end: u8,
}

impl ScanRequest {
    pub fn new(prefix: Ipv4Prefix, start: u8, end: u8) -> Self {
        Self { prefix, start, end }
    }

    /// Validate textual input as it comes from a form or command line
    pub fn parse(prefix: &str, start: &str, end: &str) -> crate::Result<Self> {
        Ok(Self {
            prefix: Ipv4Prefix::parse(prefix)?,
            start: parse_suffix(start, "Start")?,
            end: parse_suffix(end, "End")?,
        })
    }

    /// Addresses to probe. Empty when `start > end`.
    pub fn addresses(&self) -> Vec<String> {
        (self.start..=self.end)
            .map(|suffix| self.prefix.host(suffix).to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}
