//! Network module: the ICMP echo probe primitive and its socket/packet plumbing

pub mod icmp;
pub mod packet;
pub mod socket;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

pub use icmp::IcmpProber;

/// Classified outcome of a single echo probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// Echo reply received from the probed address
    Success,
    /// No reply before the deadline
    TimedOut,
    /// A router reported that the hop limit expired en route
    TtlExceeded,
    /// Anything else: unreachable, resolution or socket failure
    Error,
}

impl ProbeStatus {
    /// Get the display name of the status
    pub fn name(&self) -> &'static str {
        match self {
            ProbeStatus::Success => "Success",
            ProbeStatus::TimedOut => "TimedOut",
            ProbeStatus::TtlExceeded => "TtlExceeded",
            ProbeStatus::Error => "Error",
        }
    }

    /// A router or the destination answered
    pub fn is_response(&self) -> bool {
        matches!(self, ProbeStatus::Success | ProbeStatus::TtlExceeded)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one probe. Never mutated after the probe returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Address or hostname as the caller supplied it
    pub target_address: String,
    /// Host that answered (destination or an intermediate router)
    pub responder: Option<IpAddr>,
    pub status: ProbeStatus,
    /// Send-to-reply time in whole milliseconds
    pub round_trip_millis: u64,
    /// Wall-clock time around the whole probe call
    pub wall_clock_millis: f64,
    /// Failure description, set when `status` is `Error`
    pub message: Option<String>,
}

impl ProbeResult {
    pub fn new(target_address: impl Into<String>, status: ProbeStatus) -> Self {
        Self {
            target_address: target_address.into(),
            responder: None,
            status,
            round_trip_millis: 0,
            wall_clock_millis: 0.0,
            message: None,
        }
    }

    pub fn error(target_address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(target_address, ProbeStatus::Error).with_message(message)
    }

    pub fn with_responder(mut self, responder: IpAddr) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_round_trip(mut self, round_trip: Duration) -> Self {
        self.round_trip_millis = round_trip.as_millis() as u64;
        self
    }

    pub fn with_wall_clock(mut self, elapsed: Duration) -> Self {
        self.wall_clock_millis = elapsed.as_secs_f64() * 1000.0;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ProbeStatus::Success
    }

    /// Status text shown for failed probes: the message when there is one
    pub fn status_text(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => self.status.name().to_string(),
        }
    }
}

/// Something that can send one echo probe.
///
/// Implementations must not fail: every problem is reported through
/// [`ProbeStatus::Error`] on the returned result.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration, ttl: Option<u8>) -> ProbeResult;
}
