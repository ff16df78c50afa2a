//! netpath - network path diagnostics
//!
//! ICMP reachability sweeps and TTL-stepped path tracing with geo enrichment.

pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod geo;
pub mod map;
pub mod network;
pub mod output;
pub mod trace;
pub mod utils;

// Re-export commonly used types
pub use config::DiagConfig;
pub use diagnostics::{Diagnostics, PingReport};
pub use discovery::{ReachabilityScanner, ScanOutcome, ScanReport, ScanRequest};
pub use error::DiagError;
pub use geo::{GeoInfo, GeoLookup};
pub use map::{DeferredMap, MapCommand, MapSink};
pub use network::{IcmpProber, ProbeResult, ProbeStatus, Prober};
pub use trace::{HopRecord, PathTracer, TraceOptions, TraceReport, TraceTermination};

pub type Result<T> = std::result::Result<T, DiagError>;
