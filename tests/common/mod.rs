//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use netpath::geo::{GeoInfo, GeoLookup, GeoStatus};
use netpath::map::{MapCommand, MapSink};
use netpath::{DiagError, ProbeResult, ProbeStatus, Prober};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCall {
    pub address: String,
    pub timeout: Duration,
    pub ttl: Option<u8>,
}

/// Prober answering from a script keyed by address (pings) or TTL (traces)
pub struct ScriptedProber {
    by_address: HashMap<String, ProbeStatus>,
    by_ttl: HashMap<u8, (ProbeStatus, Option<IpAddr>, Option<String>)>,
    default_status: ProbeStatus,
    delay: Duration,
    calls: Mutex<Vec<ProbeCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(default_status: ProbeStatus) -> Self {
        Self {
            by_address: HashMap::new(),
            by_ttl: HashMap::new(),
            default_status,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn address(mut self, address: &str, status: ProbeStatus) -> Self {
        self.by_address.insert(address.to_string(), status);
        self
    }

    pub fn hop(mut self, ttl: u8, status: ProbeStatus, responder: Option<&str>) -> Self {
        let responder = responder.map(|ip| ip.parse().unwrap());
        self.by_ttl.insert(ttl, (status, responder, None));
        self
    }

    pub fn failing_hop(mut self, ttl: u8, message: &str) -> Self {
        self.by_ttl.insert(ttl, (ProbeStatus::Error, None, Some(message.to_string())));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls sent with a TTL, i.e. trace hops
    pub fn ttls(&self) -> Vec<u8> {
        self.calls().iter().filter_map(|call| call.ttl).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: &str, timeout: Duration, ttl: Option<u8>) -> ProbeResult {
        self.calls.lock().unwrap().push(ProbeCall {
            address: address.to_string(),
            timeout,
            ttl,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let result = match ttl {
            Some(ttl) => match self.by_ttl.get(&ttl) {
                Some((status, responder, message)) => {
                    let mut result = ProbeResult::new(address, *status);
                    if let Some(ip) = responder {
                        result = result.with_responder(*ip);
                    }
                    if let Some(message) = message {
                        result = result.with_message(message.clone());
                    }
                    result
                }
                None => ProbeResult::new(address, self.default_status),
            },
            None => {
                let status = self
                    .by_address
                    .get(address)
                    .copied()
                    .unwrap_or(self.default_status);
                let result = ProbeResult::new(address, status);
                match address.parse::<IpAddr>() {
                    Ok(ip) if status == ProbeStatus::Success => result.with_responder(ip),
                    _ => result,
                }
            }
        };

        result
            .with_round_trip(Duration::from_millis(3))
            .with_wall_clock(Duration::from_micros(3_420))
    }
}

/// Geo lookup recording every address it is asked about
#[derive(Default)]
pub struct RecordingGeo {
    lookups: Mutex<Vec<String>>,
    failing: bool,
    without_coordinates: bool,
}

impl RecordingGeo {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Successful answers that omit latitude and longitude
    pub fn without_coordinates() -> Self {
        Self {
            without_coordinates: true,
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GeoLookup for RecordingGeo {
    async fn lookup(&self, address: &str) -> netpath::Result<GeoInfo> {
        self.lookups.lock().unwrap().push(address.to_string());
        if self.failing {
            return Err(DiagError::GeoLookupError("service unavailable".to_string()));
        }
        if self.without_coordinates {
            return Ok(GeoInfo {
                status: GeoStatus::Success,
                country: Some("Testland".to_string()),
                city: None,
                isp: None,
                lat: None,
                lon: None,
                message: None,
            });
        }
        Ok(GeoInfo {
            status: GeoStatus::Success,
            country: Some("Testland".to_string()),
            city: Some("O'Hare".to_string()),
            isp: Some("Example <Net>".to_string()),
            lat: Some(41.97),
            lon: Some(-87.9),
            message: None,
        })
    }
}

/// Map sink recording commands in submission order
#[derive(Default)]
pub struct RecordingMap {
    commands: Mutex<Vec<MapCommand>>,
}

impl RecordingMap {
    pub fn commands(&self) -> Vec<MapCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl MapSink for RecordingMap {
    fn submit(&self, command: MapCommand) {
        self.commands.lock().unwrap().push(command);
    }
}
