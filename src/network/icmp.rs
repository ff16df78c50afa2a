//! ICMP echo probe: one request, one classified result

use rand::Rng;
use std::mem::MaybeUninit;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use super::packet::{self, ParsedReply, ReplyKind};
use super::socket::{ProbeSocket, SocketKind};
use super::{ProbeResult, ProbeStatus, Prober};
use crate::utils::resolve_target;
use crate::DiagError;

/// Receive buffer size, enough for an MTU-sized ICMP error
const RECV_BUFFER_SIZE: usize = 1500;

/// Poll interval while waiting on the non-blocking socket
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The production [`Prober`]: real ICMP echo over a fresh socket per call
#[derive(Debug, Clone, Default)]
pub struct IcmpProber;

impl IcmpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, address: &str, timeout: Duration, ttl: Option<u8>) -> ProbeResult {
        probe(address, timeout, ttl).await
    }
}

/// A reply that matched our request
struct Exchange {
    responder: IpAddr,
    kind: ReplyKind,
    round_trip: Duration,
    ipv6: bool,
}

/// Send one echo request to `address` and classify the answer.
///
/// With a `ttl` the probe is sent in traceroute mode: fixed `a` filler, limited
/// hop count and fragmentation disabled. Without it the default ping payload
/// is used. Never fails; problems are reported as [`ProbeStatus::Error`].
pub async fn probe(address: &str, timeout_duration: Duration, ttl: Option<u8>) -> ProbeResult {
    let started = Instant::now();

    if timeout_duration.is_zero() {
        return ProbeResult::error(address, "timeout must be greater than zero");
    }
    if ttl == Some(0) {
        return ProbeResult::error(address, "TTL must be between 1 and 255");
    }

    let outcome = timeout(timeout_duration, exchange(address, ttl)).await;
    let elapsed = started.elapsed();

    let result = match outcome {
        Ok(Ok(exchange)) => {
            let base = ProbeResult::new(address, status_for(exchange.kind))
                .with_responder(exchange.responder)
                .with_round_trip(exchange.round_trip);
            match exchange.kind {
                ReplyKind::Unreachable(code) => {
                    base.with_message(packet::unreachable_reason(code, exchange.ipv6))
                }
                _ => base,
            }
        }
        Ok(Err(e)) => ProbeResult::error(address, e.to_string()),
        Err(_) => ProbeResult::new(address, ProbeStatus::TimedOut),
    };

    log::debug!(
        "probe {} ttl={:?} -> {} ({:.2} ms)",
        address,
        ttl,
        result.status,
        elapsed.as_secs_f64() * 1000.0
    );

    result.with_wall_clock(elapsed)
}

fn status_for(kind: ReplyKind) -> ProbeStatus {
    match kind {
        ReplyKind::EchoReply => ProbeStatus::Success,
        ReplyKind::TimeExceeded => ProbeStatus::TtlExceeded,
        ReplyKind::Unreachable(_) => ProbeStatus::Error,
    }
}

/// Resolve, send, and wait for the matching reply. Bounded by the caller's timeout.
async fn exchange(address: &str, ttl: Option<u8>) -> crate::Result<Exchange> {
    let target = resolve_target(address).await?;

    // Dropped on every return path, which closes the descriptor
    let socket = ProbeSocket::open(target)?;
    let ipv6 = socket.is_ipv6();

    let payload: &[u8] = match ttl {
        Some(ttl) => {
            socket.set_ttl(ttl)?;
            if let Err(e) = socket.set_dont_fragment() {
                log::warn!("Could not disable fragmentation for {}: {}", target, e);
            }
            packet::TRACE_PAYLOAD
        }
        None => packet::DEFAULT_PAYLOAD,
    };

    let (identifier, sequence) = {
        let mut rng = rand::thread_rng();
        (rng.gen::<u16>(), rng.gen::<u16>())
    };
    let request = packet::build_echo_request(identifier, sequence, payload, ipv6);

    socket.send_to(&request, target)?;
    let sent_at = Instant::now();

    let reply = wait_for_reply(&socket, target, identifier, sequence).await?;

    Ok(Exchange {
        responder: reply.0,
        kind: reply.1.kind,
        round_trip: sent_at.elapsed(),
        ipv6,
    })
}

/// Poll the socket until a message answering our request arrives
async fn wait_for_reply(
    socket: &ProbeSocket,
    target: IpAddr,
    identifier: u16,
    sequence: u16,
) -> crate::Result<(IpAddr, ParsedReply)> {
    // Allocated once per probe and reused by every poll
    let mut buffer = [MaybeUninit::<u8>::uninit(); RECV_BUFFER_SIZE];
    let check_identifier = socket.kind() == SocketKind::Raw;

    loop {
        match socket.try_recv(&mut buffer) {
            Ok(Some((data, source))) => {
                let parsed = packet::parse_reply(data, socket.includes_ip_header(), socket.is_ipv6());
                match parsed {
                    Some(reply) if reply.matches(identifier, sequence, check_identifier) => {
                        // Echo replies must come from the target itself
                        if reply.kind == ReplyKind::EchoReply && source != target {
                            continue;
                        }
                        return Ok((source, reply));
                    }
                    // Someone else's traffic on a raw socket
                    _ => continue,
                }
            }
            Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
            Err(e) => {
                return Err(DiagError::NetworkError(format!("receive failed: {}", e)));
            }
        }
    }
}
