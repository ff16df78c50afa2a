//! Address parsing: sweep prefixes, host suffixes, and probe targets

use std::net::{IpAddr, Ipv4Addr};

use crate::DiagError;

/// A dotted three-octet IPv4 prefix such as `192.168.1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Prefix([u8; 3]);

impl Ipv4Prefix {
    /// Parse a prefix, tolerating surrounding whitespace and a trailing dot
    pub fn parse(input: &str) -> crate::Result<Self> {
        let trimmed = input.trim().trim_end_matches('.');
        let parts: Vec<&str> = trimmed.split('.').collect();

        if parts.len() != 3 {
            return Err(DiagError::InvalidTarget(format!(
                "'{}' is not a three-octet IPv4 prefix (expected e.g. 192.168.1)",
                input.trim()
            )));
        }

        let mut octets = [0u8; 3];
        for (octet, part) in octets.iter_mut().zip(&parts) {
            *octet = part.parse::<u8>().map_err(|_| {
                DiagError::InvalidTarget(format!("'{}' is not a valid octet in '{}'", part, input.trim()))
            })?;
        }

        Ok(Self(octets))
    }

    /// Full address for one host suffix
    pub fn host(&self, suffix: u8) -> Ipv4Addr {
        Ipv4Addr::new(self.0[0], self.0[1], self.0[2], suffix)
    }
}

impl std::fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Parse a host suffix bound (0-255) given as text
pub fn parse_suffix(input: &str, which: &str) -> crate::Result<u8> {
    let trimmed = input.trim();
    trimmed.parse::<u8>().map_err(|_| {
        DiagError::InvalidRange(format!(
            "{} value '{}' must be a whole number between 0 and 255",
            which, trimmed
        ))
    })
}

/// Reject empty probe targets before anything is sent
pub fn require_target(input: &str) -> crate::Result<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DiagError::InvalidTarget("Please enter an address".to_string()));
    }
    Ok(trimmed)
}

/// Resolve a hostname or literal address to one IP, preferring IPv4
pub async fn resolve_target(target: &str) -> crate::Result<IpAddr> {
    let trimmed = target.trim();
    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Ok(ip);
    }
    // Bracketed IPv6 literal
    if let Ok(ip) = trimmed.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((trimmed, 0))
        .await
        .map_err(|e| DiagError::InvalidTarget(format!("could not resolve '{}': {}", trimmed, e)))?
        .map(|addr| addr.ip())
        .collect();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| DiagError::InvalidTarget(format!("'{}' has no addresses", trimmed)))
}
