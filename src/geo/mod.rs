//! Geo enrichment for discovered hops
//!
//! The lookup itself is an external service behind [`GeoLookup`]. This module
//! owns the policy around it: which addresses are never looked up, how a
//! failed lookup degrades, and how a result is turned into a display label.

pub mod ip_api;

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub use ip_api::IpApiClient;

/// Label used when a lookup fails or returns nothing usable
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// Placeholder for unspecified and loopback addresses
pub const LOCAL_HOST: &str = "Local host";

/// Placeholder for private and link-local ranges
pub const LOCAL_NETWORK: &str = "Local network";

/// Prefixes that are treated as private without parsing the address
const PRIVATE_PREFIXES: [&str; 5] = ["10.", "192.168.", "172.", "fe80:", "fd"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoStatus {
    Success,
    Fail,
}

/// Location and operator metadata for one address (ip-api.com schema)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub status: GeoStatus,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Failure reason reported by the service
    #[serde(default)]
    pub message: Option<String>,
}

impl GeoInfo {
    /// A failed lookup, optionally carrying a placeholder city label
    pub fn fail(city: Option<&str>) -> Self {
        Self {
            status: GeoStatus::Fail,
            country: None,
            city: city.map(str::to_string),
            isp: None,
            lat: None,
            lon: None,
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GeoStatus::Success
    }

    /// `Country, City (ISP)` from whichever fields are present on success,
    /// otherwise the placeholder city or [`UNKNOWN_LOCATION`]
    pub fn label(&self) -> String {
        if !self.is_success() {
            return self.city.clone().unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        }

        let place = [&self.country, &self.city]
            .into_iter()
            .filter_map(|field| present(field))
            .collect::<Vec<_>>()
            .join(", ");

        match (place.is_empty(), present(&self.isp)) {
            (true, None) => UNKNOWN_LOCATION.to_string(),
            (true, Some(isp)) => isp.to_string(),
            (false, None) => place,
            (false, Some(isp)) => format!("{} ({})", place, isp),
        }
    }

    /// Coordinates, only when the lookup succeeded and reported both of them
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if !self.is_success() {
            return None;
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// External geolocation service
#[async_trait::async_trait]
pub trait GeoLookup: Send + Sync {
    /// Look up one public address. Errors are degraded by the caller.
    async fn lookup(&self, address: &str) -> crate::Result<GeoInfo>;
}

/// Geo lookup that never leaves the host; every address is unknown
#[derive(Debug, Clone, Default)]
pub struct DisabledGeo;

#[async_trait::async_trait]
impl GeoLookup for DisabledGeo {
    async fn lookup(&self, _address: &str) -> crate::Result<GeoInfo> {
        Ok(GeoInfo::fail(None))
    }
}

/// Placeholder label for addresses that must never be looked up
pub fn local_placeholder(address: &str) -> Option<&'static str> {
    let address = address.trim();
    if address.is_empty() || address == "0.0.0.0" || address == "::1" {
        return Some(LOCAL_HOST);
    }
    if PRIVATE_PREFIXES.iter().any(|prefix| address.starts_with(prefix)) {
        return Some(LOCAL_NETWORK);
    }

    match address.parse::<IpAddr>() {
        Ok(ip) if ip.is_loopback() || ip.is_unspecified() => Some(LOCAL_HOST),
        Ok(IpAddr::V4(v4)) if v4.is_private() || v4.is_link_local() => Some(LOCAL_NETWORK),
        _ => None,
    }
}

/// Resolve the geo info of a hop address.
///
/// Local addresses short-circuit to their placeholder without calling `lookup`.
/// A failing lookup yields an unknown location instead of an error.
pub async fn resolve_hop(lookup: &dyn GeoLookup, address: &str) -> GeoInfo {
    if let Some(placeholder) = local_placeholder(address) {
        return GeoInfo::fail(Some(placeholder));
    }

    match lookup.lookup(address).await {
        Ok(info) => info,
        Err(e) => {
            log::warn!("Geo lookup for {} failed: {}", address, e);
            GeoInfo::fail(None)
        }
    }
}
