//! GeoIP location resolution.
//!
//! Implements the `lookup(ip) -> String` contract the login-history check
//! consumes: `""` when disabled or unresolvable, `"内网IP"` for private
//! and local address space, otherwise a hyphen-joined
//! `Country-Subdivision-City` string localized to the configured language
//! with an `en` fallback, skipping unresolved parts.
//!
//! The database handle is shared read-only across concurrently running
//! checks; [`GeoIpResolver::reload`] swaps it under the write lock.

use std::net::IpAddr;
use std::path::Path;

use maxminddb::geoip2;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::GeoIpConfig;

/// Label returned for private, loopback, and link-local addresses.
pub const PRIVATE_IP_LABEL: &str = "内网IP";

/// Shared GeoIP resolver.
pub struct GeoIpResolver {
    reader: RwLock<Option<maxminddb::Reader<Vec<u8>>>>,
    language: String,
    enabled: bool,
}

impl GeoIpResolver {
    /// Builds a resolver from configuration. A missing or unreadable
    /// database downgrades to lookups returning `""`; it never fails the
    /// audit.
    pub fn from_config(config: &GeoIpConfig) -> Self {
        let reader = if config.enabled {
            match maxminddb::Reader::open_readfile(&config.db_path) {
                Ok(reader) => Some(reader),
                Err(e) => {
                    warn!(path = %config.db_path.display(), error = %e, "GeoIP database unavailable");
                    None
                }
            }
        } else {
            None
        };

        Self {
            reader: RwLock::new(reader),
            language: config.language.clone(),
            enabled: config.enabled,
        }
    }

    /// A resolver that always returns `""` for routable addresses.
    pub fn disabled() -> Self {
        Self {
            reader: RwLock::new(None),
            language: "zh-CN".to_string(),
            enabled: false,
        }
    }

    /// Replaces the database under the write lock.
    pub fn reload(&self, db_path: &Path) -> crate::error::Result<()> {
        let reader = maxminddb::Reader::open_readfile(db_path)
            .map_err(|e| crate::error::Error::Internal(format!("GeoIP reload failed: {e}")))?;
        *self.reader.write() = Some(reader);
        Ok(())
    }

    /// Resolves an IP string to a location label.
    pub fn lookup(&self, ip: &str) -> String {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return String::new();
        };

        if is_private_ip(&addr) {
            return PRIVATE_IP_LABEL.to_string();
        }

        if !self.enabled {
            return String::new();
        }

        let guard = self.reader.read();
        let Some(reader) = guard.as_ref() else {
            return String::new();
        };

        let city: geoip2::City = match reader.lookup(addr) {
            Ok(city) => city,
            Err(e) => {
                debug!(ip, error = %e, "GeoIP lookup failed");
                return String::new();
            }
        };

        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(name) = city
            .country
            .as_ref()
            .and_then(|c| localized(c.names.as_ref(), &self.language))
        {
            parts.push(name);
        }
        if let Some(name) = city
            .subdivisions
            .as_ref()
            .and_then(|s| s.first())
            .and_then(|s| localized(s.names.as_ref(), &self.language))
        {
            parts.push(name);
        }
        if let Some(name) = city
            .city
            .as_ref()
            .and_then(|c| localized(c.names.as_ref(), &self.language))
        {
            parts.push(name);
        }

        parts.join("-")
    }
}

fn localized<'a>(
    names: Option<&'a std::collections::BTreeMap<&'a str, &'a str>>,
    language: &str,
) -> Option<&'a str> {
    let names = names?;
    names
        .get(language)
        .or_else(|| names.get("en"))
        .copied()
}

/// RFC1918, loopback, link-local, CGNAT, ULA, and v6-loopback detection.
pub fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local
                || (segments[0] & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_private_v4_ranges() {
        for ip in ["10.0.0.1", "172.16.4.2", "192.168.1.1", "127.0.0.1", "169.254.0.5"] {
            assert!(is_private_ip(&ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn test_private_v6_ranges() {
        for ip in ["::1", "fd12:3456:789a::1", "fe80::1"] {
            assert!(is_private_ip(&ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn test_public_addresses() {
        for ip in ["8.8.8.8", "203.0.113.5", "2001:4860:4860::8888"] {
            assert!(!is_private_ip(&ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn test_lookup_private_label() {
        let resolver = GeoIpResolver::disabled();
        assert_eq!(resolver.lookup("10.0.0.1"), PRIVATE_IP_LABEL);
        assert_eq!(resolver.lookup("::1"), PRIVATE_IP_LABEL);
    }

    #[test]
    fn test_lookup_disabled_returns_empty() {
        let resolver = GeoIpResolver::disabled();
        assert_eq!(resolver.lookup("8.8.8.8"), "");
    }

    #[test]
    fn test_lookup_garbage_returns_empty() {
        let resolver = GeoIpResolver::disabled();
        assert_eq!(resolver.lookup("not-an-ip"), "");
        assert_eq!(resolver.lookup("localhost"), "");
    }
}
