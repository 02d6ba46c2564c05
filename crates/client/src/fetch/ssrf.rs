//! SSRF (Server-Side Request Forgery) protection.
//!
//! Targets come straight from inbound request paths, so every outbound
//! host is checked against private, internal, and reserved ranges before
//! a connection is made.
use std::net::IpAddr;

use ipnet::IpNet;
use url::{Host, Url};

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("missing host")]
    MissingHost,

    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),
}

/// Ranges that `std` has no stable predicate for.
const EXTRA_BLOCKED: &[&str] = &["100.64.0.0/10", "fc00::/7", "fe80::/10"];

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Carrier-grade NAT (100.64/10)
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
/// - IPv4-mapped IPv6 forms of all of the above
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    let blocked_by_std = match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(v4));
            }
            v6.is_loopback() || v6.is_multicast() || v6.is_unspecified()
        }
    };

    blocked_by_std
        || EXTRA_BLOCKED
            .iter()
            .filter_map(|cidr| cidr.parse::<IpNet>().ok())
            .any(|net| net.contains(&ip))
}

/// Validate that an IP address is not private or reserved.
///
/// Returns an error if the IP is blocked.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Literal IP of a URL host, if the host is not a domain name.
fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        Host::Domain(_) => None,
    }
}

/// Resolve the URL host and validate every address it maps to.
pub async fn validate_url(url: &Url) -> Result<(), SsrfError> {
    if let Some(ip) = literal_ip(url) {
        return validate_ip(ip);
    }

    let host = url.host_str().ok_or(SsrfError::MissingHost)?;
    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SsrfError::DnsError(format!("{host}: {e}")))?;

    let mut resolved = false;
    for addr in addrs {
        validate_ip(addr.ip())?;
        resolved = true;
    }

    if resolved { Ok(()) } else { Err(SsrfError::DnsError(format!("{host}: no addresses"))) }
}
