//! SSRF (Server-Side Request Forgery) protection.
//!
//! The domain in an avatar request comes straight from the caller, and the
//! image URL comes from a page the caller controls. Both are checked so the
//! service cannot be pointed at private, internal, or reserved addresses.
use std::net::IpAddr;

use url::{Host, Url};

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
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
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is not private or reserved.
///
/// Returns an error if the IP is blocked.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Check a URL's host without touching DNS.
///
/// Literal IPs are validated directly and `localhost` names are refused.
/// Returns `Ok(true)` when the host is a name that still needs resolving.
pub fn check_literal_host(url: &Url) -> Result<bool, SsrfError> {
    match url.host() {
        Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)).map(|()| false),
        Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)).map(|()| false),
        Some(Host::Domain(name)) => {
            let name = name.trim_end_matches('.');
            if name.eq_ignore_ascii_case("localhost") || name.to_ascii_lowercase().ends_with(".localhost") {
                Err(SsrfError::BlockedHost(name.to_string()))
            } else {
                Ok(true)
            }
        }
        None => Err(SsrfError::BlockedHost(url.to_string())),
    }
}

/// Validate every address the URL's host resolves to.
pub async fn check_url(url: &Url) -> Result<(), SsrfError> {
    if !check_literal_host(url)? {
        return Ok(());
    }

    let host = url.host_str().unwrap_or_default();
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SsrfError::DnsError(format!("{host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(SsrfError::DnsError(format!("{host}: no addresses")));
    }

    for addr in addrs {
        validate_ip(addr.ip())?;
    }

    Ok(())
}
