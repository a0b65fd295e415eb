//! Client identity for rate limiting.
//!
//! Authenticated callers are keyed by user id. Anonymous callers are keyed
//! by a hash of (client IP, user agent); the IP is resolved through the
//! usual proxy headers in priority order, accepting only well-formed public
//! addresses, before falling back to the socket peer.

use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Proxy headers consulted in priority order.
const PROXY_HEADERS: [&str; 6] = [
    "cf-connecting-ip",
    "true-client-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-cluster-client-ip",
    "forwarded-for",
];

/// A stable identity string for one caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    /// Identity for an authenticated user.
    pub fn user(user_id: &str) -> Self {
        Self(format!("user:{}", user_id))
    }

    /// Identity for an anonymous caller.
    pub fn anonymous(ip: IpAddr, user_agent: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(ip.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(user_agent.as_bytes());
        let digest = hasher.finalize();
        Self(format!("anon:{}", hex::encode(&digest[..16])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolve the client IP from request headers, falling back to the socket
/// peer address. `headers` is a lowercase-name lookup supplied by the
/// HTTP layer.
pub fn resolve_client_ip<'a, F>(header: F, peer: IpAddr) -> IpAddr
where
    F: Fn(&str) -> Option<&'a str>,
{
    for name in PROXY_HEADERS {
        if let Some(raw) = header(name) {
            // X-Forwarded-For may carry a chain; the first hop is the client.
            let candidate = raw.split(',').next().unwrap_or("").trim();
            if let Some(ip) = parse_public_ip(candidate) {
                return ip;
            }
        }
    }
    peer
}

/// Parse a candidate as an IP and require it to be publicly routable.
/// Spoofed headers carrying private or loopback ranges are ignored.
fn parse_public_ip(candidate: &str) -> Option<IpAddr> {
    let ip: IpAddr = candidate.parse().ok()?;
    let public = match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    };
    public.then_some(ip)
}
