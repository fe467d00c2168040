//! Caller identity resolution
//!
//! The actor id is the client IP. The single privileged actor (host) is the
//! machine running the server: its LAN address or any loopback address.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::server::AppContext;
use crate::error::{Error, Result};

/// Identity of the client making a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    /// Actor id used for quotas, ownership and usernames
    pub ip: String,
    pub is_host: bool,
}

impl Caller {
    /// Fail with 403 unless the caller is the host
    pub fn require_host(&self) -> Result<()> {
        if self.is_host {
            Ok(())
        } else {
            Err(Error::Forbidden("only the host may do this".to_string()))
        }
    }
}

/// Decides which connections belong to the host
#[derive(Debug, Clone)]
pub struct HostIdentity {
    server_ip: IpAddr,
    trust_proxy_headers: bool,
}

impl HostIdentity {
    pub fn new(server_ip: IpAddr, trust_proxy_headers: bool) -> Self {
        Self {
            server_ip,
            trust_proxy_headers,
        }
    }

    /// Use the configured host address, or detect the LAN address
    pub fn from_config(host_ip: Option<&str>, trust_proxy_headers: bool) -> Self {
        let server_ip = match host_ip.map(str::parse::<IpAddr>) {
            Some(Ok(ip)) => ip,
            Some(Err(e)) => {
                warn!("Invalid host_ip in config ({}); detecting instead", e);
                detect_server_ip()
            }
            None => detect_server_ip(),
        };
        Self::new(server_ip, trust_proxy_headers)
    }

    pub fn server_ip(&self) -> IpAddr {
        self.server_ip
    }

    /// Resolve the caller from request headers and the socket peer
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Caller {
        let raw = self
            .forwarded_ip(headers)
            .or_else(|| peer.map(|p| p.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let (ip, is_host) = match raw.parse::<IpAddr>() {
            Ok(addr) => {
                let addr = unmap(addr);
                (addr.to_string(), self.is_host_ip(addr))
            }
            Err(_) => (raw, false),
        };

        Caller { ip, is_host }
    }

    pub fn is_host_ip(&self, ip: IpAddr) -> bool {
        let ip = unmap(ip);
        ip.is_loopback() || ip == unmap(self.server_ip)
    }

    fn forwarded_ip(&self, headers: &HeaderMap) -> Option<String> {
        if !self.trust_proxy_headers {
            return None;
        }
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|first| first.trim().to_string())
            .or_else(|| header("x-real-ip").map(str::to_string))
    }
}

/// `::ffff:a.b.c.d` -> `a.b.c.d`
fn unmap(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// LAN address of this machine
///
/// Connecting a UDP socket selects the outbound interface without sending
/// anything. Falls back to 127.0.0.1.
pub fn detect_server_ip() -> IpAddr {
    let fallback = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let detected = UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip());

    match detected {
        Ok(ip) if !ip.is_unspecified() => {
            debug!("Detected server LAN address {}", ip);
            ip
        }
        Ok(_) => fallback,
        Err(e) => {
            warn!("Could not detect LAN address ({}); only loopback is treated as host", e);
            fallback
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    AppContext: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let ctx = AppContext::from_ref(state);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ctx.identity.resolve(&parts.headers, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn server() -> HostIdentity {
        HostIdentity::new("192.168.1.10".parse().unwrap(), false)
    }

    fn peer(ip: &str) -> Option<SocketAddr> {
        Some(SocketAddr::new(ip.parse().unwrap(), 50000))
    }

    #[test]
    fn test_peer_address_is_actor() {
        let caller = server().resolve(&HeaderMap::new(), peer("192.168.1.50"));
        assert_eq!(caller.ip, "192.168.1.50");
        assert!(!caller.is_host);
    }

    #[test]
    fn test_server_ip_and_loopback_are_host() {
        assert!(server().resolve(&HeaderMap::new(), peer("192.168.1.10")).is_host);
        assert!(server().resolve(&HeaderMap::new(), peer("127.0.0.1")).is_host);
        assert!(server().resolve(&HeaderMap::new(), peer("::1")).is_host);
    }

    #[test]
    fn test_ipv4_mapped_address_is_unmapped() {
        let caller = server().resolve(&HeaderMap::new(), peer("::ffff:192.168.1.10"));
        assert_eq!(caller.ip, "192.168.1.10");
        assert!(caller.is_host);
    }

    #[test]
    fn test_forwarded_headers_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("127.0.0.1"));

        let caller = server().resolve(&headers, peer("192.168.1.50"));
        assert_eq!(caller.ip, "192.168.1.50");
        assert!(!caller.is_host);
    }

    #[test]
    fn test_forwarded_headers_when_trusted() {
        let identity = HostIdentity::new("192.168.1.10".parse().unwrap(), true);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("192.168.1.77, 10.0.0.1"));
        assert_eq!(identity.resolve(&headers, peer("10.0.0.1")).ip, "192.168.1.77");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.78"));
        assert_eq!(identity.resolve(&headers, peer("10.0.0.1")).ip, "192.168.1.78");
    }

    #[test]
    fn test_missing_peer() {
        let caller = server().resolve(&HeaderMap::new(), None);
        assert_eq!(caller.ip, "unknown");
        assert!(!caller.is_host);
    }

    #[test]
    fn test_require_host() {
        let guest = Caller { ip: "192.168.1.50".into(), is_host: false };
        assert!(matches!(guest.require_host(), Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_from_config_prefers_configured_ip() {
        let identity = HostIdentity::from_config(Some("192.168.1.99"), false);
        assert_eq!(identity.server_ip(), "192.168.1.99".parse::<IpAddr>().unwrap());
    }
}
