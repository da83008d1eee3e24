use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;
use tracing::{error, info, warn};

/// Address of the client that sent the request, if one could be determined.
///
/// Inserted into request extensions by [`request_log_middleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

/// Resolves the client address.
///
/// Checks `X-Forwarded-For` (first hop) first, then `X-Real-IP`, then the TCP
/// peer. A header that is present but unparseable yields `None`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(forwarded) = header("x-forwarded-for") {
        return forwarded.split(',').next()?.trim().parse().ok();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.trim().parse().ok();
    }
    peer.map(|addr| addr.ip())
}

/// Logs every request with its method, uri, client ip, status and latency,
/// and records the client address for handlers.
pub async fn request_log_middleware(mut request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);
    request.extensions_mut().insert(ClientIp(ip));

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    let ip = ip.as_ref().map(ToString::to_string).unwrap_or_default();
    if response.status().is_server_error() {
        error!(%method, %uri, %ip, status, latency_ms, "Request error");
    } else if response.status().is_client_error() {
        warn!(%method, %uri, %ip, status, latency_ms, "Request rejected");
    } else {
        info!(%method, %uri, %ip, status, latency_ms, "Request");
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::Ipv4Addr;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from((Ipv4Addr::new(127, 0, 0, 1), 40000)))
    }

    #[test]
    fn test_peer_address_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(
            client_ip(&headers, peer()),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(client_ip(&headers, None), None);
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            client_ip(&headers, peer()),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn test_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(
            client_ip(&headers, peer()),
            Some("2001:db8::1".parse().unwrap())
        );
    }

    #[test]
    fn test_garbage_header_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_ip(&headers, peer()), None);
    }
}
