//! LAN address detection.
//!
//! Connecting a UDP socket sends nothing on the wire but makes the OS pick the
//! source address it would use for the default route, which is the address
//! other devices on the same network can reach us at.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

/// Non-routed target used only to select a route. Never contacted.
const ROUTE_PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 255, 255, 255), 1);

/// Detect the outbound LAN IPv4 address, if the host has a usable route.
pub fn try_detect_lan_ipv4() -> Option<Ipv4Addr> {
    let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)) {
        Ok(socket) => socket,
        Err(e) => {
            tracing::debug!(error = %e, "Could not open probe socket");
            return None;
        }
    };

    if let Err(e) = socket.connect(ROUTE_PROBE_ADDR) {
        tracing::debug!(error = %e, "No route for LAN address detection");
        return None;
    }

    match socket.local_addr() {
        Ok(SocketAddr::V4(addr)) if !addr.ip().is_unspecified() => Some(*addr.ip()),
        Ok(other) => {
            tracing::debug!(addr = %other, "Probe socket has no usable local address");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "Could not read probe socket address");
            None
        }
    }
}

/// Detect the LAN IPv4 address, falling back to loopback.
pub fn detect_lan_ipv4() -> Ipv4Addr {
    try_detect_lan_ipv4().unwrap_or_else(|| {
        tracing::info!("No LAN address found, falling back to loopback");
        Ipv4Addr::LOCALHOST
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_address_is_specified() {
        // Environment dependent; only the shape of a positive result is checked.
        if let Some(ip) = try_detect_lan_ipv4() {
            assert!(!ip.is_unspecified());
        }
    }

    #[test]
    fn test_detect_never_returns_unspecified() {
        let ip = detect_lan_ipv4();
        assert!(!ip.is_unspecified());
    }
}
