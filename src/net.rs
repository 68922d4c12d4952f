use std::net::{IpAddr, Ipv4Addr, UdpSocket};

// Nothing is sent: connecting a UDP socket only selects a route.
const ROUTE_PROBE: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 1);

/// Best-effort LAN address of this machine, for display only.
///
/// Picks the local address the OS would use to reach a public host. Any
/// failure falls back to loopback.
pub fn local_ip() -> IpAddr {
    route_local_ip().unwrap_or_else(|e| {
        tracing::debug!("Cannot determine local address, using loopback: {}", e);
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    })
}

fn route_local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect(ROUTE_PROBE)?;
    Ok(socket.local_addr()?.ip())
}
