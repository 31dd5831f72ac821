//! Local/remote peer classification.
//!
//! Classification only affects logging: peers on the trusted subnet are
//! logged at `debug`, everyone else at `info`.

use ipnet::{IpNet, Ipv4Net};
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::{debug, warn};

/// Network whose members count as local.
///
/// Loopback addresses are always local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedSubnet {
    net: Option<IpNet>,
}

impl TrustedSubnet {
    pub fn new(net: IpNet) -> Self {
        Self { net: Some(net) }
    }

    /// Only loopback peers are local.
    pub fn loopback_only() -> Self {
        Self { net: None }
    }

    /// Use the configured subnet, or detect one.
    pub fn from_config(subnet: Option<IpNet>) -> Self {
        subnet.map_or_else(Self::detect, Self::new)
    }

    /// Derive the /24 of the address the host routes outbound traffic from.
    ///
    /// Connecting a UDP socket sends nothing; it only asks the kernel to
    /// pick a source address.
    pub fn detect() -> Self {
        match outbound_ipv4() {
            Some(addr) => match Ipv4Net::new(addr, 24) {
                Ok(net) => {
                    let net = IpNet::V4(net.trunc());
                    debug!(subnet = %net, "Detected local subnet");
                    Self::new(net)
                }
                Err(_) => Self::loopback_only(),
            },
            None => {
                warn!("Unable to detect local subnet, only loopback peers are local");
                Self::loopback_only()
            }
        }
    }

    pub fn net(&self) -> Option<IpNet> {
        self.net
    }

    pub fn is_local(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
            v4 => v4,
        };
        ip.is_loopback() || self.net.is_some_and(|net| net.contains(&ip))
    }
}

fn outbound_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(addr) if !addr.is_unspecified() && !addr.is_loopback() => Some(addr),
        _ => None,
    }
}
