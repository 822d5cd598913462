//! TCP connect checks of well-known service ports on every local interface.

use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

use crate::error::ProbeResult;
use crate::host::Host;

/// A well-known port and the service usually behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePort {
    /// TCP port
    pub port: u16,
    /// Service label
    pub service: &'static str,
}

impl ServicePort {
    /// Label a port
    #[must_use]
    pub const fn new(port: u16, service: &'static str) -> Self {
        Self { port, service }
    }
}

/// Services from `ports` that accept TCP connections on any non-loopback
/// interface address, ordered by port.
///
/// All dials run concurrently, each bounded by `timeout`.
pub async fn listening_services(
    host: &dyn Host,
    ports: &[ServicePort],
    timeout: Duration,
) -> ProbeResult<Vec<ServicePort>> {
    let addrs = host.interface_addrs()?;

    let dials = addrs.iter().flat_map(|ip| {
        ports.iter().map(move |sp| {
            let addr = SocketAddr::new(*ip, sp.port);
            async move { (*sp, addr, host.dial(addr, timeout).await) }
        })
    });

    let mut open = BTreeMap::new();
    for (sp, addr, reachable) in join_all(dials).await {
        if reachable {
            debug!(%addr, service = sp.service, "service reachable");
            open.insert(sp.port, sp);
        }
    }
    Ok(open.into_values().collect())
}

/// `"SSH(22) VNC(5900)"`
pub(crate) fn describe(services: &[ServicePort]) -> String {
    services
        .iter()
        .map(|sp| format!("{}({})", sp.service, sp.port))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    const PORTS: &[ServicePort] = &[
        ServicePort::new(5900, "VNC"),
        ServicePort::new(22, "SSH"),
        ServicePort::new(3389, "RDP"),
    ];

    #[tokio::test]
    async fn reports_each_service_once_in_port_order() {
        let host = FakeHost::new()
            .addr("192.168.1.20")
            .addr("10.0.0.4")
            .listening("192.168.1.20:5900")
            .listening("10.0.0.4:5900")
            .listening("10.0.0.4:22");

        let found = listening_services(&host, PORTS, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(describe(&found), "SSH(22) VNC(5900)");
    }

    #[tokio::test]
    async fn no_interfaces_means_nothing_exposed() {
        let host = FakeHost::new().listening("10.0.0.4:22");
        let found = listening_services(&host, PORTS, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
