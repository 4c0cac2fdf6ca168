//! Networking: TCP game server and LAN advertisement
//!
//! This module provides:
//! - TCP server hosting rooms for any number of clients (default port 3001
//!   with auto-increment)
//! - Length-prefixed JSON protocol between clients and the server
//! - mDNS-SD advertisement so clients on the local network can find the server

#[cfg(test)]
pub mod client;
pub mod dispatch;
pub mod peer;
pub mod protocol;
pub mod server;

pub use server::Server;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use thiserror::Error;

/// Chameleon service type for mDNS discovery
pub const SERVICE_TYPE: &str = "_chameleon._tcp.local.";

/// Current protocol version
pub const PROTOCOL_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),
}

/// Advertises this server on the local network
pub struct ServiceDiscovery {
    daemon: ServiceDaemon,
    instance_name: String,
    registered: bool,
}

impl ServiceDiscovery {
    /// Create a new service discovery instance
    ///
    /// `instance_name` must be unique on the network.
    pub fn new(instance_name: impl Into<String>) -> Result<Self, DiscoveryError> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            instance_name: instance_name.into(),
            registered: false,
        })
    }

    /// Advertise the server listening on `port`
    pub fn advertise(&mut self, port: u16) -> Result<(), DiscoveryError> {
        let port_text = port.to_string();
        let properties = [("version", PROTOCOL_VERSION), ("port", port_text.as_str())];
        let hostname = format!("{}.local.", self.instance_name);

        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            &self.instance_name,
            &hostname,
            (),
            port,
            &properties[..],
        )?
        .enable_addr_auto();

        self.daemon.register(service_info)?;
        self.registered = true;
        Ok(())
    }

    /// Full DNS-SD name of the advertised service
    pub fn fullname(&self) -> String {
        format!("{}.{}", self.instance_name, SERVICE_TYPE)
    }

    /// Stop advertising on the network
    pub fn stop_advertising(&mut self) -> Result<(), DiscoveryError> {
        if std::mem::take(&mut self.registered) {
            self.daemon.unregister(&self.fullname())?;
        }
        Ok(())
    }

    /// Shutdown the discovery service
    pub fn shutdown(mut self) -> Result<(), DiscoveryError> {
        self.stop_advertising()?;
        self.daemon.shutdown()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdns_sd::ServiceEvent;
    use rand::Rng;
    use std::time::{Duration, Instant};

    #[test]
    fn test_service_type_format() {
        assert!(SERVICE_TYPE.starts_with('_'));
        assert!(SERVICE_TYPE.ends_with(".local."));
    }

    #[test]
    fn test_fullname() {
        let discovery = ServiceDiscovery::new("chameleon-abc").unwrap();
        assert_eq!(discovery.fullname(), "chameleon-abc._chameleon._tcp.local.");
        discovery.shutdown().unwrap();
    }

    #[test]
    fn test_mdns_advertise_and_browse_same_machine() {
        let instance = format!("chameleon-test-{:08x}", rand::rng().random::<u32>());
        let mut host = ServiceDiscovery::new(instance.clone()).unwrap();
        host.advertise(55999).unwrap();

        let browser = ServiceDaemon::new().unwrap();
        let receiver = browser.browse(SERVICE_TYPE).unwrap();

        let hostname = format!("{}.local.", instance);
        let mut found = false;
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(10) {
            match receiver.recv_timeout(Duration::from_millis(500)) {
                Ok(ServiceEvent::ServiceResolved(info)) if info.get_hostname() == hostname => {
                    let properties = info.get_properties();
                    assert_eq!(properties.get_property_val_str("version"), Some(PROTOCOL_VERSION));
                    assert_eq!(properties.get_property_val_str("port"), Some("55999"));
                    assert_eq!(info.get_port(), 55999);
                    found = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(found, "browser should discover {} within 10s", instance);

        let _ = browser.stop_browse(SERVICE_TYPE);
        let _ = browser.shutdown();
        host.shutdown().unwrap();
    }
}
