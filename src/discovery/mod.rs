//! Optional mDNS/zeroconf service advertisement (SPEC_FULL.md §1.2).
//!
//! Detected as a capability at startup, the same way `supervisor::HostTelemetry`
//! detects host telemetry: present when the `mdns` feature is compiled in and
//! `[SERVER] ENABLE_MDNS` is true, absent otherwise. Advertisement is
//! best-effort; a daemon that can't bind its mDNS responder still serves HTTP
//! normally.

use tracing::{info, warn};

#[cfg(feature = "mdns")]
pub struct ServiceAdvertiser {
    daemon: mdns_sd::ServiceDaemon,
    fullname: String,
}

#[cfg(feature = "mdns")]
impl ServiceAdvertiser {
    /// Register `_penareia._tcp.local.` for `service_name` on `port`. Returns
    /// `None` (logged, not propagated) on any mDNS failure.
    pub fn advertise(service_name: &str, port: u16) -> Option<Self> {
        let daemon = match mdns_sd::ServiceDaemon::new() {
            Ok(d) => d,
            Err(e) => {
                warn!("mDNS daemon failed to start: {}", e);
                return None;
            }
        };

        let host_name = format!("{service_name}.local.");
        let service_info = match mdns_sd::ServiceInfo::new(
            "_penareia._tcp.local.",
            service_name,
            &host_name,
            "",
            port,
            None,
        ) {
            Ok(info) => info.enable_addr_auto(),
            Err(e) => {
                warn!("mDNS service info construction failed: {}", e);
                return None;
            }
        };

        let fullname = service_info.get_fullname().to_string();
        if let Err(e) = daemon.register(service_info) {
            warn!("mDNS service registration failed: {}", e);
            return None;
        }

        info!("Advertising mDNS service {}", fullname);
        Some(Self { daemon, fullname })
    }
}

#[cfg(feature = "mdns")]
impl Drop for ServiceAdvertiser {
    fn drop(&mut self) {
        let _ = self.daemon.unregister(&self.fullname);
    }
}

#[cfg(not(feature = "mdns"))]
pub struct ServiceAdvertiser;

#[cfg(not(feature = "mdns"))]
impl ServiceAdvertiser {
    pub fn advertise(_service_name: &str, _port: u16) -> Option<Self> {
        None
    }
}
