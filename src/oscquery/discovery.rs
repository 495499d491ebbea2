//! DNS-SD discovery of the remote OSCQuery endpoint
//!
//! Browses `_oscjson._tcp` until a service whose instance name carries the
//! configured fragment resolves, then hands back enough to build the HTTP
//! query root. Polling repeats at the configured interval until the overall
//! deadline, if any, expires.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};
use tracing::debug;

use crate::error::{Error, Result};

/// Service type the remote advertises its HTTP query root under
pub const OSCQUERY_SERVICE: &str = "_oscjson._tcp.local.";

/// Service type for plain OSC input endpoints
pub const OSC_SERVICE: &str = "_osc._udp.local.";

/// Resolved remote service endpoint
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    /// Instance name as advertised
    pub name: String,
    pub host: IpAddr,
    pub port: u16,
}

impl ServiceHandle {
    /// HTTP query root for this endpoint
    pub fn http_root(&self) -> String {
        format!("http://{}", SocketAddr::new(self.host, self.port))
    }
}

/// Browse until a matching OSCQuery service resolves
///
/// Blocks its calling task between poll rounds; run it on the startup path,
/// never from a request handler. With no timeout the wait is unbounded.
pub async fn find_service(
    daemon: &ServiceDaemon,
    name_fragment: &str,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<ServiceHandle> {
    let started = Instant::now();

    loop {
        let browser = daemon
            .browse(OSCQUERY_SERVICE)
            .map_err(|e| Error::Discovery(e.to_string()))?;

        let round_ends = tokio::time::Instant::now() + poll_interval;
        while let Ok(event) = tokio::time::timeout_at(round_ends, browser.recv_async()).await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    debug!("browse channel closed: {e}");
                    break;
                }
            };

            if let ServiceEvent::ServiceResolved(info) = event {
                let fullname = info.get_fullname().to_string();
                if !fullname.contains(name_fragment) {
                    debug!("ignoring unrelated service {fullname}");
                    continue;
                }
                let Some(host) = info.get_addresses().iter().next().copied() else {
                    debug!("{fullname} resolved without addresses");
                    continue;
                };
                let _ = daemon.stop_browse(OSCQUERY_SERVICE);
                let name = fullname
                    .strip_suffix(&format!(".{OSCQUERY_SERVICE}"))
                    .unwrap_or(&fullname)
                    .to_string();
                return Ok(ServiceHandle {
                    name,
                    host,
                    port: info.get_port(),
                });
            }
        }

        let _ = daemon.stop_browse(OSCQUERY_SERVICE);

        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                return Err(Error::DiscoveryTimeout {
                    service: name_fragment.to_string(),
                    waited: started.elapsed(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_root_formats_host_and_port() {
        let handle = ServiceHandle {
            name: "VRChat-Client-ABC123".to_string(),
            host: "127.0.0.1".parse().unwrap(),
            port: 9412,
        };
        assert_eq!(handle.http_root(), "http://127.0.0.1:9412");
    }

    #[tokio::test]
    async fn bounded_search_fails_instead_of_hanging() {
        let daemon = match ServiceDaemon::new() {
            Ok(daemon) => daemon,
            // No multicast-capable interface in this environment
            Err(_) => return,
        };
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            find_service(
                &daemon,
                "NoSuchServiceFragment",
                Duration::from_millis(50),
                Some(Duration::from_millis(120)),
            ),
        )
        .await
        .expect("bounded discovery must not hang");

        match result.unwrap_err() {
            Error::DiscoveryTimeout { waited, .. } => {
                assert!(waited >= Duration::from_millis(120));
            }
            // Environments without multicast surface a daemon error instead
            Error::Discovery(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
        let _ = daemon.shutdown();
    }
}
