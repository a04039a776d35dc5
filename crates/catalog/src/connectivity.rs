//! Network reachability checks

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Reports whether the network is currently reachable
///
/// Queried synchronously by the sync mediator after each fetch; must have
/// no side effects.
pub trait Connectivity: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Connectivity flag driven by the embedding app's network callbacks
#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ManualConnectivity {
    fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Checks reachability by opening a TCP connection to a known host
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `addr` (`host:port`), giving up after `timeout`
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

impl Connectivity for TcpProbe {
    fn is_reachable(&self) -> bool {
        let Ok(addrs) = self.addr.to_socket_addrs() else {
            return false;
        };
        addrs
            .into_iter()
            .any(|addr| TcpStream::connect_timeout(&addr, self.timeout).is_ok())
    }
}
