use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Cheap "are we online" check: can we open a TCP connection to a well-known
/// host within the timeout?
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    addr: String,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        ConnectivityProbe {
            addr: addr.into(),
            timeout,
        }
    }

    pub async fn is_network_available(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Connectivity probe to {} failed: {}", self.addr, e);
                false
            }
            Err(_) => {
                debug!("Connectivity probe to {} timed out", self.addr);
                false
            }
        }
    }
}
