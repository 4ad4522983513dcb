//! Passive listener allocation
//!
//! Hands out listeners from the configured data port range. Allocation
//! rotates through the range so back-to-back PASV commands from different
//! clients do not fight over the same port.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, warn};
use tokio::net::TcpListener;

use crate::error::TransferError;

pub struct PassivePortAllocator {
    range: Range<u16>,
    next: AtomicUsize,
}

impl PassivePortAllocator {
    pub fn new(range: Range<u16>) -> Self {
        Self {
            range,
            next: AtomicUsize::new(0),
        }
    }

    /// Binds a listener on `ip` using the first free port of the range.
    pub async fn bind(&self, ip: IpAddr) -> Result<TcpListener, TransferError> {
        let size = self.range.len();
        if size == 0 {
            return Err(TransferError::NoAvailablePort);
        }

        for _ in 0..size {
            let offset = self.next.fetch_add(1, Ordering::Relaxed) % size;
            let port = self.range.start + offset as u16;
            let socket = SocketAddr::new(ip, port);

            match TcpListener::bind(socket).await {
                Ok(listener) => {
                    debug!("Bound passive listener on {}", socket);
                    return Ok(listener);
                }
                Err(e) if e.kind() == ErrorKind::AddrInUse => continue,
                Err(e) => {
                    warn!("Failed to bind passive listener on {}: {}", socket, e);
                    return Err(TransferError::PortBindingFailed(socket, e));
                }
            }
        }

        Err(TransferError::NoAvailablePort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn free_range(len: u16) -> Range<u16> {
        // Ask the OS for a free port and use the ports right after it.
        let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let start = reserved.local_addr().unwrap().port();
        drop(reserved);
        start..start.saturating_add(len)
    }

    #[tokio::test]
    async fn test_binds_inside_range() {
        let range = free_range(10).await;
        let allocator = PassivePortAllocator::new(range.clone());
        let listener = allocator.bind("127.0.0.1".parse().unwrap()).await.unwrap();
        assert!(range.contains(&listener.local_addr().unwrap().port()));
    }

    #[tokio::test]
    async fn test_skips_ports_in_use() {
        let range = free_range(2).await;
        let allocator = PassivePortAllocator::new(range.clone());
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        let Ok(first) = allocator.bind(ip).await else {
            return;
        };
        let Ok(second) = allocator.bind(ip).await else {
            return;
        };
        assert_ne!(
            first.local_addr().unwrap().port(),
            second.local_addr().unwrap().port()
        );
        assert!(matches!(
            allocator.bind(ip).await,
            Err(TransferError::NoAvailablePort)
        ));
    }

    #[tokio::test]
    async fn test_empty_range() {
        let allocator = PassivePortAllocator::new(3000..3000);
        assert!(matches!(
            allocator.bind("127.0.0.1".parse().unwrap()).await,
            Err(TransferError::NoAvailablePort)
        ));
    }
}
