//! Multicast socket plumbing.
//!
//! Uses SO_REUSEPORT so several listeners on one host can share the
//! announcement port.

use std::net::{Ipv4Addr, SocketAddr};

use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::configure::{OutgoingRequest, RequestSink};
use crate::discovery::AnnouncementReceiver;
use crate::error::ConfigureError;
use crate::settings::TransportSettings;

/// Create a UDP socket bound to `port` and joined to `group`.
///
/// With no interfaces given, the group is joined on the system default.
pub fn create_multicast_socket(
    group: Ipv4Addr,
    port: u16,
    interfaces: &[Ipv4Addr],
) -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;

    if interfaces.is_empty() {
        socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    } else {
        for interface in interfaces {
            // An interface without multicast support must not stop the others
            if let Err(e) = socket.join_multicast_v4(&group, interface) {
                warn!(%group, %interface, error = %e, "Failed to join multicast group");
            }
        }
    }

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Receives datagrams and feeds them to the receive pipeline.
pub struct MulticastListener {
    socket: UdpSocket,
    max_datagram: usize,
}

impl MulticastListener {
    /// Listen on the announcement group from `settings`.
    pub async fn bind(
        settings: &TransportSettings,
        interfaces: &[Ipv4Addr],
    ) -> Result<Self, std::io::Error> {
        let std_socket =
            create_multicast_socket(settings.announce_group, settings.announce_port, interfaces)?;
        let socket = UdpSocket::from_std(std_socket)?;
        info!(
            group = %settings.announce_group,
            port = settings.announce_port,
            "Multicast listener started"
        );

        Ok(Self {
            socket,
            max_datagram: settings.max_datagram,
        })
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket, max_datagram: usize) -> Self {
        Self {
            socket,
            max_datagram,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Run the receive loop until the task is cancelled.
    pub async fn run(&self, receiver: &AnnouncementReceiver) -> Result<(), std::io::Error> {
        let mut buf = vec![0u8; self.max_datagram];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    if let Err(e) = receiver.handle_datagram(&buf[..len]) {
                        debug!(source = %addr, error = %e, "Dropped inbound message");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "UDP receive error");
                }
            }
        }
    }
}

/// Sends configure requests to the configure group on every given interface.
pub struct MulticastSink {
    socket: Mutex<Socket>,
    target: SocketAddr,
    interfaces: Vec<Ipv4Addr>,
}

impl MulticastSink {
    pub fn new(settings: &TransportSettings, interfaces: &[Ipv4Addr]) -> Result<Self, std::io::Error> {
        let target = SocketAddr::from((settings.configure_group, settings.configure_port));
        Self::with_target(target, interfaces)
    }

    /// Send to an arbitrary destination, unicast or multicast.
    pub fn with_target(target: SocketAddr, interfaces: &[Ipv4Addr]) -> Result<Self, std::io::Error> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket: Mutex::new(socket),
            target,
            interfaces: interfaces.to_vec(),
        })
    }

    fn send_once(&self, socket: &Socket, payload: &[u8]) -> Result<(), std::io::Error> {
        socket.send_to(payload, &SockAddr::from(self.target))?;
        Ok(())
    }
}

impl RequestSink for MulticastSink {
    fn send(&self, request: &OutgoingRequest) -> Result<(), ConfigureError> {
        let socket = self.socket.lock();
        socket
            .set_multicast_ttl_v4(request.ttl)
            .map_err(|e| ConfigureError::Transport(e.to_string()))?;

        if self.interfaces.is_empty() {
            return self
                .send_once(&socket, request.payload.as_bytes())
                .map_err(|e| ConfigureError::Transport(e.to_string()));
        }

        let mut last_error = None;
        let mut delivered = 0usize;
        for interface in &self.interfaces {
            let result = socket
                .set_multicast_if_v4(interface)
                .and_then(|_| self.send_once(&socket, request.payload.as_bytes()));
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(%interface, error = %e, "Configure request not sent on interface");
                    last_error = Some(e);
                }
            }
        }

        match (delivered, last_error) {
            (0, Some(e)) => Err(ConfigureError::Transport(e.to_string())),
            _ => Ok(()),
        }
    }
}
