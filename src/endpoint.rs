//! UDP endpoint fronting multiple DTLS sessions.
//!
//! The endpoint owns a single datagram socket (behind the [`Transport`]
//! trait) and a hostname resolver (behind [`Resolver`]), routes inbound
//! datagrams to the session matching the source address, and surfaces
//! application-visible happenings as [`Event`]s.

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Instant;

use crate::session::Session;
use crate::{Config, Error, Output};

/// Address family the endpoint is fixed to at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    /// IPv4 (resolver uses A lookups).
    V4,
    /// IPv6 (resolver uses AAAA lookups).
    V6,
}

impl AddrFamily {
    fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            AddrFamily::V4 => addr.is_ipv4(),
            AddrFamily::V6 => addr.is_ipv6(),
        }
    }
}

/// Boundary to the datagram socket.
///
/// `recv_from` is non-blocking: `Ok(None)` means no datagram is ready.
pub trait Transport {
    /// Send one datagram to `peer`.
    fn send_to(&mut self, buf: &[u8], peer: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram, if any is ready.
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    /// Tear the socket down.
    fn close(&mut self);
}

/// Boundary to the hostname resolver.
pub trait Resolver {
    /// Resolve `host` to addresses of the given family.
    fn resolve(&mut self, host: &str, family: AddrFamily) -> io::Result<Vec<IpAddr>>;
}

/// [`Transport`] over a non-blocking std UDP socket.
pub struct StdUdpTransport {
    socket: Option<UdpSocket>,
}

impl StdUdpTransport {
    /// Bind an ephemeral local port of the given family.
    pub fn bind(family: AddrFamily) -> io::Result<StdUdpTransport> {
        let bind_addr = match family {
            AddrFamily::V4 => "0.0.0.0:0",
            AddrFamily::V6 => "[::]:0",
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(StdUdpTransport {
            socket: Some(socket),
        })
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket closed"))?;
        socket.local_addr()
    }
}

impl Transport for StdUdpTransport {
    fn send_to(&mut self, buf: &[u8], peer: SocketAddr) -> io::Result<usize> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket closed"))?;
        socket.send_to(buf, peer)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(None);
        };
        match socket.recv_from(buf) {
            Ok((n, peer)) => Ok(Some((n, peer))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

/// [`Resolver`] over the system resolver (`ToSocketAddrs`).
#[derive(Debug, Default)]
pub struct StdResolver;

impl Resolver for StdResolver {
    fn resolve(&mut self, host: &str, family: AddrFamily) -> io::Result<Vec<IpAddr>> {
        // The port is irrelevant; ToSocketAddrs requires one.
        let addrs = (host, 0u16)
            .to_socket_addrs()?
            .map(|sa| sa.ip())
            .filter(|ip| family.matches(ip))
            .collect();
        Ok(addrs)
    }
}

/// Application-visible happenings on an endpoint.
#[derive(Debug)]
pub enum Event {
    /// A session finished its handshake.
    Connected {
        /// The resolved peer address.
        peer: SocketAddr,
    },
    /// Decrypted application data arrived.
    Message {
        /// The sending peer.
        peer: SocketAddr,
        /// The plaintext payload.
        payload: Vec<u8>,
    },
    /// A session ended (close_notify or failure).
    Disconnected {
        /// The peer of the removed session.
        peer: SocketAddr,
    },
}

/// A UDP endpoint multiplexing DTLS-PSK sessions.
pub struct Endpoint {
    family: AddrFamily,
    config: Arc<Config>,
    transport: Box<dyn Transport>,
    resolver: Box<dyn Resolver>,
    sessions: Vec<Session>,
    events: VecDeque<Event>,
    closed: bool,
}

impl Endpoint {
    /// Create an endpoint over a std UDP socket and the system resolver.
    pub fn new(family: AddrFamily, config: Arc<Config>) -> io::Result<Endpoint> {
        let transport = StdUdpTransport::bind(family)?;
        Ok(Self::with_parts(
            family,
            config,
            Box::new(transport),
            Box::new(StdResolver),
        ))
    }

    /// Create an endpoint from explicit transport and resolver parts.
    pub fn with_parts(
        family: AddrFamily,
        config: Arc<Config>,
        transport: Box<dyn Transport>,
        resolver: Box<dyn Resolver>,
    ) -> Endpoint {
        Endpoint {
            family,
            config,
            transport,
            resolver,
            sessions: Vec::new(),
            events: VecDeque::new(),
            closed: false,
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Send `payload` to `host:port`, authenticated by `identity`/`psk`.
    ///
    /// Resolution failures silently drop the send (there is nobody to
    /// deliver an error to over UDP). A session is created on first use of
    /// a `(address, port, identity, psk)` key; payloads submitted during
    /// the handshake are queued and flushed on connect.
    pub fn send(
        &mut self,
        payload: &[u8],
        host: &str,
        port: u16,
        identity: &[u8],
        psk: &[u8],
    ) -> Result<(), Error> {
        if self.closed {
            debug!("send on closed endpoint");
            return Ok(());
        }

        let Some(address) = self.resolve_host(host) else {
            debug!("Dropping send, cannot resolve {}", host);
            return Ok(());
        };
        let peer = SocketAddr::new(address, port);

        let index = self
            .sessions
            .iter()
            .position(|s| s.matches(peer, identity, psk));

        let index = match index {
            Some(i) => i,
            None => {
                let session =
                    Session::new(peer, identity, psk, Instant::now(), self.config.clone())?;
                self.sessions.push(session);
                self.sessions.len() - 1
            }
        };

        self.sessions[index].send_application(payload)?;
        self.flush();
        Ok(())
    }

    /// Feed one inbound datagram into the endpoint.
    ///
    /// Datagrams from peers without a session are dropped.
    pub fn handle_datagram(&mut self, peer: SocketAddr, datagram: &[u8]) {
        if self.closed {
            return;
        }

        let Some(index) = self.sessions.iter().position(|s| s.peer() == peer) else {
            debug!("Dropping datagram from unknown peer {}", peer);
            return;
        };

        if let Err(e) = self.sessions[index].handle_datagram(datagram) {
            debug!("Session {} error: {:?}", peer, e);
        }
        self.flush();
    }

    /// Drive the socket: receive pending datagrams and dispatch them.
    ///
    /// Returns whether any datagram was processed.
    pub fn poll(&mut self) -> io::Result<bool> {
        let mut buf = [0u8; 65535];
        let mut any = false;

        while let Some((n, peer)) = self.transport.recv_from(&mut buf)? {
            let datagram = buf[..n].to_vec();
            self.handle_datagram(peer, &datagram);
            any = true;
        }

        Ok(any)
    }

    /// Pop the next application-visible event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Close the endpoint: tear down the socket and drop all sessions.
    pub fn close(&mut self) {
        self.transport.close();
        self.sessions.clear();
        self.closed = true;
    }

    fn resolve_host(&mut self, host: &str) -> Option<IpAddr> {
        // A literal address of our family bypasses the resolver entirely.
        if let Ok(ip) = host.parse::<IpAddr>() {
            return self.family.matches(&ip).then_some(ip);
        }

        match self.resolver.resolve(host, self.family) {
            Ok(addrs) => addrs.into_iter().find(|ip| self.family.matches(ip)),
            Err(e) => {
                debug!("Resolve {} failed: {:?}", host, e);
                None
            }
        }
    }

    /// Pump all sessions: transmit queued datagrams, convert outputs to
    /// events, and drop sessions that have disconnected.
    fn flush(&mut self) {
        let mut remove = Vec::new();

        for (i, session) in self.sessions.iter_mut().enumerate() {
            let peer = session.peer();

            while let Some(output) = session.poll_output() {
                match output {
                    Output::Packet(datagram) => {
                        if let Err(e) = self.transport.send_to(&datagram, peer) {
                            warn!("send_to {} failed: {:?}", peer, e);
                        }
                    }
                    Output::Connected => {
                        self.events.push_back(Event::Connected { peer });
                    }
                    Output::ApplicationData(payload) => {
                        self.events.push_back(Event::Message {
                            peer,
                            payload: payload.to_vec(),
                        });
                    }
                    Output::Disconnected => {
                        self.events.push_back(Event::Disconnected { peer });
                        remove.push(i);
                    }
                }
            }
        }

        for i in remove.into_iter().rev() {
            self.sessions.remove(i);
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("family", &self.family)
            .field("sessions", &self.sessions.len())
            .field("closed", &self.closed)
            .finish()
    }
}
