//! Per-peer session actor.
//!
//! A session owns one client state machine plus the application-data queue
//! for payloads submitted before the handshake completes. The endpoint
//! looks sessions up by `(address, port, identity, psk)` for outbound
//! sends and by `(address, port)` for inbound datagrams.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use subtle::ConstantTimeEq;

use crate::buffer::{Buf, ToBuf};
use crate::client::{Client, ClientState};
use crate::message::PskIdentity;
use crate::{Config, Error, Output};

/// One DTLS session towards a single peer.
pub struct Session {
    peer: SocketAddr,
    identity: Vec<u8>,
    psk: Buf,
    client: Client,
    /// Payloads submitted before `Connected`, drained in FIFO order.
    app_queue: VecDeque<Vec<u8>>,
    connected: bool,
}

impl Session {
    /// Create a session and emit the first handshake flight.
    pub fn new(
        peer: SocketAddr,
        identity: &[u8],
        psk: &[u8],
        now: Instant,
        config: Arc<Config>,
    ) -> Result<Session, Error> {
        let psk_identity = PskIdentity::try_new(identity)
            .map_err(|_| Error::OutOfRange("psk identity length"))?;

        let mut client = Client::new(now, config, psk_identity, psk);
        client.connect()?;

        Ok(Session {
            peer,
            identity: identity.to_vec(),
            psk: psk.to_buf(),
            client,
            app_queue: VecDeque::new(),
            connected: false,
        })
    }

    /// The peer this session talks to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current handshake state.
    pub fn state(&self) -> ClientState {
        self.client.state()
    }

    /// Whether this session matches an outbound send key.
    ///
    /// The PSK comparison is constant time; identities and addresses are
    /// not secret.
    pub fn matches(&self, peer: SocketAddr, identity: &[u8], psk: &[u8]) -> bool {
        self.peer == peer && self.identity == identity && bool::from(self.psk.ct_eq(psk))
    }

    /// Send (or queue) an application payload.
    ///
    /// Before `Connected` the payload is queued; afterwards it is
    /// encrypted and emitted as an application-data record.
    pub fn send_application(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.connected {
            self.client.send_application_data(data)
        } else {
            self.app_queue.push_back(data.to_vec());
            Ok(())
        }
    }

    /// Feed an incoming datagram to the state machine.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Result<(), Error> {
        self.client.handle_datagram(datagram)
    }

    /// Poll for pending output.
    ///
    /// Seeing `Connected` flips the session into direct-send mode and
    /// drains the queue, oldest payload first.
    pub fn poll_output(&mut self) -> Option<Output> {
        let output = self.client.poll_output()?;

        if matches!(output, Output::Connected) {
            self.connected = true;
            while let Some(payload) = self.app_queue.pop_front() {
                if let Err(e) = self.client.send_application_data(&payload) {
                    debug!("Dropping queued payload: {:?}", e);
                }
            }
        }

        Some(output)
    }

    /// Application-initiated close of this session.
    pub fn close(&mut self) {
        self.client.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("state", &self.client.state())
            .field("queued", &self.app_queue.len())
            .finish()
    }
}
