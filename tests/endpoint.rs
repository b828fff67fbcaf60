//! Multiplexer scenarios: session keying, routing, teardown.

mod common;

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use common::*;
use dpsk::types::PskCipherSuite;
use dpsk::{AddrFamily, Config, Endpoint, Event, Resolver, Transport};

/// Transport double that records outgoing datagrams.
#[derive(Default)]
struct TestTransport {
    sent: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
    closed: Arc<Mutex<bool>>,
}

impl Transport for TestTransport {
    fn send_to(&mut self, buf: &[u8], peer: SocketAddr) -> io::Result<usize> {
        self.sent.lock().unwrap().push((peer, buf.to_vec()));
        Ok(buf.len())
    }

    fn recv_from(&mut self, _buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        Ok(None)
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// Resolver double with a fixed host table.
struct TestResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl TestResolver {
    fn new() -> TestResolver {
        let mut hosts = HashMap::new();
        hosts.insert(
            "device.example.com".to_string(),
            vec!["10.0.0.1".parse().unwrap()],
        );
        TestResolver { hosts }
    }
}

impl Resolver for TestResolver {
    fn resolve(&mut self, host: &str, _family: AddrFamily) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(host)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such host"))
    }
}

struct Parts {
    endpoint: Endpoint,
    sent: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
    closed: Arc<Mutex<bool>>,
}

fn endpoint() -> Parts {
    let transport = TestTransport::default();
    let sent = transport.sent.clone();
    let closed = transport.closed.clone();

    let config = Arc::new(Config::builder().rng_seed(Some(42)).build());
    let endpoint = Endpoint::with_parts(
        AddrFamily::V4,
        config,
        Box::new(transport),
        Box::new(TestResolver::new()),
    );

    Parts {
        endpoint,
        sent,
        closed,
    }
}

fn take_sent(sent: &Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>) -> Vec<(SocketAddr, Vec<u8>)> {
    std::mem::take(&mut *sent.lock().unwrap())
}

const PEER: &str = "10.0.0.1:5684";

/// Drive a full handshake between the endpoint's only session and the
/// canned server, returning decrypted client payloads seen by the server.
fn complete_handshake(parts: &mut Parts, server: &mut CannedServer) {
    let peer: SocketAddr = PEER.parse().unwrap();

    // Flight 1 is already out (triggered by send()).
    let flight1 = take_sent(&parts.sent);
    assert_eq!(flight1.len(), 1);
    assert_eq!(flight1[0].0, peer);
    server.process_client_flight(&flight1[0].1);

    let hvr = server.hello_verify_datagram();
    parts.endpoint.handle_datagram(peer, &hvr);

    let flight3 = take_sent(&parts.sent);
    server.process_client_flight(&flight3[0].1);

    let flight4 = server.server_flight_datagram();
    parts.endpoint.handle_datagram(peer, &flight4);

    let flight5 = take_sent(&parts.sent);
    server.process_client_flight(&flight5[0].1);
    assert_eq!(server.client_finished_ok, Some(true));

    let fin = server.ccs_and_finished_datagram(false);
    parts.endpoint.handle_datagram(peer, &fin);
}

#[test]
fn send_resolves_creates_session_and_flushes_on_connect() {
    let mut parts = endpoint();
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    parts
        .endpoint
        .send(b"hello", "device.example.com", 5684, b"Client_identity", PSK)
        .unwrap();
    assert_eq!(parts.endpoint.session_count(), 1);

    complete_handshake(&mut parts, &mut server);

    // Connect event fired and the queued payload went out encrypted.
    assert!(matches!(
        parts.endpoint.poll_event(),
        Some(Event::Connected { .. })
    ));

    let app = take_sent(&parts.sent);
    for (_, datagram) in &app {
        server.process_client_flight(datagram);
    }
    assert_eq!(server.client_app_data, vec![b"hello".to_vec()]);
}

#[test]
fn sends_with_same_key_reuse_the_session() {
    let mut parts = endpoint();

    parts
        .endpoint
        .send(b"a", "device.example.com", 5684, b"Client_identity", PSK)
        .unwrap();
    parts
        .endpoint
        .send(b"b", "10.0.0.1", 5684, b"Client_identity", PSK)
        .unwrap();
    assert_eq!(parts.endpoint.session_count(), 1);

    // A different identity is a different session.
    parts
        .endpoint
        .send(b"c", "10.0.0.1", 5684, b"other_identity", PSK)
        .unwrap();
    assert_eq!(parts.endpoint.session_count(), 2);
}

#[test]
fn unresolvable_host_drops_the_send() {
    let mut parts = endpoint();

    parts
        .endpoint
        .send(b"x", "nope.example.com", 5684, b"Client_identity", PSK)
        .unwrap();

    assert_eq!(parts.endpoint.session_count(), 0);
    assert!(take_sent(&parts.sent).is_empty());
}

#[test]
fn wrong_family_literal_drops_the_send() {
    let mut parts = endpoint();

    parts
        .endpoint
        .send(b"x", "::1", 5684, b"Client_identity", PSK)
        .unwrap();

    assert_eq!(parts.endpoint.session_count(), 0);
}

#[test]
fn datagram_from_unknown_peer_is_dropped() {
    let mut parts = endpoint();

    let stray: SocketAddr = "192.168.1.1:9999".parse().unwrap();
    parts.endpoint.handle_datagram(stray, &[0x16, 0xFE, 0xFF]);

    assert!(parts.endpoint.poll_event().is_none());
}

#[test]
fn close_notify_removes_the_session() {
    let mut parts = endpoint();
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    parts
        .endpoint
        .send(b"hello", "device.example.com", 5684, b"Client_identity", PSK)
        .unwrap();
    complete_handshake(&mut parts, &mut server);
    take_sent(&parts.sent);

    let peer: SocketAddr = PEER.parse().unwrap();
    let close = server.close_notify_datagram();
    parts.endpoint.handle_datagram(peer, &close);

    let mut saw_disconnect = false;
    while let Some(event) = parts.endpoint.poll_event() {
        if let Event::Disconnected { peer: p } = event {
            assert_eq!(p, peer);
            saw_disconnect = true;
        }
    }
    assert!(saw_disconnect);
    assert_eq!(parts.endpoint.session_count(), 0);
}

#[test]
fn inbound_app_data_surfaces_as_message_event() {
    let mut parts = endpoint();
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    parts
        .endpoint
        .send(b"hello", "device.example.com", 5684, b"Client_identity", PSK)
        .unwrap();
    complete_handshake(&mut parts, &mut server);

    let peer: SocketAddr = PEER.parse().unwrap();
    let datagram = server.app_data_datagram(b"pong");
    parts.endpoint.handle_datagram(peer, &datagram);

    let mut payloads = Vec::new();
    while let Some(event) = parts.endpoint.poll_event() {
        if let Event::Message { payload, .. } = event {
            payloads.push(payload);
        }
    }
    assert_eq!(payloads, vec![b"pong".to_vec()]);
}

#[test]
fn close_tears_down_transport_and_sessions() {
    let mut parts = endpoint();

    parts
        .endpoint
        .send(b"x", "device.example.com", 5684, b"Client_identity", PSK)
        .unwrap();
    assert_eq!(parts.endpoint.session_count(), 1);

    parts.endpoint.close();
    assert_eq!(parts.endpoint.session_count(), 0);
    assert!(*parts.closed.lock().unwrap());

    // Sends after close are silently dropped.
    take_sent(&parts.sent);
    parts
        .endpoint
        .send(b"y", "device.example.com", 5684, b"Client_identity", PSK)
        .unwrap();
    assert!(take_sent(&parts.sent).is_empty());
}
