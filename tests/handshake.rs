//! Handshake scenarios against the canned PSK server.

mod common;

use common::*;
use dpsk::message::{Body, Handshake};
use dpsk::types::PskCipherSuite;
use dpsk::ClientState;

#[test]
fn psk_aes128_happy_path() {
    let mut session = new_session(PSK);
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    let flight5 = handshake_until_client_finished(&mut session, &mut server);

    // Two ClientHellos total, the second carrying the cookie.
    assert_eq!(server.seen_client_hellos, 2);
    assert_eq!(server.last_hello_cookie, vec![0xDE, 0xAD, 0xBE, 0xEF]);

    // Flight 5 record order: ClientKeyExchange (epoch 0), ChangeCipherSpec
    // (epoch 0), Finished (epoch 1, sequence restarted).
    let headers = parse_records(&flight5);
    assert_eq!(headers.len(), 3);
    assert_eq!(headers[0].ctype, 22);
    assert_eq!(headers[0].epoch, 0);
    assert_eq!(headers[1].ctype, 20);
    assert_eq!(headers[1].epoch, 0);
    assert_eq!(headers[2].ctype, 22);
    assert_eq!(headers[2].epoch, 1);
    assert_eq!(headers[2].seq, 0);

    // The server accepted our Finished.
    assert_eq!(server.client_finished_ok, Some(true));

    // Server CCS + Finished completes the handshake; connect fires once.
    let fin = server.ccs_and_finished_datagram(false);
    session.handle_datagram(&fin).unwrap();

    let outputs = drain_outputs(&mut session);
    assert_eq!(outputs.connected, 1);
    assert_eq!(session.state(), ClientState::Connected);
}

#[test]
fn psk_aes256_selection_derives_longer_keys() {
    let mut session = new_session(PSK);
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES256_CBC_SHA);

    connect(&mut session, &mut server);
    assert_eq!(session.state(), ClientState::Connected);

    let keys = server.keys.as_ref().unwrap();
    assert_eq!(keys.client_write_key.len(), 32);
    assert_eq!(keys.client_write_mac.len(), 20);
}

#[test]
fn first_client_hello_has_no_cookie_and_offers_both_suites() {
    let mut session = new_session(PSK);

    let flight1 = collect_packets(&mut session);
    let headers = parse_records(&flight1[0]);
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].epoch, 0);
    assert_eq!(headers[0].seq, 0);

    let fragment = &flight1[0][13..];
    let (_, handshake) = Handshake::parse(fragment).unwrap();
    let Body::ClientHello(client_hello) = handshake.body else {
        panic!("expected ClientHello");
    };

    assert!(client_hello.cookie.is_empty());
    assert!(client_hello.session_id.is_empty());
    assert_eq!(
        client_hello
            .cipher_suites
            .iter()
            .map(|s| s.as_u16())
            .collect::<Vec<_>>(),
        vec![0x008D, 0x008C],
    );
}

#[test]
fn transcript_resets_at_hello_verify() {
    // The canned server builds its transcript starting at the second
    // ClientHello. If the client kept the first hello in its transcript,
    // its Finished would not verify here.
    let mut session = new_session(PSK);
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    handshake_until_client_finished(&mut session, &mut server);
    assert_eq!(server.client_finished_ok, Some(true));
}

#[test]
fn bad_server_finished_fails_the_session() {
    let mut session = new_session(PSK);
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    handshake_until_client_finished(&mut session, &mut server);

    let fin = server.ccs_and_finished_datagram(true);
    let result = session.handle_datagram(&fin);
    assert!(result.is_err());

    let outputs = drain_outputs(&mut session);
    assert_eq!(outputs.connected, 0);
    assert_eq!(outputs.disconnected, 1);
    assert_eq!(session.state(), ClientState::Failed);
}

#[test]
fn second_hello_verify_is_rejected() {
    let mut session = new_session(PSK);
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    let flight1 = collect_packets(&mut session);
    server.process_client_flight(&flight1[0]);

    let hvr = server.hello_verify_datagram();
    session.handle_datagram(&hvr).unwrap();
    let _flight3 = collect_packets(&mut session);

    // A second restart is a protocol violation.
    let hvr2 = server.hello_verify_datagram();
    assert!(session.handle_datagram(&hvr2).is_err());
    assert_eq!(session.state(), ClientState::Failed);
}

#[test]
fn unknown_cipher_suite_aborts() {
    let mut session = new_session(PSK);
    let mut server = CannedServer::new(PskCipherSuite::Unknown(0xC02B));

    let flight1 = collect_packets(&mut session);
    server.process_client_flight(&flight1[0]);

    let hvr = server.hello_verify_datagram();
    session.handle_datagram(&hvr).unwrap();
    let flight3 = collect_packets(&mut session);
    server.process_client_flight(&flight3[0]);

    let flight4 = server.server_flight_datagram();
    assert!(session.handle_datagram(&flight4).is_err());
    assert_eq!(session.state(), ClientState::Failed);
}

#[test]
fn server_hello_done_before_server_hello_aborts() {
    let mut session = new_session(PSK);
    let mut server = CannedServer::new(PskCipherSuite::PSK_AES128_CBC_SHA);

    let flight1 = collect_packets(&mut session);
    server.process_client_flight(&flight1[0]);

    // ServerHelloDone out of order: 12-byte handshake header, empty body.
    let shd = [
        0x16, 0xFE, 0xFF, 0x00, 0x00, // record header...
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // seq 0
        0x00, 0x0C, // length
        0x0E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    assert!(session.handle_datagram(&shd).is_err());
    assert_eq!(session.state(), ClientState::Failed);
}
