//! Shared helpers for the integration tests: record header parsing plus a
//! canned PSK server that derives the same key schedule from the PSK and
//! produces valid (or deliberately broken) server flights.

#![allow(unused)]

use std::sync::Arc;
use std::time::Instant;

use dpsk::buffer::Buf;
use dpsk::crypto::{cbc, prf, MacAlgorithm};
use dpsk::message::{
    Body, Cookie, Handshake, HelloVerifyRequest, ServerHello, SessionId,
};
use dpsk::types::{
    CompressionMethod, ContentType, ProtocolVersion, PskCipherSuite, Random, Sequence,
};
use dpsk::{Config, Output, SeededRng, Session};

/// Handshake message types (RFC 4347 / RFC 5246).
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CLIENT_KEY_EXCHANGE: u8 = 16;
pub const FINISHED: u8 = 20;

/// Parsed DTLS record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecHdr {
    pub ctype: u8,
    pub epoch: u16,
    pub seq: u64,
    pub len: usize,
}

/// Parse DTLS record headers from a datagram.
pub fn parse_records(datagram: &[u8]) -> Vec<RecHdr> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let seq_bytes = [
            0u8,
            0u8,
            datagram[i + 5],
            datagram[i + 6],
            datagram[i + 7],
            datagram[i + 8],
            datagram[i + 9],
            datagram[i + 10],
        ];
        let seq = u64::from_be_bytes(seq_bytes);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        out.push(RecHdr {
            ctype,
            epoch,
            seq,
            len,
        });
        i += 13 + len;
    }
    out
}

/// Parse handshake message types from a datagram (epoch 0 records only).
pub fn parse_handshake_types(datagram: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;

        if ctype == 22 && epoch == 0 && i + 13 + 1 <= datagram.len() {
            out.push(datagram[i + 13]);
        }
        i += 13 + len;
    }
    out
}

/// Poll a session until it has nothing more, collecting only packets.
pub fn collect_packets(session: &mut Session) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(output) = session.poll_output() {
        if let Output::Packet(p) = output {
            out.push(p.to_vec());
        }
    }
    out
}

/// Collected outputs from draining a session.
#[derive(Default, Debug)]
pub struct DrainedOutputs {
    pub packets: Vec<Vec<u8>>,
    pub connected: usize,
    pub disconnected: usize,
    pub app_data: Vec<Vec<u8>>,
}

/// Drain everything a session has pending.
pub fn drain_outputs(session: &mut Session) -> DrainedOutputs {
    let mut result = DrainedOutputs::default();
    while let Some(output) = session.poll_output() {
        match output {
            Output::Packet(p) => result.packets.push(p.to_vec()),
            Output::Connected => result.connected += 1,
            Output::ApplicationData(data) => result.app_data.push(data.to_vec()),
            Output::Disconnected => result.disconnected += 1,
        }
    }
    result
}

/// A new session with a deterministic RNG, pointed at the canned server.
pub fn new_session(psk: &[u8]) -> Session {
    let config = Arc::new(Config::builder().rng_seed(Some(42)).build());
    Session::new(
        "10.0.0.1:5684".parse().unwrap(),
        b"Client_identity",
        psk,
        Instant::now(),
        config,
    )
    .unwrap()
}

/// The PSK used throughout the scenarios.
pub const PSK: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

/// Server-side key schedule, derived with the crate's own PRF.
pub struct ServerKeys {
    pub master: [u8; 48],
    pub client_write_mac: Vec<u8>,
    pub server_write_mac: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
}

/// A scripted DTLS-PSK server good for exactly one handshake.
///
/// It keeps the same transcript the client is required to keep (everything
/// from the cookie-carrying ClientHello onward) and verifies the client
/// Finished against it.
pub struct CannedServer {
    psk: Vec<u8>,
    suite: PskCipherSuite,
    pub server_random: [u8; 32],
    pub cookie: Vec<u8>,
    pub transcript: Vec<u8>,
    pub client_random: Option<[u8; 32]>,
    pub keys: Option<ServerKeys>,
    pub seen_client_hellos: usize,
    pub last_hello_cookie: Vec<u8>,
    pub seen_ccs: bool,
    pub client_finished_ok: Option<bool>,
    pub client_app_data: Vec<Vec<u8>>,
    epoch: u16,
    seq: u64,
    msg_seq: u16,
    rng: SeededRng,
}

impl CannedServer {
    pub fn new(suite: PskCipherSuite) -> CannedServer {
        CannedServer {
            psk: PSK.to_vec(),
            suite,
            server_random: [0x42; 32],
            cookie: vec![0xDE, 0xAD, 0xBE, 0xEF],
            transcript: Vec::new(),
            client_random: None,
            keys: None,
            seen_client_hellos: 0,
            last_hello_cookie: Vec::new(),
            seen_ccs: false,
            client_finished_ok: None,
            client_app_data: Vec::new(),
            epoch: 0,
            seq: 0,
            msg_seq: 0,
            rng: SeededRng::new(Some(0xBEEF)),
        }
    }

    fn next_msg_seq(&mut self) -> u16 {
        let s = self.msg_seq;
        self.msg_seq += 1;
        s
    }

    /// Wrap a fragment in a record header using our outgoing counters.
    fn record(&mut self, ctype: u8, fragment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(ctype);
        out.extend_from_slice(&0xFEFFu16.to_be_bytes());
        out.extend_from_slice(&self.epoch.to_be_bytes());
        out.extend_from_slice(&self.seq.to_be_bytes()[2..]);
        out.extend_from_slice(&(fragment.len() as u16).to_be_bytes());
        out.extend_from_slice(fragment);
        self.seq += 1;
        out
    }

    /// A full handshake message: 12-byte header plus body.
    fn handshake_wire(msg_type: u8, msg_seq: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(msg_type);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(&msg_seq.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
        out.extend_from_slice(body);
        out
    }

    /// Seal a record under the server write keys (epoch must be 1).
    fn sealed_record(&mut self, ctype: u8, plaintext: &[u8]) -> Vec<u8> {
        let keys = self.keys.as_ref().expect("keys derived");
        let mac_key = keys.server_write_mac.clone();
        let enc_key = keys.server_write_key.clone();

        let mut sealed = Buf::new();
        cbc::seal(
            self.suite.bulk_algorithm(),
            MacAlgorithm::HmacSha1,
            &mac_key,
            &enc_key,
            Sequence {
                epoch: self.epoch,
                sequence_number: self.seq,
            },
            ContentType::from_u8(ctype),
            ProtocolVersion::DTLS1_0,
            plaintext,
            &mut self.rng,
            &mut sealed,
        )
        .expect("seal");

        self.record(ctype, &sealed)
    }

    /// HelloVerifyRequest datagram.
    pub fn hello_verify_datagram(&mut self) -> Vec<u8> {
        let mut body = Buf::new();
        HelloVerifyRequest::new(
            ProtocolVersion::DTLS1_0,
            Cookie::try_new(&self.cookie).unwrap(),
        )
        .serialize(&mut body);

        let seq = self.next_msg_seq();
        let wire = Self::handshake_wire(HELLO_VERIFY_REQUEST, seq, &body);
        self.record(22, &wire)
    }

    /// ServerHello + ServerHelloDone in one datagram. Also derives the key
    /// schedule, since both randoms are known at this point.
    pub fn server_flight_datagram(&mut self) -> Vec<u8> {
        let mut body = Buf::new();
        ServerHello::new(
            ProtocolVersion::DTLS1_0,
            Random {
                bytes: self.server_random,
            },
            SessionId::empty(),
            self.suite,
            CompressionMethod::Null,
        )
        .serialize(&mut body);

        let seq = self.next_msg_seq();
        let sh_wire = Self::handshake_wire(SERVER_HELLO, seq, &body);
        self.transcript.extend_from_slice(&sh_wire);

        let seq = self.next_msg_seq();
        let shd_wire = Self::handshake_wire(SERVER_HELLO_DONE, seq, &[]);
        self.transcript.extend_from_slice(&shd_wire);

        self.derive_keys();

        let mut datagram = self.record(22, &sh_wire);
        datagram.extend_from_slice(&self.record(22, &shd_wire));
        datagram
    }

    /// ChangeCipherSpec + Finished. `corrupt` flips one verify byte.
    pub fn ccs_and_finished_datagram(&mut self, corrupt: bool) -> Vec<u8> {
        let datagram_ccs = self.record(20, &[1]);

        // Our ChangeCipherSpec bumps our epoch and restarts the sequence.
        self.epoch = 1;
        self.seq = 0;

        let keys = self.keys.as_ref().expect("keys derived");
        let mut verify =
            prf::verify_data(&keys.master, "server finished", &self.transcript).expect("prf");
        if corrupt {
            verify[0] ^= 0x01;
        }

        let seq = self.next_msg_seq();
        let wire = Self::handshake_wire(FINISHED, seq, &verify);

        let mut datagram = datagram_ccs;
        datagram.extend_from_slice(&self.sealed_record(22, &wire));
        datagram
    }

    /// An encrypted application-data datagram from the server.
    pub fn app_data_datagram(&mut self, payload: &[u8]) -> Vec<u8> {
        self.sealed_record(23, payload)
    }

    /// An encrypted close_notify alert.
    pub fn close_notify_datagram(&mut self) -> Vec<u8> {
        self.sealed_record(21, &[1, 0])
    }

    /// Consume everything the client sent in one datagram.
    pub fn process_client_flight(&mut self, datagram: &[u8]) {
        let mut i = 0usize;
        while i + 13 <= datagram.len() {
            let ctype = datagram[i];
            let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
            let seq_bytes = [
                0u8,
                0u8,
                datagram[i + 5],
                datagram[i + 6],
                datagram[i + 7],
                datagram[i + 8],
                datagram[i + 9],
                datagram[i + 10],
            ];
            let seq = u64::from_be_bytes(seq_bytes);
            let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
            let fragment = &datagram[i + 13..i + 13 + len];
            i += 13 + len;

            match (ctype, epoch) {
                (22, 0) => self.process_plain_handshake(fragment),
                (20, 0) => self.seen_ccs = true,
                (22, 1) => self.process_client_finished(fragment, epoch, seq),
                (23, 1) => self.process_client_app_data(fragment, epoch, seq),
                _ => panic!("unexpected client record: type {} epoch {}", ctype, epoch),
            }
        }
    }

    fn process_plain_handshake(&mut self, fragment: &[u8]) {
        let (rest, handshake) = Handshake::parse(fragment).expect("client handshake");
        assert!(rest.is_empty(), "one handshake message per client record");

        match handshake.body {
            Body::ClientHello(client_hello) => {
                self.seen_client_hellos += 1;
                self.client_random = Some(client_hello.random.bytes);
                self.last_hello_cookie = client_hello.cookie.to_vec();

                // The transcript starts over at the cookie-carrying hello.
                if !client_hello.cookie.is_empty() {
                    self.transcript.clear();
                    self.transcript.extend_from_slice(fragment);
                }
            }
            Body::ClientKeyExchange(cke) => {
                assert_eq!(&*cke.identity, b"Client_identity");
                self.transcript.extend_from_slice(fragment);
            }
            other => panic!("unexpected plaintext handshake: {:?}", other),
        }
    }

    fn process_client_finished(&mut self, fragment: &[u8], epoch: u16, seq: u64) {
        let keys = self.keys.as_ref().expect("keys derived");

        let mut plain = Buf::new();
        cbc::open(
            self.suite.bulk_algorithm(),
            MacAlgorithm::HmacSha1,
            &keys.client_write_mac,
            &keys.client_write_key,
            Sequence {
                epoch,
                sequence_number: seq,
            },
            ContentType::Handshake,
            ProtocolVersion::DTLS1_0,
            fragment,
            &mut plain,
        )
        .expect("decrypt client finished");

        let (_, handshake) = Handshake::parse(&plain).expect("client finished");
        let Body::Finished(finished) = &handshake.body else {
            panic!("expected Finished, got {:?}", handshake.body);
        };

        let expected =
            prf::verify_data(&keys.master, "client finished", &self.transcript).expect("prf");
        self.client_finished_ok = Some(expected[..] == finished.verify_data[..]);
        self.transcript.extend_from_slice(&plain);
    }

    fn process_client_app_data(&mut self, fragment: &[u8], epoch: u16, seq: u64) {
        let keys = self.keys.as_ref().expect("keys derived");

        let mut plain = Buf::new();
        cbc::open(
            self.suite.bulk_algorithm(),
            MacAlgorithm::HmacSha1,
            &keys.client_write_mac,
            &keys.client_write_key,
            Sequence {
                epoch,
                sequence_number: seq,
            },
            ContentType::ApplicationData,
            ProtocolVersion::DTLS1_0,
            fragment,
            &mut plain,
        )
        .expect("decrypt client app data");

        self.client_app_data.push(plain.to_vec());
    }

    fn derive_keys(&mut self) {
        let client_random = self.client_random.expect("seen a ClientHello");

        let premaster = prf::premaster_from_psk(&self.psk);
        let master =
            prf::master_secret(&premaster, &client_random, &self.server_random).expect("prf");

        let mac_len = 20;
        let key_len = self.suite.bulk_algorithm().key_len();
        let key_block = prf::key_block(
            &master,
            &self.server_random,
            &client_random,
            2 * mac_len + 2 * key_len,
        )
        .expect("prf");

        let mut at = 0;
        let mut next = |len: usize| {
            let out = key_block[at..at + len].to_vec();
            at += len;
            out
        };

        self.keys = Some(ServerKeys {
            master,
            client_write_mac: next(mac_len),
            server_write_mac: next(mac_len),
            client_write_key: next(key_len),
            server_write_key: next(key_len),
        });
    }
}

/// Run the handshake up to (but not including) the server Finished.
///
/// Returns the client's flight 5 datagram (ClientKeyExchange +
/// ChangeCipherSpec + Finished) for inspection.
pub fn handshake_until_client_finished(
    session: &mut Session,
    server: &mut CannedServer,
) -> Vec<u8> {
    // Flight 1: ClientHello without cookie.
    let flight1 = collect_packets(session);
    assert_eq!(flight1.len(), 1);
    server.process_client_flight(&flight1[0]);

    // Flight 2: HelloVerifyRequest.
    let hvr = server.hello_verify_datagram();
    session.handle_datagram(&hvr).unwrap();

    // Flight 3: ClientHello with cookie.
    let flight3 = collect_packets(session);
    assert_eq!(flight3.len(), 1);
    server.process_client_flight(&flight3[0]);

    // Flight 4: ServerHello + ServerHelloDone.
    let flight4 = server.server_flight_datagram();
    session.handle_datagram(&flight4).unwrap();

    // Flight 5: ClientKeyExchange + CCS + Finished.
    let flight5 = collect_packets(session);
    assert_eq!(flight5.len(), 1);
    server.process_client_flight(&flight5[0]);

    flight5.into_iter().next().unwrap()
}

/// Run a complete successful handshake, asserting the client Finished
/// verified. Leaves both sides connected.
pub fn connect(session: &mut Session, server: &mut CannedServer) {
    handshake_until_client_finished(session, server);
    assert_eq!(server.client_finished_ok, Some(true));

    let fin = server.ccs_and_finished_datagram(false);
    session.handle_datagram(&fin).unwrap();
}
