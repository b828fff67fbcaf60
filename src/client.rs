// DTLS 1.0 PSK client handshake flow:
//
// 1. Client sends ClientHello (empty cookie)
// 2. Server responds with HelloVerifyRequest containing a cookie
//    - Client sends the ClientHello again, echoing the cookie
// 3. Server sends ServerHello, ServerHelloDone
// 4. Client sends ClientKeyExchange (PSK identity),
//    [ChangeCipherSpec], Finished
// 5. Server sends [ChangeCipherSpec], Finished
// 6. Handshake complete, application data can flow

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use subtle::ConstantTimeEq;

use crate::buffer::{Buf, ToBuf};
use crate::crypto::{prf, CipherState, SessionKeys};
use crate::engine::{Engine, PlainRecord};
use crate::message::{
    Alert, Body, ChangeCipherSpec, ClientHello, ClientKeyExchange, Cookie, DtlsRecord, Finished,
    Handshake, MessageType, PskIdentity, SessionId,
};
use crate::types::{AlertDescription, CompressionMethod, ContentType};
use crate::types::{PskCipherSuite, Random};
use crate::{Config, Error, Output};

pub(crate) struct Client {
    /// Client random (fuzzed timestamp). Input to the key schedule.
    random: Random,

    /// Cookie from the HelloVerifyRequest. Empty on the first flight.
    cookie: Option<Cookie>,

    /// Whether a HelloVerifyRequest is still acceptable. Only one hello
    /// restart is allowed.
    can_hello_verify: bool,

    /// The cipher suite in use. Set by ServerHello.
    cipher_suite: Option<PskCipherSuite>,

    /// Server random. Set by ServerHello.
    server_random: Option<Random>,

    /// The identity sent in the ClientKeyExchange.
    psk_identity: PskIdentity,

    /// The pre-shared key itself. Zeroed on drop.
    psk: Buf,

    /// Current client state.
    state: ClientState,

    /// Record layer engine.
    engine: Engine,

    /// Events waiting to be polled.
    events: VecDeque<Output>,
}

/// Current state of the client handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No hello sent yet.
    NotConnected,
    /// ClientHello sent, waiting for the server flight.
    ClientHelloSent,
    /// Our Finished is out, waiting for the server's.
    FinishedSent,
    /// Handshake complete, application data flows.
    Connected,
    /// Terminal: a protocol violation or MAC failure killed the session.
    Failed,
    /// Terminal: closed by close_notify or the application.
    Closed,
}

impl Client {
    pub fn new(now: Instant, config: Arc<Config>, psk_identity: PskIdentity, psk: &[u8]) -> Client {
        let mut engine = Engine::new(config);
        let random = Random::new_with_time(now, &mut engine.rng);

        Client {
            random,
            cookie: None,
            can_hello_verify: true,
            cipher_suite: None,
            server_random: None,
            psk_identity,
            psk: psk.to_buf(),
            state: ClientState::NotConnected,
            engine,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Start the handshake by emitting the first ClientHello.
    pub fn connect(&mut self) -> Result<(), Error> {
        if self.state != ClientState::NotConnected {
            return Err(Error::UnexpectedMessage("connect on started session".to_string()));
        }

        self.send_client_hello()?;
        self.state = ClientState::ClientHelloSent;
        Ok(())
    }

    /// Process an incoming DTLS datagram.
    ///
    /// Records are decoded and dispatched one at a time; a record that does
    /// not decode abandons the remainder of the datagram.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Result<(), Error> {
        let mut offset = 0;

        loop {
            if matches!(self.state, ClientState::Failed | ClientState::Closed) {
                return Ok(());
            }

            let (record, consumed) = match self.engine.decode_record(datagram, offset) {
                Ok(Some(v)) => v,
                Ok(None) => return Ok(()),
                Err(Error::BadRecord) => {
                    // Record MAC / padding failure is fatal.
                    debug!("Undecryptable record, failing session");
                    self.fail();
                    return Err(Error::BadRecord);
                }
                Err(e) => {
                    debug!("Abandoning datagram: {:?}", e);
                    return Ok(());
                }
            };
            offset += consumed;

            if let Err(e) = self.dispatch_record(record) {
                debug!("Session failed: {:?}", e);
                self.fail();
                return Err(e);
            }
        }
    }

    /// Poll for pending output: datagrams to send first, then events.
    pub fn poll_output(&mut self) -> Option<Output> {
        if let Some(datagram) = self.engine.poll_datagram() {
            return Some(Output::Packet(datagram));
        }
        self.events.pop_front()
    }

    /// Send application data over the established session.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.state != ClientState::Connected {
            return Err(Error::UnexpectedMessage("not connected".to_string()));
        }
        if data.len() > DtlsRecord::MAX_FRAGMENT_LEN {
            return Err(Error::OutOfRange("application payload length"));
        }

        self.engine
            .create_record(ContentType::ApplicationData, |fragment| {
                fragment.extend_from_slice(data);
            })
    }

    /// Application-initiated close. No close_notify is sent.
    pub fn close(&mut self) {
        self.state = ClientState::Closed;
    }

    fn fail(&mut self) {
        if matches!(self.state, ClientState::Failed | ClientState::Closed) {
            return;
        }
        self.state = ClientState::Failed;
        self.events.push_back(Output::Disconnected);
    }

    fn dispatch_record(&mut self, record: PlainRecord) -> Result<(), Error> {
        match record.content_type {
            ContentType::Handshake => self.process_handshake_payload(&record.payload),
            ContentType::ChangeCipherSpec => self.process_change_cipher_spec(&record.payload),
            ContentType::Alert => self.process_alert(&record.payload),
            ContentType::ApplicationData => self.process_application_data(record.payload),
            ContentType::Unknown(v) => {
                Err(Error::UnexpectedMessage(format!("content type {}", v)))
            }
        }
    }

    fn process_handshake_payload(&mut self, payload: &[u8]) -> Result<(), Error> {
        // A record may carry several handshake messages back to back.
        let mut offset = 0;
        while offset < payload.len() {
            let input = &payload[offset..];
            let (rest, handshake) = Handshake::parse(input)?;
            let consumed = input.len() - rest.len();
            let wire = &input[..consumed];
            offset += consumed;

            self.process_handshake(handshake, wire)?;

            if matches!(self.state, ClientState::Failed | ClientState::Closed) {
                break;
            }
        }
        Ok(())
    }

    fn process_handshake(&mut self, handshake: Handshake, wire: &[u8]) -> Result<(), Error> {
        match (self.state, handshake.header.msg_type) {
            (ClientState::ClientHelloSent, MessageType::HelloVerifyRequest) => {
                if !self.can_hello_verify {
                    return Err(Error::UnexpectedMessage(
                        "second HelloVerifyRequest".to_string(),
                    ));
                }
                self.can_hello_verify = false;

                let Body::HelloVerifyRequest(hello_verify) = handshake.body else {
                    return Err(Error::UnexpectedMessage("bad HelloVerifyRequest".to_string()));
                };

                // The transcript restarts from the cookie-carrying hello;
                // neither the first hello nor the HelloVerifyRequest is
                // part of it.
                self.cookie = Some(hello_verify.cookie);
                self.engine.reset_handshake();
                self.send_client_hello()
            }
            (ClientState::ClientHelloSent, MessageType::ServerHello) => {
                let Body::ServerHello(server_hello) = handshake.body else {
                    return Err(Error::UnexpectedMessage("bad ServerHello".to_string()));
                };

                if !server_hello.cipher_suite.is_supported() {
                    return Err(Error::UnexpectedMessage(format!(
                        "unsupported cipher suite 0x{:04X}",
                        server_hello.cipher_suite.as_u16()
                    )));
                }
                if server_hello.compression_method != CompressionMethod::Null {
                    return Err(Error::UnexpectedMessage(
                        "non-null compression".to_string(),
                    ));
                }

                self.engine.append_inbound_transcript(wire);
                self.server_random = Some(server_hello.random);
                self.cipher_suite = Some(server_hello.cipher_suite);
                self.engine
                    .set_negotiated(CipherState::for_suite(server_hello.cipher_suite));

                Ok(())
            }
            (ClientState::ClientHelloSent, MessageType::ServerHelloDone) => {
                let suite = self.cipher_suite.ok_or_else(|| {
                    Error::UnexpectedMessage("ServerHelloDone before ServerHello".to_string())
                })?;
                let server_random = self.server_random.ok_or_else(|| {
                    Error::UnexpectedMessage("ServerHelloDone before ServerHello".to_string())
                })?;

                self.engine.append_inbound_transcript(wire);
                self.send_keys_and_finished(suite, server_random)
            }
            (ClientState::FinishedSent, MessageType::Finished) => {
                let Body::Finished(finished) = &handshake.body else {
                    return Err(Error::UnexpectedMessage("bad Finished".to_string()));
                };

                let keys = self
                    .engine
                    .keys()
                    .ok_or_else(|| Error::CryptoError("keys not derived".to_string()))?;

                // The expected value covers the transcript as it was before
                // this Finished arrived.
                let expected = prf::verify_data(
                    &keys.master_secret,
                    "server finished",
                    &self.engine.transcript,
                )?;

                let ok: bool = expected[..].ct_eq(&finished.verify_data[..]).into();
                if !ok {
                    return Err(Error::UnexpectedMessage(
                        "server Finished verification failed".to_string(),
                    ));
                }

                self.engine.append_inbound_transcript(wire);
                self.state = ClientState::Connected;
                self.events.push_back(Output::Connected);

                debug!("Handshake complete");
                Ok(())
            }
            (state, msg_type) => Err(Error::UnexpectedMessage(format!(
                "{:?} in state {:?}",
                msg_type, state
            ))),
        }
    }

    fn send_client_hello(&mut self) -> Result<(), Error> {
        let cookie = self.cookie.unwrap_or_else(Cookie::empty);

        let client_hello = ClientHello::new(
            crate::types::ProtocolVersion::DTLS1_0,
            self.random,
            SessionId::empty(),
            cookie,
            PskCipherSuite::supported().iter().copied().collect(),
            CompressionMethod::supported().iter().copied().collect(),
        );

        self.engine
            .create_handshake(MessageType::ClientHello, |body| {
                client_hello.serialize(body);
            })
    }

    /// Flight 5: ClientKeyExchange, key derivation, ChangeCipherSpec and
    /// Finished, in that order and without yielding in between.
    fn send_keys_and_finished(
        &mut self,
        suite: PskCipherSuite,
        server_random: Random,
    ) -> Result<(), Error> {
        let client_key_exchange = ClientKeyExchange::new(self.psk_identity.clone());
        self.engine
            .create_handshake(MessageType::ClientKeyExchange, |body| {
                client_key_exchange.serialize(body);
            })?;

        let keys = SessionKeys::derive(
            &self.psk,
            self.random.bytes,
            server_random.bytes,
            suite,
            &mut self.engine.rng,
        )?;
        self.engine.set_keys(keys);

        // ChangeCipherSpec still travels under the null write state; the
        // swap to the negotiated state is atomic with sending it.
        self.engine
            .create_record(ContentType::ChangeCipherSpec, |fragment| {
                ChangeCipherSpec.serialize(fragment);
            })?;
        self.engine.activate_write()?;

        // Our Finished covers the transcript up to but not including itself.
        let verify = {
            let keys = self
                .engine
                .keys()
                .ok_or_else(|| Error::CryptoError("keys not derived".to_string()))?;
            prf::verify_data(&keys.master_secret, "client finished", &self.engine.transcript)?
        };

        let finished = Finished::new(&verify);
        self.engine
            .create_handshake(MessageType::Finished, |body| {
                finished.serialize(body);
            })?;

        self.state = ClientState::FinishedSent;
        Ok(())
    }

    fn process_change_cipher_spec(&mut self, payload: &[u8]) -> Result<(), Error> {
        if self.state != ClientState::FinishedSent {
            return Err(Error::UnexpectedMessage(format!(
                "ChangeCipherSpec in state {:?}",
                self.state
            )));
        }

        ChangeCipherSpec::parse(payload)?;
        self.engine.activate_read()
    }

    fn process_alert(&mut self, payload: &[u8]) -> Result<(), Error> {
        let (_, alert) = Alert::parse(payload)?;

        match alert.description {
            AlertDescription::CloseNotify => {
                debug!("Peer closed with close_notify");
                self.state = ClientState::Closed;
                self.events.push_back(Output::Disconnected);
                Ok(())
            }
            // Fatal regardless of the level byte.
            AlertDescription::BadRecordMac => Err(Error::UnexpectedMessage(
                "bad_record_mac alert".to_string(),
            )),
            AlertDescription::Unknown(d) => {
                trace!("Ignoring alert {:?} ({})", alert.level, d);
                Ok(())
            }
        }
    }

    fn process_application_data(&mut self, payload: Buf) -> Result<(), Error> {
        if self.state != ClientState::Connected {
            return Err(Error::UnexpectedMessage(
                "application data before Finished".to_string(),
            ));
        }

        self.events.push_back(Output::ApplicationData(payload));
        Ok(())
    }
}
