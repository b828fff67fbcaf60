//! Wire codecs for DTLS records and handshake messages.
//!
//! Each message type follows the same contract: a constructor validating
//! field domains, `serialize` into a [`Buf`](crate::buffer::Buf), and a nom
//! `parse` returning the value plus the unconsumed input. Parsing performs
//! structural validation only; semantic checks (supported suite, expected
//! state) belong to the state machine.

mod alert;
mod change_cipher_spec;
mod client_hello;
mod client_key_exchange;
mod finished;
mod hello_verify;
mod id;
mod record;
mod server_hello;

pub use alert::Alert;
pub use change_cipher_spec::ChangeCipherSpec;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use finished::Finished;
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, InvalidLength, PskIdentity, SessionId};
pub use record::DtlsRecord;
pub use server_hello::ServerHello;

use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult};
use smallvec::SmallVec;

use crate::buffer::Buf;
use crate::types::{CompressionMethod, PskCipherSuite};

/// Cipher suite list as sent in a ClientHello.
pub type CipherSuiteVec = SmallVec<[PskCipherSuite; 2]>;

/// Compression method list as sent in a ClientHello.
pub type CompressionMethodVec = SmallVec<[CompressionMethod; 1]>;

/// Handshake message header (12 bytes on the wire).
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct Header {
    /// Handshake message type.
    pub msg_type: MessageType,
    /// Total body length (u24).
    pub length: u32,
    /// Handshake message sequence number.
    pub message_seq: u16,
    /// Fragment offset (u24); this client only handles whole messages.
    pub fragment_offset: u32,
    /// Fragment length (u24).
    pub fragment_length: u32,
}

/// A parsed handshake message: header plus body.
#[derive(Debug, PartialEq, Eq)]
pub struct Handshake {
    /// The handshake header.
    pub header: Header,
    /// The parsed body.
    pub body: Body,
}

impl Handshake {
    /// Handshake header length: msg_type(1) + length(3) + message_seq(2)
    /// + fragment_offset(3) + fragment_length(3).
    pub const HEADER_LEN: usize = 12;

    /// Parse only the 12-byte handshake header.
    pub fn parse_header(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    /// Parse a complete handshake message.
    ///
    /// Fragmented messages (offset != 0 or fragment_length != length) are
    /// rejected; reassembly is not supported.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Handshake> {
        let (input, header) = Self::parse_header(input)?;

        let is_fragment = header.fragment_offset > 0 || header.fragment_length != header.length;
        if is_fragment {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        let (input, body_bytes) = take(header.length as usize)(input)?;
        let (_, body) = Body::parse(body_bytes, header.msg_type)?;

        Ok((input, Handshake { header, body }))
    }

    /// Serialize header and body to wire format.
    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.header.msg_type.as_u8());
        output.extend_from_slice(&self.header.length.to_be_bytes()[1..]);
        output.extend_from_slice(&self.header.message_seq.to_be_bytes());
        output.extend_from_slice(&self.header.fragment_offset.to_be_bytes()[1..]);
        output.extend_from_slice(&self.header.fragment_length.to_be_bytes()[1..]);
        self.body.serialize(output);
    }
}

/// Handshake message types used by the PSK flights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// ClientHello (1).
    ClientHello,
    /// ServerHello (2).
    ServerHello,
    /// HelloVerifyRequest (3).
    HelloVerifyRequest,
    /// ServerHelloDone (14), empty body.
    ServerHelloDone,
    /// ClientKeyExchange (16).
    ClientKeyExchange,
    /// Finished (20).
    Finished,
    /// Unknown message type.
    Unknown(u8),
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl MessageType {
    /// Convert a u8 value to a `MessageType`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            14 => MessageType::ServerHelloDone,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    /// Convert this `MessageType` to its u8 value.
    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::ServerHelloDone => 14,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    /// Parse a `MessageType` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

/// Parsed handshake message body.
#[derive(Debug, PartialEq, Eq)]
pub enum Body {
    /// ClientHello body.
    ClientHello(ClientHello),
    /// ServerHello body.
    ServerHello(ServerHello),
    /// HelloVerifyRequest body.
    HelloVerifyRequest(HelloVerifyRequest),
    /// ServerHelloDone, empty.
    ServerHelloDone,
    /// ClientKeyExchange body.
    ClientKeyExchange(ClientKeyExchange),
    /// Finished body.
    Finished(Finished),
    /// Unrecognized message type, body skipped.
    Unknown(u8),
}

impl Body {
    /// Parse a body according to its message type.
    pub fn parse(input: &[u8], m: MessageType) -> IResult<&[u8], Body> {
        match m {
            MessageType::ClientHello => {
                let (input, client_hello) = ClientHello::parse(input)?;
                Ok((input, Body::ClientHello(client_hello)))
            }
            MessageType::ServerHello => {
                let (input, server_hello) = ServerHello::parse(input)?;
                Ok((input, Body::ServerHello(server_hello)))
            }
            MessageType::HelloVerifyRequest => {
                let (input, hello_verify_request) = HelloVerifyRequest::parse(input)?;
                Ok((input, Body::HelloVerifyRequest(hello_verify_request)))
            }
            MessageType::ServerHelloDone => Ok((input, Body::ServerHelloDone)),
            MessageType::ClientKeyExchange => {
                let (input, client_key_exchange) = ClientKeyExchange::parse(input)?;
                Ok((input, Body::ClientKeyExchange(client_key_exchange)))
            }
            MessageType::Finished => {
                let (input, finished) = Finished::parse(input)?;
                Ok((input, Body::Finished(finished)))
            }
            MessageType::Unknown(value) => Ok((input, Body::Unknown(value))),
        }
    }

    /// Serialize a body to wire format.
    pub fn serialize(&self, output: &mut Buf) {
        match self {
            Body::ClientHello(client_hello) => client_hello.serialize(output),
            Body::ServerHello(server_hello) => server_hello.serialize(output),
            Body::HelloVerifyRequest(hello_verify_request) => {
                hello_verify_request.serialize(output)
            }
            Body::ServerHelloDone => {
                // Empty body.
            }
            Body::ClientKeyExchange(client_key_exchange) => client_key_exchange.serialize(output),
            Body::Finished(finished) => finished.serialize(output),
            Body::Unknown(_) => {
                // Nothing to write.
            }
        }
    }
}
