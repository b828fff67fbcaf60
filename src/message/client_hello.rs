use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{CipherSuiteVec, CompressionMethodVec, Cookie, SessionId};
use crate::buffer::Buf;
use crate::types::{CompressionMethod, ProtocolVersion, PskCipherSuite, Random};
use crate::util::many1;

/// ClientHello handshake message.
///
/// A PSK hello carries no extensions; the wire format ends after the
/// compression methods.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello {
    /// The protocol version the client offers.
    pub client_version: ProtocolVersion,
    /// Client random (fuzzed timestamp + 28 random bytes).
    pub random: Random,
    /// Session id, always empty (no resumption).
    pub session_id: SessionId,
    /// Cookie from a HelloVerifyRequest, empty on the first flight.
    pub cookie: Cookie,
    /// Offered cipher suites in preference order.
    pub cipher_suites: CipherSuiteVec,
    /// Offered compression methods (null only).
    pub compression_methods: CompressionMethodVec,
}

impl ClientHello {
    /// Assemble a ClientHello from its fields.
    pub fn new(
        client_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cookie: Cookie,
        cipher_suites: CipherSuiteVec,
        compression_methods: CompressionMethodVec,
    ) -> Self {
        ClientHello {
            client_version,
            random,
            session_id,
            cookie,
            cipher_suites,
            compression_methods,
        }
    }

    /// Parse a ClientHello body.
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        let (input, input_suites) = take(cipher_suites_len)(input)?;
        let (rest, cipher_suites) = many1(PskCipherSuite::parse)(input_suites)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, compression_methods_len) = be_u8(input)?;
        let (input, input_compression) = take(compression_methods_len)(input)?;
        let (rest, compression_methods) = many1(CompressionMethod::parse)(input_compression)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
            },
        ))
    }

    /// Serialize this ClientHello body.
    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.client_version.as_u16().to_be_bytes());
        self.random.serialize(output);
        output.push(self.session_id.len() as u8);
        output.extend_from_slice(&self.session_id);
        output.push(self.cookie.len() as u8);
        output.extend_from_slice(&self.cookie);
        output.extend_from_slice(&(self.cipher_suites.len() as u16 * 2).to_be_bytes());
        for suite in &self.cipher_suites {
            output.extend_from_slice(&suite.as_u16().to_be_bytes());
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
    }
}
