use nom::IResult;

use super::SessionId;
use crate::buffer::Buf;
use crate::types::{CompressionMethod, ProtocolVersion, PskCipherSuite, Random};

/// ServerHello handshake message.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello {
    /// The protocol version the server selected.
    pub server_version: ProtocolVersion,
    /// Server random.
    pub random: Random,
    /// Session id assigned by the server (unused, no resumption).
    pub session_id: SessionId,
    /// The cipher suite the server selected.
    pub cipher_suite: PskCipherSuite,
    /// The compression method the server selected.
    pub compression_method: CompressionMethod,
}

impl ServerHello {
    /// Assemble a ServerHello from its fields.
    pub fn new(
        server_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cipher_suite: PskCipherSuite,
        compression_method: CompressionMethod,
    ) -> Self {
        ServerHello {
            server_version,
            random,
            session_id,
            cipher_suite,
            compression_method,
        }
    }

    /// Parse a ServerHello body.
    ///
    /// Trailing bytes (extensions from a liberal server) are left
    /// unconsumed and ignored by the caller.
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = PskCipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
            },
        ))
    }

    /// Serialize this ServerHello body.
    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.server_version.as_u16().to_be_bytes());
        self.random.serialize(output);
        output.push(self.session_id.len() as u8);
        output.extend_from_slice(&self.session_id);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression_method.as_u8());
    }
}
