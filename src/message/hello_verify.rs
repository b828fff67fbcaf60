use nom::error::{Error, ErrorKind};
use nom::IResult;

use super::Cookie;
use crate::buffer::Buf;
use crate::types::ProtocolVersion;

/// HelloVerifyRequest handshake message.
///
/// Carries the stateless cookie the client must echo in its second
/// ClientHello.
#[derive(Debug, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    /// The protocol version the server states.
    pub server_version: ProtocolVersion,
    /// The cookie to echo.
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    /// Assemble a HelloVerifyRequest.
    pub fn new(server_version: ProtocolVersion, cookie: Cookie) -> Self {
        HelloVerifyRequest {
            server_version,
            cookie,
        }
    }

    /// Parse a HelloVerifyRequest body. An empty cookie is malformed.
    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        if cookie.is_empty() {
            return Err(nom::Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }

        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie,
            },
        ))
    }

    /// Serialize this HelloVerifyRequest body.
    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.server_version.as_u16().to_be_bytes());
        output.push(self.cookie.len() as u8);
        output.extend_from_slice(&self.cookie);
    }
}
