use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::PskIdentity;
use crate::buffer::Buf;

/// PSK ClientKeyExchange handshake message.
///
/// For plain PSK key exchange (RFC 4279) the body is only the identity:
/// `identity_len(2) || identity`.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientKeyExchange {
    /// The PSK identity the client authenticates with.
    pub identity: PskIdentity,
}

impl ClientKeyExchange {
    /// Assemble a ClientKeyExchange.
    pub fn new(identity: PskIdentity) -> Self {
        ClientKeyExchange { identity }
    }

    /// Parse a ClientKeyExchange body.
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientKeyExchange> {
        let (input, identity_len) = be_u16(input)?;
        let (input, data) = take(identity_len)(input)?;
        let identity = PskIdentity::try_new(data).map_err(|_| {
            nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::LengthValue,
            ))
        })?;

        Ok((input, ClientKeyExchange { identity }))
    }

    /// Serialize this ClientKeyExchange body.
    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&(self.identity.len() as u16).to_be_bytes());
        output.extend_from_slice(&self.identity);
    }
}
