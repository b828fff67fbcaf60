use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

use crate::buffer::Buf;

/// ChangeCipherSpec message: a single byte with value 1.
///
/// Travels in its own record content type, not as a handshake message, and
/// is therefore never part of the transcript.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCipherSpec;

impl ChangeCipherSpec {
    /// Parse a ChangeCipherSpec body. Any value other than 1 is malformed.
    pub fn parse(input: &[u8]) -> IResult<&[u8], ChangeCipherSpec> {
        let (input, value) = be_u8(input)?;
        if value != 1 {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        Ok((input, ChangeCipherSpec))
    }

    /// Serialize this ChangeCipherSpec body.
    pub fn serialize(&self, output: &mut Buf) {
        output.push(1);
    }
}
