use nom::bytes::complete::take;
use nom::IResult;
use smallvec::SmallVec;

use crate::buffer::Buf;

/// Finished handshake message: 12 bytes of PRF output over the transcript.
#[derive(Debug, PartialEq, Eq)]
pub struct Finished {
    /// The verify_data proving knowledge of the master secret.
    pub verify_data: SmallVec<[u8; 12]>,
}

impl Finished {
    /// Length of verify_data on the wire.
    pub const VERIFY_DATA_LEN: usize = 12;

    /// Assemble a Finished from computed verify data.
    pub fn new(verify_data: &[u8; 12]) -> Self {
        Finished {
            verify_data: SmallVec::from_slice(verify_data),
        }
    }

    /// Parse a Finished body.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        let (input, data) = take(Self::VERIFY_DATA_LEN)(input)?;
        Ok((
            input,
            Finished {
                verify_data: SmallVec::from_slice(data),
            },
        ))
    }

    /// Serialize this Finished body.
    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.verify_data);
    }
}
