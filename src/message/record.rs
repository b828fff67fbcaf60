//! DTLS record layer framing.

use std::fmt;

use nom::bytes::streaming::take;
use nom::number::streaming::be_u16;
use nom::{Err, IResult};

use crate::buffer::Buf;
use crate::types::{ContentType, ProtocolVersion, Sequence};
use crate::util::be_u48;

/// A single DTLS record as it appears on the wire.
///
/// The fragment borrows from the datagram it was parsed from; for an
/// encrypted record it is `IV || ciphertext`, otherwise the cleartext.
#[derive(PartialEq, Eq)]
pub struct DtlsRecord<'a> {
    /// The content type of this record.
    pub content_type: ContentType,
    /// The protocol version (always DTLS 1.0).
    pub version: ProtocolVersion,
    /// The epoch and sequence number.
    pub sequence: Sequence,
    /// The record fragment.
    pub fragment: &'a [u8],
}

impl<'a> DtlsRecord<'a> {
    /// Record header length: type(1) + version(2) + epoch(2) + seq(6) + length(2).
    pub const HEADER_LEN: usize = 13;

    /// Largest allowed plaintext fragment (2^14).
    pub const MAX_FRAGMENT_LEN: usize = 1 << 14;

    /// Parse a record from the input buffer.
    ///
    /// Streaming: a buffer shorter than header + declared length yields
    /// `Incomplete`, which surfaces as `Error::ParseIncomplete`.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], DtlsRecord<'a>> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse_streaming(input)?;

        if version != ProtocolVersion::DTLS1_0 {
            return Err(Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }

        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;
        let (rest, fragment) = take(length as usize)(input)?;

        let sequence = Sequence {
            epoch,
            sequence_number,
        };

        Ok((
            rest,
            DtlsRecord {
                content_type,
                version,
                sequence,
                fragment,
            },
        ))
    }

    /// Serialize this record to the output buffer.
    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.extend_from_slice(&self.sequence.epoch.to_be_bytes());
        output.extend_from_slice(&self.sequence.sequence_number.to_be_bytes()[2..]);
        output.extend_from_slice(&(self.fragment.len() as u16).to_be_bytes());
        output.extend_from_slice(self.fragment);
    }
}

impl fmt::Debug for DtlsRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsRecord")
            .field("content_type", &self.content_type)
            .field("version", &self.version)
            .field("sequence", &self.sequence)
            .field("fragment_len", &self.fragment.len())
            .finish()
    }
}
