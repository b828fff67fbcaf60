//! Shared protocol types.
//!
//! Enums follow the same shape throughout: `from_u8`/`from_u16` never fail
//! (unrecognized values become `Unknown`), `as_u8`/`as_u16` invert them, and
//! `parse` reads the wire representation. Semantic rejection of unsupported
//! values is the caller's job.

use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;
use crate::crypto::{BulkAlgorithm, MacAlgorithm};
use crate::time_tricks::InstantExt;
use crate::SeededRng;

// ============================================================================
// Random
// ============================================================================

/// ClientHello / ServerHello random value (32 bytes on the wire).
///
/// The first 4 bytes are a fuzzed unix timestamp ([`Random::new_with_time`]).
/// After construction no consumer looks at sub-fields; everything goes
/// through [`bytes`](Self::bytes) or [`serialize`](Self::serialize).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Random {
    /// The 32 raw bytes of the random value.
    pub bytes: [u8; 32],
}

impl Random {
    /// Timestamp in the first 4 bytes, the remaining 28 drawn from the RNG.
    ///
    /// The timestamp is offset by a signed 24-bit random value so the
    /// hello does not fingerprint the host clock.
    pub fn new_with_time(now: Instant, rng: &mut SeededRng) -> Self {
        let gmt_unix_time = now.to_unix_duration().as_secs() as u32;
        let fuzz = (rng.random::<u32>() & 0x00FF_FFFF) as i32 - (1 << 23);
        let stamp = gmt_unix_time.wrapping_add_signed(fuzz);

        let random_bytes: [u8; 28] = rng.random();

        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&stamp.to_be_bytes());
        bytes[4..].copy_from_slice(&random_bytes);

        Self { bytes }
    }

    /// Parse a 32-byte `Random` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, data) = nom::bytes::complete::take(32_usize)(input)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(data);
        Ok((input, Random { bytes }))
    }

    /// Serialize this `Random` to wire format.
    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.bytes);
    }
}

// ============================================================================
// Content Type
// ============================================================================

/// DTLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Change Cipher Spec.
    ChangeCipherSpec,
    /// Alert message.
    Alert,
    /// Handshake message.
    Handshake,
    /// Application data.
    ApplicationData,
    /// Unknown content type.
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    /// Convert a u8 value to a `ContentType`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    /// Convert this `ContentType` to its u8 value.
    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    /// Parse a `ContentType` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = nom::number::streaming::be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

// ============================================================================
// Protocol Version
// ============================================================================

/// DTLS protocol version identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// DTLS 1.0 (0xFEFF), the only version this crate speaks.
    DTLS1_0,
    /// Unknown protocol version.
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    /// Convert this `ProtocolVersion` to its wire format u16 value.
    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    /// Parse a `ProtocolVersion` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        let protocol_version = match version {
            0xFEFF => ProtocolVersion::DTLS1_0,
            _ => ProtocolVersion::Unknown(version),
        };
        Ok((input, protocol_version))
    }

    /// Streaming variant used by the record header parser.
    pub fn parse_streaming(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = nom::number::streaming::be_u16(input)?;
        let protocol_version = match version {
            0xFEFF => ProtocolVersion::DTLS1_0,
            _ => ProtocolVersion::Unknown(version),
        };
        Ok((input, protocol_version))
    }

    /// Serialize this `ProtocolVersion` to wire format.
    pub fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

// ============================================================================
// Compression Method
// ============================================================================

/// TLS compression methods.
///
/// Only null compression is supported; anything else negotiated by a peer
/// aborts the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression.
    Null,
    /// DEFLATE compression (recognized by parsing, never accepted).
    Deflate,
    /// Unknown compression method.
    Unknown(u8),
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CompressionMethod {
    /// Convert a u8 value to a `CompressionMethod`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            0x01 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    /// Convert this `CompressionMethod` to its u8 value.
    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Deflate => 0x01,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    /// Returns true if this compression method is supported.
    pub fn is_supported(&self) -> bool {
        Self::supported().contains(self)
    }

    /// Supported compression methods (null only).
    pub const fn supported() -> &'static [CompressionMethod; 1] {
        &[CompressionMethod::Null]
    }

    /// Parse a `CompressionMethod` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}

// ============================================================================
// PSK Cipher Suites
// ============================================================================

/// Pre-shared-key cipher suites (RFC 4279) recognized by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum PskCipherSuite {
    /// TLS_PSK_WITH_AES_256_CBC_SHA (0x008D).
    PSK_AES256_CBC_SHA,
    /// TLS_PSK_WITH_AES_128_CBC_SHA (0x008C).
    PSK_AES128_CBC_SHA,
    /// Unknown or unsupported cipher suite by its IANA value.
    Unknown(u16),
}

impl Default for PskCipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl PskCipherSuite {
    /// Convert the 16-bit IANA value to a `PskCipherSuite`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x008D => PskCipherSuite::PSK_AES256_CBC_SHA,
            0x008C => PskCipherSuite::PSK_AES128_CBC_SHA,
            _ => PskCipherSuite::Unknown(value),
        }
    }

    /// Return the 16-bit IANA value for this cipher suite.
    pub fn as_u16(&self) -> u16 {
        match self {
            PskCipherSuite::PSK_AES256_CBC_SHA => 0x008D,
            PskCipherSuite::PSK_AES128_CBC_SHA => 0x008C,
            PskCipherSuite::Unknown(value) => *value,
        }
    }

    /// Parse a `PskCipherSuite` from network byte order.
    pub fn parse(input: &[u8]) -> IResult<&[u8], PskCipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, PskCipherSuite::from_u16(value)))
    }

    /// Returns true if this cipher suite is supported by this implementation.
    pub fn is_supported(&self) -> bool {
        Self::supported().contains(self)
    }

    /// Supported cipher suites in offer/preference order.
    pub const fn supported() -> &'static [PskCipherSuite; 2] {
        &[
            PskCipherSuite::PSK_AES256_CBC_SHA,
            PskCipherSuite::PSK_AES128_CBC_SHA,
        ]
    }

    /// The bulk encryption algorithm negotiated by this suite.
    pub fn bulk_algorithm(&self) -> BulkAlgorithm {
        match self {
            PskCipherSuite::PSK_AES256_CBC_SHA => BulkAlgorithm::Aes256Cbc,
            PskCipherSuite::PSK_AES128_CBC_SHA => BulkAlgorithm::Aes128Cbc,
            PskCipherSuite::Unknown(_) => BulkAlgorithm::Null,
        }
    }

    /// The record MAC algorithm negotiated by this suite.
    pub fn mac_algorithm(&self) -> MacAlgorithm {
        match self {
            PskCipherSuite::PSK_AES256_CBC_SHA | PskCipherSuite::PSK_AES128_CBC_SHA => {
                MacAlgorithm::HmacSha1
            }
            PskCipherSuite::Unknown(_) => MacAlgorithm::Null,
        }
    }

    /// Length in bytes of verify_data for Finished messages.
    pub fn verify_data_length(&self) -> usize {
        12
    }
}

// ============================================================================
// Sequence Number
// ============================================================================

/// DTLS record sequence number (epoch + 48-bit sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequence {
    /// The epoch (incremented on ChangeCipherSpec).
    pub epoch: u16,
    /// The sequence number within the epoch (technically u48).
    pub sequence_number: u64,
}

impl Sequence {
    /// Largest representable 48-bit sequence number.
    pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 48) - 1;

    /// Create a new sequence with the given epoch and sequence number 0.
    pub fn new(epoch: u16) -> Self {
        Self {
            epoch,
            sequence_number: 0,
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[epoch: {}, sequence_number: {}]",
            self.epoch, self.sequence_number,
        )
    }
}

impl Ord for Sequence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then(self.sequence_number.cmp(&other.sequence_number))
    }
}

impl PartialOrd for Sequence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Warning level (1).
    Warning,
    /// Fatal level (2).
    Fatal,
    /// Unknown level.
    Unknown(u8),
}

impl AlertLevel {
    /// Convert a u8 value to an `AlertLevel`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    /// Convert this `AlertLevel` to its u8 value.
    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }

    /// Parse an `AlertLevel` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], AlertLevel> {
        let (input, value) = be_u8(input)?;
        Ok((input, AlertLevel::from_u8(value)))
    }
}

/// Alert descriptions this client reacts to.
///
/// close_notify tears the session down; bad_record_mac is always fatal
/// regardless of the level byte. Everything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    /// close_notify (0).
    CloseNotify,
    /// bad_record_mac (20).
    BadRecordMac,
    /// Any other description.
    Unknown(u8),
}

impl AlertDescription {
    /// Convert a u8 value to an `AlertDescription`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => AlertDescription::CloseNotify,
            20 => AlertDescription::BadRecordMac,
            _ => AlertDescription::Unknown(value),
        }
    }

    /// Convert this `AlertDescription` to its u8 value.
    pub fn as_u8(&self) -> u8 {
        match self {
            AlertDescription::CloseNotify => 0,
            AlertDescription::BadRecordMac => 20,
            AlertDescription::Unknown(value) => *value,
        }
    }

    /// Parse an `AlertDescription` from wire format.
    pub fn parse(input: &[u8]) -> IResult<&[u8], AlertDescription> {
        let (input, value) = be_u8(input)?;
        Ok((input, AlertDescription::from_u8(value)))
    }
}
