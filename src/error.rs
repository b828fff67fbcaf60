/// Errors produced by the DTLS engine and endpoint.
#[derive(Debug)]
pub enum Error {
    /// More input is needed to parse a complete structure.
    ParseIncomplete,
    /// Input was complete but structurally invalid.
    ParseError(nom::error::ErrorKind),
    /// A value exceeds its declared wire limit.
    OutOfRange(&'static str),
    /// A record failed decryption.
    ///
    /// MAC and padding failures are deliberately indistinguishable.
    BadRecord,
    /// A message arrived that the state machine did not expect.
    UnexpectedMessage(String),
    /// A cryptographic operation failed.
    CryptoError(String),
    /// The 48-bit record sequence (or the 16-bit epoch) would wrap.
    SequenceExhausted,
    /// The outgoing datagram queue is full.
    TransmitQueueFull,
    /// The peer closed the session with close_notify.
    PeerClosed,
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(x) => Error::ParseError(x.code),
            nom::Err::Failure(x) => Error::ParseError(x.code),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ParseIncomplete => write!(f, "incomplete input"),
            Error::ParseError(kind) => write!(f, "parse error: {:?}", kind),
            Error::OutOfRange(what) => write!(f, "value out of range: {}", what),
            Error::BadRecord => write!(f, "bad record"),
            Error::UnexpectedMessage(m) => write!(f, "unexpected message: {}", m),
            Error::CryptoError(m) => write!(f, "crypto error: {}", m),
            Error::SequenceExhausted => write!(f, "record sequence exhausted"),
            Error::TransmitQueueFull => write!(f, "transmit queue full"),
            Error::PeerClosed => write!(f, "peer closed the session"),
        }
    }
}

impl std::error::Error for Error {}
