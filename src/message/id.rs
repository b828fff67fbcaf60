use std::fmt;
use std::ops::Deref;

/// Error for constructing a bounded byte value with the wrong length.
pub struct InvalidLength(&'static str, usize, usize, usize);

impl fmt::Debug for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incorrect {} length: {} <= {} <= {}",
            self.0, self.1, self.3, self.2,
        )
    }
}

macro_rules! var_array {
    ($name:ident, $min:expr, $max:expr) => {
        /// Bounded opaque byte value with its wire length prefix semantics.
        #[derive(Clone, Copy)]
        pub struct $name([u8; $max], usize);

        impl $name {
            /// Construct from a slice, checking the allowed length range.
            pub fn try_new(data: &[u8]) -> Result<Self, InvalidLength> {
                #[allow(unused_comparisons)]
                if data.len() < $min || data.len() > $max {
                    return Err(InvalidLength(stringify!($name), $min, $max, data.len()));
                }
                let mut array = [0; $max];
                array[..data.len()].copy_from_slice(data);
                Ok($name(array, data.len()))
            }

            /// The empty value.
            pub fn empty() -> Self {
                $name([0; $max], 0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:02x?})", stringify!($name), &self.0[..self.1])
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.deref() == other.deref()
            }
        }

        impl Eq for $name {}

        impl Deref for $name {
            type Target = [u8];

            fn deref(&self) -> &Self::Target {
                &self.0[..self.1]
            }
        }

        impl<'a> TryFrom<&'a [u8]> for $name {
            type Error = InvalidLength;

            fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
                Self::try_new(value)
            }
        }
    };
}

var_array!(SessionId, 0, 32);
// DTLS 1.0 caps the HelloVerifyRequest cookie at 32 bytes (RFC 4347).
var_array!(Cookie, 0, 32);

macro_rules! var_array_parse {
    ($name:ident) => {
        impl $name {
            /// Parse the length-prefixed wire form (u8 length).
            pub fn parse(input: &[u8]) -> nom::IResult<&[u8], $name> {
                let (input, len) = nom::number::complete::be_u8(input)?;
                let (input, data) = nom::bytes::complete::take(len)(input)?;
                let value = $name::try_new(data).map_err(|_| {
                    nom::Err::Failure(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::LengthValue,
                    ))
                })?;
                Ok((input, value))
            }
        }
    };
}

var_array_parse!(SessionId);
var_array_parse!(Cookie);

/// PSK identity sent in the ClientKeyExchange.
///
/// Same contract as the bounded array types, but heap-backed since the wire
/// limit is 2^16 - 1 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PskIdentity(Vec<u8>);

impl PskIdentity {
    /// Construct from a slice, checking the u16 length bound.
    pub fn try_new(data: &[u8]) -> Result<Self, InvalidLength> {
        if data.len() > u16::MAX as usize {
            return Err(InvalidLength(
                "PskIdentity",
                0,
                u16::MAX as usize,
                data.len(),
            ));
        }
        Ok(PskIdentity(data.to_vec()))
    }
}

impl fmt::Debug for PskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Identities are usually printable; show them as a lossy string.
        write!(f, "PskIdentity({})", String::from_utf8_lossy(&self.0))
    }
}

impl Deref for PskIdentity {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> TryFrom<&'a [u8]> for PskIdentity {
    type Error = InvalidLength;

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl<'a> TryFrom<&'a str> for PskIdentity {
    type Error = InvalidLength;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        Self::try_new(value.as_bytes())
    }
}
