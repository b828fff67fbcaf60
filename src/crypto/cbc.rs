//! CBC+HMAC record protection (MAC-then-encrypt with explicit IV).
//!
//! The sealed fragment layout is `IV || CBC(plaintext || MAC || padding)`,
//! where every padding byte (including the trailing length byte) equals the
//! padding length. [`open`] runs its padding and MAC checks in constant
//! time over the whole decrypted buffer and reports a single opaque failure.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes256};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::{Choice, ConstantTimeEq};

use crate::buffer::Buf;
use crate::crypto::{BulkAlgorithm, MacAlgorithm};
use crate::types::{ContentType, ProtocolVersion, Sequence};
use crate::{Error, SeededRng};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha1 = Hmac<Sha1>;

/// Compute the record MAC.
///
/// Input order is `epoch || seq48 || type || version || length || fragment`,
/// i.e. the 64-bit implicit sequence followed by the compressed-record
/// pseudo-header.
pub fn record_mac(
    mac_key: &[u8],
    sequence: Sequence,
    content_type: ContentType,
    version: ProtocolVersion,
    fragment: &[u8],
) -> Result<[u8; 20], Error> {
    let mut mac = HmacSha1::new_from_slice(mac_key)
        .map_err(|_| Error::CryptoError("invalid MAC key".to_string()))?;
    mac.update(&sequence.epoch.to_be_bytes());
    mac.update(&sequence.sequence_number.to_be_bytes()[2..]);
    mac.update(&[content_type.as_u8()]);
    mac.update(&version.as_u16().to_be_bytes());
    mac.update(&(fragment.len() as u16).to_be_bytes());
    mac.update(fragment);
    Ok(mac.finalize().into_bytes().into())
}

/// Protect a plaintext fragment, writing `IV || ciphertext` into `out`.
#[allow(clippy::too_many_arguments)]
pub fn seal(
    bulk: BulkAlgorithm,
    mac: MacAlgorithm,
    mac_key: &[u8],
    write_key: &[u8],
    sequence: Sequence,
    content_type: ContentType,
    version: ProtocolVersion,
    plaintext: &[u8],
    rng: &mut SeededRng,
    out: &mut Buf,
) -> Result<(), Error> {
    debug_assert_eq!(mac, MacAlgorithm::HmacSha1);

    let block = bulk.block_len();
    let digest = record_mac(mac_key, sequence, content_type, version, plaintext)?;

    out.clear();
    out.resize(block, 0);
    rng.fill(&mut out[..block]);

    out.extend_from_slice(plaintext);
    out.extend_from_slice(&digest);

    // padLen = block − ((len + mac + 1) mod block); padLen + 1 bytes are
    // appended, all carrying the value padLen.
    let pad_len = block - ((plaintext.len() + digest.len() + 1) % block);
    for _ in 0..=pad_len {
        out.push(pad_len as u8);
    }

    let (iv, body) = out.split_at_mut(block);
    let body_len = body.len();

    match bulk {
        BulkAlgorithm::Aes128Cbc => {
            let enc = Aes128CbcEnc::new_from_slices(write_key, iv)
                .map_err(|_| Error::CryptoError("invalid AES-128 key".to_string()))?;
            enc.encrypt_padded_mut::<NoPadding>(body, body_len)
                .map_err(|_| Error::CryptoError("CBC encrypt failed".to_string()))?;
        }
        BulkAlgorithm::Aes256Cbc => {
            let enc = Aes256CbcEnc::new_from_slices(write_key, iv)
                .map_err(|_| Error::CryptoError("invalid AES-256 key".to_string()))?;
            enc.encrypt_padded_mut::<NoPadding>(body, body_len)
                .map_err(|_| Error::CryptoError("CBC encrypt failed".to_string()))?;
        }
        BulkAlgorithm::Null => {
            return Err(Error::CryptoError("seal with null cipher".to_string()));
        }
    }

    Ok(())
}

/// Unprotect `IV || ciphertext`, writing the plaintext into `out`.
///
/// MAC and padding failures are deliberately indistinguishable
/// ([`Error::BadRecord`]), and both checks touch every byte of the
/// decrypted buffer so elapsed time does not depend on the padding value.
#[allow(clippy::too_many_arguments)]
pub fn open(
    bulk: BulkAlgorithm,
    mac: MacAlgorithm,
    mac_key: &[u8],
    read_key: &[u8],
    sequence: Sequence,
    content_type: ContentType,
    version: ProtocolVersion,
    fragment: &[u8],
    out: &mut Buf,
) -> Result<(), Error> {
    debug_assert_eq!(mac, MacAlgorithm::HmacSha1);

    let block = bulk.block_len();
    let mac_len = mac.mac_len();

    // At minimum: IV plus one ciphertext block holding MAC + padding.
    if fragment.len() <= block {
        return Err(Error::BadRecord);
    }
    let (iv, ciphertext) = fragment.split_at(block);
    if ciphertext.len() % block != 0 {
        return Err(Error::BadRecord);
    }

    out.clear();
    out.extend_from_slice(ciphertext);

    match bulk {
        BulkAlgorithm::Aes128Cbc => {
            let dec = Aes128CbcDec::new_from_slices(read_key, iv)
                .map_err(|_| Error::CryptoError("invalid AES-128 key".to_string()))?;
            dec.decrypt_padded_mut::<NoPadding>(out)
                .map_err(|_| Error::BadRecord)?;
        }
        BulkAlgorithm::Aes256Cbc => {
            let dec = Aes256CbcDec::new_from_slices(read_key, iv)
                .map_err(|_| Error::CryptoError("invalid AES-256 key".to_string()))?;
            dec.decrypt_padded_mut::<NoPadding>(out)
                .map_err(|_| Error::BadRecord)?;
        }
        BulkAlgorithm::Null => {
            return Err(Error::CryptoError("open with null cipher".to_string()));
        }
    }

    let plen = out.len();
    // Too short to hold MAC + padding length byte. Length is public, so
    // this early return leaks nothing.
    if plen < mac_len + 1 {
        return Err(Error::BadRecord);
    }

    let pad_len = out[plen - 1] as usize;

    // A padding claim that would not leave room for the MAC is treated as
    // zero padding for the rest of the checks, so the amount of work done
    // below never depends on the (secret) padding byte.
    let overflow = pad_len + 1 + mac_len > plen;
    let eff_pad = if overflow { 0 } else { pad_len };

    let mut padding_bad = Choice::from(overflow as u8);
    let pad_start = plen - 1 - eff_pad;
    let expected = pad_len as u8;
    for (i, b) in out.iter().enumerate() {
        let in_pad = ((i >= pad_start) & (i < plen - 1)) as u8;
        padding_bad |= Choice::from(in_pad) & !b.ct_eq(&expected);
    }

    let content_len = plen - eff_pad - 1 - mac_len;
    let computed = record_mac(mac_key, sequence, content_type, version, &out[..content_len])?;
    let received = &out[content_len..content_len + mac_len];
    let mac_bad = !computed[..].ct_eq(received);

    if bool::from(padding_bad | mac_bad) {
        return Err(Error::BadRecord);
    }

    out.truncate(content_len);
    Ok(())
}
