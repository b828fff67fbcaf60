//! TLS 1.0 PRF and key derivation (RFC 2246 section 5).
//!
//! `PRF(secret, label, seed) = P_MD5(S1, label + seed) XOR P_SHA1(S2, label + seed)`
//!
//! where S1/S2 are the two halves of the secret (sharing the middle byte
//! when the length is odd). Each `P_hash` is the usual HMAC expansion:
//! `A(0) = seed`, `A(i) = HMAC(secret, A(i-1))`, output blocks
//! `HMAC(secret, A(i) + seed)`.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;

use crate::buffer::Buf;
use crate::Error;

type HmacMd5 = Hmac<Md5>;
type HmacSha1 = Hmac<Sha1>;

fn bad_key<E>(_: E) -> Error {
    Error::CryptoError("invalid HMAC key".to_string())
}

// The two P_hash variants below XOR their keystream into `out`, so the
// caller zero-fills once and applies both halves on top of each other.

fn p_md5_xor(secret: &[u8], seed: &[u8], out: &mut [u8]) -> Result<(), Error> {
    let mut hmac = HmacMd5::new_from_slice(secret).map_err(bad_key)?;
    hmac.update(seed);
    let mut a = hmac.finalize().into_bytes();

    let mut filled = 0;
    while filled < out.len() {
        let mut hmac = HmacMd5::new_from_slice(secret).map_err(bad_key)?;
        hmac.update(&a);
        hmac.update(seed);
        let block = hmac.finalize().into_bytes();

        let n = (out.len() - filled).min(block.len());
        for i in 0..n {
            out[filled + i] ^= block[i];
        }
        filled += n;

        if filled < out.len() {
            let mut hmac = HmacMd5::new_from_slice(secret).map_err(bad_key)?;
            hmac.update(&a);
            a = hmac.finalize().into_bytes();
        }
    }

    Ok(())
}

fn p_sha1_xor(secret: &[u8], seed: &[u8], out: &mut [u8]) -> Result<(), Error> {
    let mut hmac = HmacSha1::new_from_slice(secret).map_err(bad_key)?;
    hmac.update(seed);
    let mut a = hmac.finalize().into_bytes();

    let mut filled = 0;
    while filled < out.len() {
        let mut hmac = HmacSha1::new_from_slice(secret).map_err(bad_key)?;
        hmac.update(&a);
        hmac.update(seed);
        let block = hmac.finalize().into_bytes();

        let n = (out.len() - filled).min(block.len());
        for i in 0..n {
            out[filled + i] ^= block[i];
        }
        filled += n;

        if filled < out.len() {
            let mut hmac = HmacSha1::new_from_slice(secret).map_err(bad_key)?;
            hmac.update(&a);
            a = hmac.finalize().into_bytes();
        }
    }

    Ok(())
}

/// TLS 1.0 PRF, filling `out` with the first `out.len()` bytes of the stream.
pub fn prf_tls10(secret: &[u8], label: &str, seed: &[u8], out: &mut [u8]) -> Result<(), Error> {
    // S1 and S2 are each ceil(len/2) bytes; an odd-length secret shares
    // its middle byte between the two.
    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut full_seed = Buf::new();
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);

    out.fill(0);
    p_md5_xor(s1, &full_seed, out)?;
    p_sha1_xor(s2, &full_seed, out)?;

    Ok(())
}

/// RFC 4279 premaster from a pre-shared key:
/// `u16(len) || 0^len || u16(len) || psk`.
pub fn premaster_from_psk(psk: &[u8]) -> Buf {
    let len = psk.len() as u16;

    let mut out = Buf::new();
    out.extend_from_slice(&len.to_be_bytes());
    out.resize(2 + psk.len(), 0);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// Derive the 48-byte master secret.
pub fn master_secret(
    premaster: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<[u8; 48], Error> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);

    let mut out = [0u8; 48];
    prf_tls10(premaster, "master secret", &seed, &mut out)?;
    Ok(out)
}

/// Derive the key block. Note the seed order flips to server || client.
pub fn key_block(
    master_secret: &[u8; 48],
    server_random: &[u8; 32],
    client_random: &[u8; 32],
    len: usize,
) -> Result<Buf, Error> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);

    let mut out = Buf::new();
    out.resize(len, 0);
    prf_tls10(master_secret, "key expansion", &seed, &mut out)?;
    Ok(out)
}

/// Finished verify_data over the handshake transcript.
///
/// `label` is "client finished" for our own Finished and "server finished"
/// when checking the peer's.
pub fn verify_data(
    master_secret: &[u8; 48],
    label: &str,
    transcript: &[u8],
) -> Result<[u8; 12], Error> {
    let md5 = Md5::digest(transcript);
    let sha1 = Sha1::digest(transcript);

    let mut seed = [0u8; 36];
    seed[..16].copy_from_slice(&md5);
    seed[16..].copy_from_slice(&sha1);

    let mut out = [0u8; 12];
    prf_tls10(master_secret, label, &seed, &mut out)?;
    Ok(out)
}
