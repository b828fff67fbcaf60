//! Cryptographic state for the record layer.
//!
//! The PRF lives in [`prf`], the CBC+HMAC record transforms in [`cbc`].
//! This module holds the negotiated algorithm descriptors and the derived
//! session keys.

pub mod cbc;
pub mod prf;

use zeroize::Zeroize;

use crate::buffer::Buf;
use crate::types::{CompressionMethod, PskCipherSuite};
use crate::{Error, SeededRng};

/// Bulk encryption algorithms for record protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkAlgorithm {
    /// No encryption (initial state).
    #[default]
    Null,
    /// AES-128 in CBC mode with per-record explicit IV.
    Aes128Cbc,
    /// AES-256 in CBC mode with per-record explicit IV.
    Aes256Cbc,
}

impl BulkAlgorithm {
    /// Encryption key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            BulkAlgorithm::Null => 0,
            BulkAlgorithm::Aes128Cbc => 16,
            BulkAlgorithm::Aes256Cbc => 32,
        }
    }

    /// Cipher block (and explicit IV) length in bytes.
    pub fn block_len(&self) -> usize {
        match self {
            BulkAlgorithm::Null => 0,
            BulkAlgorithm::Aes128Cbc | BulkAlgorithm::Aes256Cbc => 16,
        }
    }
}

/// Record MAC algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacAlgorithm {
    /// No MAC (initial state).
    #[default]
    Null,
    /// HMAC-SHA1.
    HmacSha1,
}

impl MacAlgorithm {
    /// MAC output (and MAC key) length in bytes.
    pub fn mac_len(&self) -> usize {
        match self {
            MacAlgorithm::Null => 0,
            MacAlgorithm::HmacSha1 => 20,
        }
    }
}

/// Security parameters for one direction of the connection.
///
/// Both directions start as [`CipherState::plaintext`] and swap to the
/// negotiated state when the respective ChangeCipherSpec is sent/received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherState {
    /// Bulk encryption algorithm.
    pub bulk: BulkAlgorithm,
    /// Record MAC algorithm.
    pub mac: MacAlgorithm,
    /// Compression (always null).
    pub compression: CompressionMethod,
}

impl CipherState {
    /// The initial state: no encryption, no MAC.
    pub fn plaintext() -> Self {
        CipherState {
            bulk: BulkAlgorithm::Null,
            mac: MacAlgorithm::Null,
            compression: CompressionMethod::Null,
        }
    }

    /// The pending state for a negotiated cipher suite.
    pub fn for_suite(suite: PskCipherSuite) -> Self {
        CipherState {
            bulk: suite.bulk_algorithm(),
            mac: suite.mac_algorithm(),
            compression: CompressionMethod::Null,
        }
    }

    /// Whether records under this state are protected at all.
    pub fn is_active(&self) -> bool {
        self.bulk != BulkAlgorithm::Null || self.mac != MacAlgorithm::Null
    }
}

impl Default for CipherState {
    fn default() -> Self {
        Self::plaintext()
    }
}

/// Keying material for an established session.
///
/// All fields are zeroed when the struct is dropped. The premaster secret
/// never lives here; it is derived, consumed and wiped inside
/// [`SessionKeys::derive`].
pub struct SessionKeys {
    /// 48-byte TLS master secret.
    pub master_secret: [u8; 48],
    /// Client hello random (not secret, kept for reference).
    pub client_random: [u8; 32],
    /// Server hello random (not secret, kept for reference).
    pub server_random: [u8; 32],
    /// MAC key for records we send.
    pub client_write_mac: Buf,
    /// MAC key for records we receive.
    pub server_write_mac: Buf,
    /// Encryption key for records we send.
    pub client_write_key: Buf,
    /// Encryption key for records we receive.
    pub server_write_key: Buf,
}

impl SessionKeys {
    /// Derive the full key schedule from a pre-shared key.
    ///
    /// Builds the RFC 4279 premaster, derives the master secret and the key
    /// block, then overwrites the premaster with random bytes before
    /// releasing it.
    pub fn derive(
        psk: &[u8],
        client_random: [u8; 32],
        server_random: [u8; 32],
        suite: PskCipherSuite,
        rng: &mut SeededRng,
    ) -> Result<SessionKeys, Error> {
        let mut premaster = prf::premaster_from_psk(psk);
        let master_secret = prf::master_secret(&premaster, &client_random, &server_random)?;
        rng.fill(&mut premaster);
        drop(premaster);

        let mac_len = suite.mac_algorithm().mac_len();
        let key_len = suite.bulk_algorithm().key_len();

        let key_block = prf::key_block(
            &master_secret,
            &server_random,
            &client_random,
            2 * mac_len + 2 * key_len,
        )?;

        let mut at = 0;
        let mut next = |len: usize| {
            let mut out = Buf::new();
            out.extend_from_slice(&key_block[at..at + len]);
            at += len;
            out
        };

        Ok(SessionKeys {
            master_secret,
            client_random,
            server_random,
            client_write_mac: next(mac_len),
            server_write_mac: next(mac_len),
            client_write_key: next(key_len),
            server_write_key: next(key_len),
        })
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}
