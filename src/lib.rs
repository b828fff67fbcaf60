//! dpsk — DTLS 1.0 PSK client (Sans-IO core, UDP endpoint)
//!
//! dpsk is a focused client-side DTLS 1.0 implementation authenticated by
//! pre-shared keys. The core is a Sans-IO state machine ([`Session`]) you
//! feed datagrams and poll for output; on top sits an [`Endpoint`] that
//! owns a UDP socket, resolves hostnames and multiplexes any number of
//! concurrent sessions, giving applications a near-drop-in replacement for
//! an unauthenticated datagram API.
//!
//! # Goals
//! - **DTLS 1.0 PSK**: the `TLS_PSK_WITH_AES_256_CBC_SHA` and
//!   `TLS_PSK_WITH_AES_128_CBC_SHA` cipher suites over UDP.
//! - **Safety**: `forbid(unsafe_code)` throughout the crate.
//! - **Minimal Rust-only deps**: small, well-maintained Rust crypto crates.
//! - **Low overhead**: pooled, zero-on-drop buffers; Sans-IO integration.
//!
//! ## Non-goals
//! - **Server role**
//! - **DTLS 1.2+** (and certificate authentication in general)
//! - **Session resumption / renegotiation**
//! - **Handshake retransmission timers** (drive resends from your
//!   application if you need them)
//!
//! # Cryptography surface
//! - **Key exchange**: plain PSK (RFC 4279). The premaster is built from
//!   the key alone and wiped right after the master secret is derived.
//! - **Records**: AES-CBC with per-record explicit IV and HMAC-SHA1,
//!   MAC-then-encrypt (RFC 4347). Decryption verifies padding and MAC in
//!   constant time and reports a single opaque failure.
//! - **PRF**: TLS 1.0 (MD5/SHA1 dual P_hash).
//!
//! ## Sans-IO integration model
//! Drive a [`Session`] with two calls:
//! - [`Session::handle_datagram`] — feed an entire received UDP datagram.
//! - [`Session::poll_output`] — drain pending output.
//!
//! The output is an [`Output`] enum:
//! - `Packet(buf)`: send on your UDP socket
//! - `Connected`: handshake complete, queued payloads are on their way
//! - `ApplicationData(buf)`: plaintext received from the peer
//! - `Disconnected`: the session ended (close_notify or failure)
//!
//! The [`Endpoint`] wires this up to a real socket for you:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dpsk::{AddrFamily, Config, Endpoint, Event};
//!
//! fn main() -> std::io::Result<()> {
//!     let config = Arc::new(Config::default());
//!     let mut endpoint = Endpoint::new(AddrFamily::V4, config)?;
//!
//!     // Queues the payload, handshakes, then delivers it encrypted.
//!     let _ = endpoint.send(
//!         b"hello",
//!         "device.example.com",
//!         5684,
//!         b"Client_identity",
//!         &[0x01, 0x02, 0x03, 0x04],
//!     );
//!
//!     loop {
//!         endpoint.poll()?;
//!         while let Some(event) = endpoint.poll_event() {
//!             match event {
//!                 Event::Connected { peer } => println!("connected to {}", peer),
//!                 Event::Message { peer, payload } => {
//!                     println!("{} sent {} bytes", peer, payload.len())
//!                 }
//!                 Event::Disconnected { peer } => println!("{} went away", peer),
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ### MSRV
//! Rust 1.81.0
#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::upper_case_acronyms)]
#![deny(missing_docs)]

// The full DTLS 1.0 PSK handshake flow
//
// Client                                               Server
//
// 1     ClientHello                  -------->
//
// 2                                  <--------   HelloVerifyRequest
//                                                 (contains cookie)
//
// 3     ClientHello                  -------->
//       (with cookie)
// 4                                                     ServerHello
//                                    <--------      ServerHelloDone
// 5     ClientKeyExchange
//       (PSK identity)
//       [ChangeCipherSpec]
//       Finished                     -------->
// 6                                              [ChangeCipherSpec]
//                                    <--------             Finished
//       Application Data             <------->     Application Data

#[macro_use]
extern crate log;

mod client;
pub use client::ClientState;

pub mod buffer;
pub mod crypto;
pub mod message;
pub mod types;

mod engine;

mod util;

mod time_tricks;

mod error;
pub use error::Error;

mod config;
pub use config::{Config, ConfigBuilder};

mod rng;
pub use rng::SeededRng;

mod session;
pub use session::Session;

mod endpoint;
pub use endpoint::{AddrFamily, Endpoint, Event, Resolver, StdResolver, StdUdpTransport, Transport};

use buffer::Buf;

/// Output events produced by a [`Session`] when polled.
pub enum Output {
    /// A datagram to transmit to the peer.
    Packet(Buf),
    /// The handshake completed and the session is established.
    Connected,
    /// Received application data plaintext.
    ApplicationData(Buf),
    /// The session ended, either by close_notify or failure.
    Disconnected,
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Packet(v) => write!(f, "Packet({})", v.len()),
            Self::Connected => write!(f, "Connected"),
            Self::ApplicationData(v) => write!(f, "ApplicationData({})", v.len()),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}
