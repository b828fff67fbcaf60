//! Record layer engine.
//!
//! Owns the sequence/epoch counters, the per-direction cipher states, the
//! handshake transcript and the outgoing datagram queue. The state machine
//! in [`client`](crate::client) drives it through the `create_*` closures
//! and [`Engine::decode_record`].

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::{Buf, BufferPool};
use crate::crypto::{cbc, CipherState, SessionKeys};
use crate::message::{DtlsRecord, Header, MessageType};
use crate::types::{ContentType, ProtocolVersion, Sequence};
use crate::{Config, Error, SeededRng};

pub(crate) struct Engine {
    config: Arc<Config>,

    /// Seedable random number generator for deterministic testing.
    pub(crate) rng: SeededRng,

    /// Pool of buffers.
    buffers_free: BufferPool,

    /// Epoch and sequence number for the next outgoing record.
    next_out: Sequence,

    /// Highest seen inbound sequence + 1. Tracked for diagnostics only;
    /// there is no replay window.
    next_in: Sequence,

    /// Protection applied to outgoing records.
    write_state: CipherState,

    /// Protection expected on incoming records.
    read_state: CipherState,

    /// The pending state negotiated by ServerHello, installed per
    /// direction by the respective ChangeCipherSpec.
    negotiated: Option<CipherState>,

    /// Derived session keys. Set after ServerHelloDone.
    keys: Option<SessionKeys>,

    /// Next handshake message sequence number for sending.
    next_handshake_seq_no: u16,

    /// Concatenated wire bytes of every handshake message sent and
    /// received, in order. Reset when a HelloVerifyRequest arrives.
    pub(crate) transcript: Buf,

    /// Queue of outgoing datagrams.
    queue_tx: VecDeque<Buf>,
}

/// One decoded (and decrypted) record.
#[derive(Debug)]
pub(crate) struct PlainRecord {
    pub content_type: ContentType,
    pub sequence: Sequence,
    pub payload: Buf,
}

impl Engine {
    pub fn new(config: Arc<Config>) -> Self {
        let rng = SeededRng::new(config.rng_seed());

        Self {
            config,
            rng,
            buffers_free: BufferPool::default(),
            next_out: Sequence::new(0),
            next_in: Sequence::new(0),
            write_state: CipherState::plaintext(),
            read_state: CipherState::plaintext(),
            negotiated: None,
            keys: None,
            next_handshake_seq_no: 0,
            transcript: Buf::new(),
            queue_tx: VecDeque::new(),
        }
    }

    pub fn keys(&self) -> Option<&SessionKeys> {
        self.keys.as_ref()
    }

    pub fn set_keys(&mut self, keys: SessionKeys) {
        self.keys = Some(keys);
    }

    pub fn set_negotiated(&mut self, state: CipherState) {
        self.negotiated = Some(state);
    }

    pub fn next_out(&self) -> Sequence {
        self.next_out
    }

    pub fn next_in(&self) -> Sequence {
        self.next_in
    }

    /// Install the negotiated write state.
    ///
    /// Must happen atomically with sending ChangeCipherSpec: the epoch is
    /// bumped and the sequence number restarts at zero.
    pub fn activate_write(&mut self) -> Result<(), Error> {
        let negotiated = self
            .negotiated
            .ok_or_else(|| Error::UnexpectedMessage("no negotiated cipher state".to_string()))?;

        let epoch = self
            .next_out
            .epoch
            .checked_add(1)
            .ok_or(Error::SequenceExhausted)?;

        self.next_out = Sequence::new(epoch);
        self.write_state = negotiated;

        debug!("Write state active, epoch {}", epoch);
        Ok(())
    }

    /// Install the negotiated read state (inbound ChangeCipherSpec).
    ///
    /// The inbound epoch expectation is not advanced here; the record
    /// header's own epoch field is authoritative on the receive path.
    pub fn activate_read(&mut self) -> Result<(), Error> {
        let negotiated = self
            .negotiated
            .ok_or_else(|| Error::UnexpectedMessage("no negotiated cipher state".to_string()))?;

        self.read_state = negotiated;

        debug!("Read state active");
        Ok(())
    }

    /// Forget all handshake progress. Used when a HelloVerifyRequest
    /// restarts the hello exchange.
    pub fn reset_handshake(&mut self) {
        self.transcript.clear();
        self.next_handshake_seq_no = 0;
    }

    /// Create a DTLS record from a plaintext fragment filled in by `f`,
    /// protect it under the current write state and queue it for
    /// transmission, packing into the previous datagram when it fits.
    pub fn create_record<F>(&mut self, content_type: ContentType, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Buf),
    {
        if self.next_out.sequence_number > Sequence::MAX_SEQUENCE_NUMBER {
            return Err(Error::SequenceExhausted);
        }

        let mut fragment = self.buffers_free.pop();
        f(&mut fragment);

        if fragment.len() > DtlsRecord::MAX_FRAGMENT_LEN {
            self.buffers_free.push(fragment);
            return Err(Error::OutOfRange("record fragment length"));
        }

        let sequence = self.next_out;

        // Protect the fragment when the write state says so.
        let fragment = if self.write_state.is_active() {
            let keys = self
                .keys
                .as_ref()
                .ok_or_else(|| Error::CryptoError("write keys not derived".to_string()))?;

            let mut sealed = self.buffers_free.pop();
            cbc::seal(
                self.write_state.bulk,
                self.write_state.mac,
                &keys.client_write_mac,
                &keys.client_write_key,
                sequence,
                content_type,
                ProtocolVersion::DTLS1_0,
                &fragment,
                &mut self.rng,
                &mut sealed,
            )?;
            self.buffers_free.push(fragment);
            sealed
        } else {
            fragment
        };

        let record = DtlsRecord {
            content_type,
            version: ProtocolVersion::DTLS1_0,
            sequence,
            fragment: &fragment,
        };

        let record_wire_len = DtlsRecord::HEADER_LEN + fragment.len();

        // Append to the last queued datagram if the record fits within the
        // MTU, otherwise start a new datagram.
        let can_append = self
            .queue_tx
            .back()
            .map(|b| b.len() + record_wire_len <= self.config.mtu())
            .unwrap_or(false);

        if can_append {
            let last = self.queue_tx.back_mut().unwrap();
            record.serialize(last);
        } else {
            if self.queue_tx.len() >= self.config.max_queue_tx() {
                warn!("Transmit queue full (max {})", self.config.max_queue_tx());
                return Err(Error::TransmitQueueFull);
            }
            let mut datagram = self.buffers_free.pop();
            record.serialize(&mut datagram);
            self.queue_tx.push_back(datagram);
        }

        self.next_out.sequence_number += 1;
        self.buffers_free.push(fragment);

        Ok(())
    }

    /// Create a handshake message with body filled in by `f`, append its
    /// wire form to the transcript, and emit it as a record.
    pub fn create_handshake<F>(&mut self, msg_type: MessageType, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Buf),
    {
        let mut body = self.buffers_free.pop();
        f(&mut body);

        let header = Header {
            msg_type,
            length: body.len() as u32,
            message_seq: self.next_handshake_seq_no,
            fragment_offset: 0,
            fragment_length: body.len() as u32,
        };

        let mut wire = self.buffers_free.pop();
        wire.push(header.msg_type.as_u8());
        wire.extend_from_slice(&header.length.to_be_bytes()[1..]);
        wire.extend_from_slice(&header.message_seq.to_be_bytes());
        wire.extend_from_slice(&header.fragment_offset.to_be_bytes()[1..]);
        wire.extend_from_slice(&header.fragment_length.to_be_bytes()[1..]);
        wire.extend_from_slice(&body);
        self.buffers_free.push(body);

        self.transcript.extend_from_slice(&wire);
        self.next_handshake_seq_no += 1;

        let result = self.create_record(ContentType::Handshake, |fragment| {
            fragment.extend_from_slice(&wire);
        });
        self.buffers_free.push(wire);

        result
    }

    /// Append the wire bytes of a received handshake message to the
    /// transcript.
    pub fn append_inbound_transcript(&mut self, wire: &[u8]) {
        self.transcript.extend_from_slice(wire);
    }

    /// Take the next outgoing datagram, if any.
    pub fn poll_datagram(&mut self) -> Option<Buf> {
        self.queue_tx.pop_front()
    }

    /// Decode one record from `datagram` starting at `offset`.
    ///
    /// Returns the decrypted record and the number of bytes consumed, or
    /// `None` when the datagram is exhausted. A short or undecryptable
    /// record is an error; the caller abandons the rest of the datagram.
    pub fn decode_record(
        &mut self,
        datagram: &[u8],
        offset: usize,
    ) -> Result<Option<(PlainRecord, usize)>, Error> {
        let input = &datagram[offset..];
        if input.is_empty() {
            return Ok(None);
        }

        let (rest, record) = DtlsRecord::parse(input)?;
        let consumed = input.len() - rest.len();

        let mut payload = self.buffers_free.pop();

        if self.read_state.is_active() {
            let keys = self
                .keys
                .as_ref()
                .ok_or_else(|| Error::CryptoError("read keys not derived".to_string()))?;

            cbc::open(
                self.read_state.bulk,
                self.read_state.mac,
                &keys.server_write_mac,
                &keys.server_write_key,
                record.sequence,
                record.content_type,
                record.version,
                record.fragment,
                &mut payload,
            )?;
        } else {
            payload.extend_from_slice(record.fragment);
        }

        self.next_in = Sequence {
            epoch: record.sequence.epoch,
            sequence_number: record.sequence.sequence_number + 1,
        };

        let plain = PlainRecord {
            content_type: record.content_type,
            sequence: record.sequence,
            payload,
        };

        Ok(Some((plain, consumed)))
    }

}
