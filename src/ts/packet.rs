use super::types::*;
use bytes::BytesMut;

/// A single 188-byte TS packet backed by a pooled buffer.
///
/// Header fields are decoded once at construction; afterwards the packet is
/// read-only. Malformed input never panics: the packet is marked invalid and
/// its buffer can still be recycled through [`into_buffer`].
///
/// [`into_buffer`]: TSPacket::into_buffer
#[derive(Debug)]
pub struct TSPacket {
    data: BytesMut,
    pid: u16,
    continuity_counter: u8,
    payload_unit_start: bool,
    payload_start: usize,
    has_payload: bool,
    valid: bool,
}

impl TSPacket {
    /// Wraps a raw buffer and decodes the TS header.
    ///
    /// The packet is invalid when the buffer is not exactly 188 bytes, the
    /// sync byte is wrong, the transport-error bit is set, or the adaptation
    /// field claims more room than the packet has.
    pub fn new(data: BytesMut) -> Self {
        if data.len() != TS_PACKET_SIZE || data[0] != TS_SYNC_BYTE {
            return Self::invalid(data);
        }

        let transport_error = (data[1] & 0x80) != 0;
        let payload_unit_start = (data[1] & 0x40) != 0;
        let pid = (((data[1] & 0x1f) as u16) << 8) | data[2] as u16;
        let adaptation_field_exists = (data[3] & 0x20) != 0;
        let has_payload = (data[3] & 0x10) != 0;
        let continuity_counter = data[3] & 0x0f;

        let mut payload_start = TS_HEADER_SIZE;
        if adaptation_field_exists {
            // adaptation field = 1 length byte + `length` bytes of content
            payload_start += 1 + data[TS_HEADER_SIZE] as usize;
        }

        let valid = !transport_error && payload_start <= TS_PACKET_SIZE;

        Self {
            data,
            pid,
            continuity_counter,
            payload_unit_start,
            payload_start,
            has_payload,
            valid,
        }
    }

    fn invalid(data: BytesMut) -> Self {
        Self {
            data,
            pid: 0,
            continuity_counter: 0,
            payload_unit_start: false,
            payload_start: TS_PACKET_SIZE,
            has_payload: false,
            valid: false,
        }
    }

    /// Stream identifier this packet belongs to.
    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// 4-bit cyclic sequence number used to detect packet loss.
    pub fn continuity_counter(&self) -> u8 {
        self.continuity_counter
    }

    /// True when this packet starts a new PES.
    pub fn payload_unit_start(&self) -> bool {
        self.payload_unit_start
    }

    /// Byte offset where the payload region begins, past any adaptation field.
    pub fn payload_start(&self) -> usize {
        self.payload_start
    }

    /// Whether the packet passed transport-level validation.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whole-packet view, for header inspection.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Immutable view of the payload region.
    ///
    /// Each call returns a fresh slice; there is no read cursor to reset, so
    /// the payload can be copied out any number of times. Empty for invalid
    /// or payload-less packets.
    pub fn payload(&self) -> &[u8] {
        if self.valid && self.has_payload && self.payload_start < self.data.len() {
            &self.data[self.payload_start..]
        } else {
            &[]
        }
    }

    /// Surrenders the backing buffer so it can be returned to a pool.
    pub fn into_buffer(self) -> BytesMut {
        self.data
    }
}
