use super::packet::TSPacket;
use super::pool::PacketPool;
use super::types::*;
use crate::error::Result;
use bytes::{BufMut, BytesMut};
use std::collections::VecDeque;
use std::io::Write;

/// Reassembles one Packetized Elementary Stream access unit from the TS
/// packets that carry it.
///
/// The assembler is seeded with the packet that opens the unit and fed every
/// following packet for the same PID until the next unit boundary. It keeps
/// the packets in arrival order and tracks three things:
///
/// - **completeness**: the 4-bit continuity counter must advance by exactly
///   one (mod 16) from packet to packet. The first violation latches the
///   unit incomplete for good; correct counting later on does not recover
///   it, because bytes are already missing from the middle of the unit.
/// - **validity**: the payload of the first packet must open with the video
///   PES start code `00 00 01 E0`.
/// - **timing**: the optional 33-bit PTS packed into the PES header.
///
/// Reconstruction walks the packets front to back over immutable payload
/// views, so it can be repeated any number of times without disturbing the
/// owned sequence.
#[derive(Debug)]
pub struct PESAssembler {
    packets: VecDeque<TSPacket>,
    /// Offset of the PES start code inside the first packet.
    payload_index: usize,
    last_cc: u8,
    complete: bool,
}

impl PESAssembler {
    /// Seeds a new assembler with the first packet of an access unit.
    pub fn new(first: TSPacket) -> Self {
        let payload_index = first.payload_start();
        let last_cc = first.continuity_counter();

        let mut packets = VecDeque::with_capacity(4);
        packets.push_back(first);

        Self {
            packets,
            payload_index,
            last_cc,
            // assumed complete until a counter gap proves otherwise
            complete: true,
        }
    }

    /// Appends the next packet of this access unit.
    ///
    /// Applies the continuity-counter sequencing check; any gap marks the
    /// unit incomplete permanently. The counter is tracked regardless of the
    /// check outcome so a single gap is not reported repeatedly.
    pub fn add(&mut self, next: TSPacket) {
        let cc = next.continuity_counter();
        self.packets.push_back(next);

        if self.last_cc < 15 {
            if cc != self.last_cc + 1 {
                self.complete = false;
            }
        } else if cc != 0 {
            // counter wraps 15 -> 0
            self.complete = false;
        }

        self.last_cc = cc;
    }

    /// True while no continuity-counter gap has been observed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True when the first packet's payload opens with the video PES start
    /// code `00 00 01 E0`.
    pub fn is_valid(&self) -> bool {
        let data = self.header();
        let start = self.payload_index;
        if start < TS_HEADER_SIZE || start + PES_START_CODE_LEN > data.len() {
            return false;
        }
        let code = u32::from_be_bytes([
            data[start],
            data[start + 1],
            data[start + 2],
            data[start + 3],
        ]);
        code == PES_VIDEO_START_CODE
    }

    /// Length of the optional PES header fields following the fixed header.
    pub fn pes_header_len(&self) -> usize {
        let data = self.header();
        let idx = self.payload_index + 8;
        if idx < data.len() {
            data[idx] as usize
        } else {
            0
        }
    }

    /// Whether the PES header carries a presentation timestamp.
    pub fn has_pts(&self) -> bool {
        let data = self.header();
        let idx = self.payload_index + 7;
        idx < data.len() && (data[idx] & 0x80) != 0
    }

    /// The 33-bit presentation timestamp in 90 kHz ticks.
    ///
    /// Returns 0 when no PTS is present or the header is too short to hold
    /// one.
    pub fn pts(&self) -> u64 {
        if !self.has_pts() || self.pes_header_len() < 5 {
            return 0;
        }

        let data = self.header();
        let i = self.payload_index + 9;
        if i + 5 > data.len() {
            return 0;
        }

        ((u64::from(data[i]) & 0x0e) << 29)
            | (u64::from(data[i + 1]) << 22)
            | ((u64::from(data[i + 2]) & 0xfe) << 14)
            | (u64::from(data[i + 3]) << 7)
            | ((u64::from(data[i + 4]) & 0xfe) >> 1)
    }

    /// Number of TS packets accumulated so far.
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// Conservative upper bound for the reconstructed payload size.
    ///
    /// Every packet carries at most 184 payload bytes, so this never
    /// under-estimates.
    pub fn estimate_buffer_size(&self) -> usize {
        self.packets.len() * TS_MAX_PAYLOAD
    }

    /// Reconstructs the access unit payload into `sink`.
    ///
    /// Packets are walked in arrival order; the first packet is copied from
    /// just past the start code, extension header and optional PES header
    /// fields, the rest in full. Returns the number of bytes written. The
    /// packet sequence is left untouched, so the reconstruction can be
    /// repeated.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<usize> {
        // bytes of the first payload taken up by PES framing
        let skip = PES_START_CODE_LEN + PES_EXT_HEADER_LEN + self.pes_header_len();

        let mut written = 0usize;
        for (i, packet) in self.packets.iter().enumerate() {
            let payload = packet.payload();
            let chunk = if i == 0 {
                if skip >= payload.len() {
                    continue;
                }
                &payload[skip..]
            } else {
                payload
            };
            sink.write_all(chunk)?;
            written += chunk.len();
        }

        Ok(written)
    }

    /// Writes the reconstructed payload into `buffer`, clearing it first.
    ///
    /// Returns `false` without touching the buffer when the unit has no PES
    /// start code.
    pub fn read_payload(&self, buffer: &mut BytesMut) -> bool {
        if !self.is_valid() {
            return false;
        }

        buffer.clear();
        // writing into a BytesMut cannot fail
        self.write_to(&mut buffer.writer()).is_ok()
    }

    /// Returns every owned packet buffer to the fixed-size pool.
    ///
    /// Consumes the assembler; ownership transfer makes a second disposal
    /// unrepresentable.
    pub fn recycle(mut self, pool: &PacketPool) {
        for packet in self.packets.drain(..) {
            pool.put(packet.into_buffer());
        }
    }

    /// First packet's data, holding the PES header region.
    fn header(&self) -> &[u8] {
        // the sequence always holds at least the seed packet
        self.packets
            .front()
            .map(|p| p.data())
            .unwrap_or(&[])
    }
}
