use std::time::Duration;

/// Fixed size of a TS packet in bytes.
pub const TS_PACKET_SIZE: usize = 188;
/// Size of the fixed TS packet header.
pub const TS_HEADER_SIZE: usize = 4;
/// Sync byte opening every TS packet.
pub const TS_SYNC_BYTE: u8 = 0x47;

/// PES stream id carried by H.264 video.
pub const STREAM_ID_H264: u8 = 0xe0;
/// Big-endian start code opening a video PES payload: `00 00 01 E0`.
pub const PES_VIDEO_START_CODE: u32 = 0x0000_01e0;
/// Bytes taken by the PES start code prefix plus stream id.
pub const PES_START_CODE_LEN: usize = 4;
/// Bytes of the fixed PES extension header (packet length, flags, header length).
pub const PES_EXT_HEADER_LEN: usize = 5;

/// Minimum payload bytes a TS packet can carry once the 4-byte header is
/// accounted for; used as a per-packet buffer size estimate.
pub const TS_MAX_PAYLOAD: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;

/// Ticks per second of the PTS clock.
pub const PTS_HZ: u64 = 90_000;

/// Converts a 90 kHz PTS tick count to a [`Duration`].
pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos((pts * 1_000_000_000) / PTS_HZ)
}

/// Converts a [`Duration`] to 90 kHz PTS ticks.
pub fn time_to_pts(time: Duration) -> u64 {
    time.as_nanos() as u64 * PTS_HZ / 1_000_000_000
}
