use super::pes::PESAssembler;
use super::pool::BufferPools;
use super::types::pts_to_time;
use crate::error::Result;
use bytes::BytesMut;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// One reassembled video access unit, ready for a decoder.
///
/// A sample holds its payload in exactly one of two forms:
///
/// - **materialized**: a flat buffer from the large-buffer pool, filled with
///   the Annex-B byte stream;
/// - **deferred**: the still-owned [`PESAssembler`], for callers that want
///   to stream the payload straight to a sink without an intermediate copy.
///
/// Either way the sample owns pooled resources until [`release`] hands them
/// back. Dropping an unreleased sample reclaims them too, so a sample can
/// never strand pool capacity.
///
/// [`release`]: VideoSample::release
#[derive(Debug)]
pub struct VideoSample {
    buffer: Option<BytesMut>,
    pes: Option<PESAssembler>,
    pts: u64,
    length: usize,
    pools: Arc<BufferPools>,
}

impl VideoSample {
    /// Materializes a finished unit into a pooled flat buffer.
    ///
    /// On payload failure the buffer goes straight back to the pool and the
    /// sample comes out empty. The unit's TS packet buffers are reclaimed
    /// immediately in both cases.
    pub(crate) fn materialize(pes: PESAssembler, pools: Arc<BufferPools>) -> Self {
        let mut buf = pools.large.get(pes.estimate_buffer_size());
        let got_payload = pes.read_payload(&mut buf);
        let pts = pes.pts();

        let (buffer, length) = if got_payload {
            let len = buf.len();
            (Some(buf), len)
        } else {
            pools.large.put(buf);
            (None, 0)
        };

        pes.recycle(&pools.packets);

        Self {
            buffer,
            pes: None,
            pts,
            length,
            pools,
        }
    }

    /// Wraps a finished unit without copying it.
    ///
    /// [`len`] reports the unit's size estimate until the payload is written
    /// out.
    ///
    /// [`len`]: VideoSample::len
    pub(crate) fn deferred(pes: PESAssembler, pools: Arc<BufferPools>) -> Self {
        let pts = pes.pts();
        let length = pes.estimate_buffer_size();

        Self {
            buffer: None,
            pes: Some(pes),
            pts,
            length,
            pools,
        }
    }

    /// The materialized payload, if this sample carries one.
    pub fn payload(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    /// Presentation timestamp in 90 kHz ticks; 0 when the unit had none.
    pub fn pts(&self) -> u64 {
        self.pts
    }

    /// Presentation timestamp as a [`Duration`].
    pub fn pts_duration(&self) -> Duration {
        pts_to_time(self.pts)
    }

    /// Payload bytes for a materialized sample, or the size estimate for a
    /// deferred one.
    pub fn len(&self) -> usize {
        self.length
    }

    /// True when the sample carries no payload at all.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_none() && self.pes.is_none()
    }

    /// Writes the payload to `sink`, returning the bytes written.
    ///
    /// Deferred samples reconstruct straight from their TS packets;
    /// materialized samples copy the flat buffer.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<usize> {
        if let Some(pes) = &self.pes {
            return pes.write_to(sink);
        }
        if let Some(buf) = &self.buffer {
            sink.write_all(buf)?;
            return Ok(buf.len());
        }
        Ok(0)
    }

    /// Returns everything this sample owns to the pools.
    ///
    /// Consuming `self` makes a second release unrepresentable; dropping an
    /// unreleased sample performs the same reclamation.
    pub fn release(mut self) {
        self.reclaim();
    }

    fn reclaim(&mut self) {
        if let Some(pes) = self.pes.take() {
            pes.recycle(&self.pools.packets);
        }
        if let Some(buf) = self.buffer.take() {
            self.pools.large.put(buf);
        }
    }
}

impl Drop for VideoSample {
    fn drop(&mut self) {
        self.reclaim();
    }
}
