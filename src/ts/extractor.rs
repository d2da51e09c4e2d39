use super::packet::TSPacket;
use super::pes::PESAssembler;
use super::pool::BufferPools;
use super::sample::VideoSample;
use crate::error::Result;
use bytes::BytesMut;
use crossbeam::queue::SegQueue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Callback invoked when a finished unit lands in the output queue, with the
/// current queue depth and the unit's PTS (0 when absent).
type SampleReadyFn = dyn Fn(usize, u64) + Send + Sync;

/// Callback invoked for valid packets on PIDs other than the tracked one.
type CustomPidFn = dyn Fn(&TSPacket) + Send + Sync;

/// State shared between the extractor, its handles and the samples they
/// produce.
#[derive(Debug)]
struct Shared {
    out: SegQueue<PESAssembler>,
    good: AtomicU64,
    bad: AtomicU64,
    pools: Arc<BufferPools>,
}

/// Routes TS packets into reassembled video access units.
///
/// The extractor tracks one video PID. Packets for that PID feed the active
/// [`PESAssembler`]; a payload-unit-start packet closes the unit under
/// construction, and units that are both valid and complete are promoted to
/// a lock-free output queue for consumers to drain.
///
/// Ingestion (`submit_*`) takes `&mut self`: exactly one thread drives the
/// state machine. Consumption is concurrent: clone an [`ExtractorHandle`]
/// per consumer thread. No path blocks: empty pools allocate, an empty
/// output queue dequeues `None`, and a slow or panicking subscriber callback
/// never stalls or unwinds into ingestion.
pub struct TSExtractor {
    video_pid: u16,
    pes: Option<PESAssembler>,
    shared: Arc<Shared>,
    sample_ready: Option<Box<SampleReadyFn>>,
    custom_pid: Option<Box<CustomPidFn>>,
}

impl TSExtractor {
    /// Creates an extractor tracking `video_pid`.
    pub fn new(video_pid: u16) -> Self {
        Self {
            video_pid,
            pes: None,
            shared: Arc::new(Shared {
                out: SegQueue::new(),
                good: AtomicU64::new(0),
                bad: AtomicU64::new(0),
                pools: Arc::new(BufferPools::new()),
            }),
            sample_ready: None,
            custom_pid: None,
        }
    }

    /// The PID whose packets are reassembled into video units.
    pub fn video_pid(&self) -> u16 {
        self.video_pid
    }

    /// Returns a cloneable consumer-side handle.
    pub fn handle(&self) -> ExtractorHandle {
        ExtractorHandle {
            shared: self.shared.clone(),
        }
    }

    /// Registers the sample-ready subscriber.
    ///
    /// The callback runs on the ingestion thread but behind a result-ignoring
    /// boundary: a panic inside it is caught, logged and discarded.
    pub fn set_sample_ready<F>(&mut self, callback: F)
    where
        F: Fn(usize, u64) + Send + Sync + 'static,
    {
        self.sample_ready = Some(Box::new(callback));
    }

    /// Registers a pass-through hook for valid packets on other PIDs.
    ///
    /// The packet is observed before its buffer is recycled; the hook cannot
    /// keep it.
    pub fn set_custom_pid_handler<F>(&mut self, callback: F)
    where
        F: Fn(&TSPacket) + Send + Sync + 'static,
    {
        self.custom_pid = Some(Box::new(callback));
    }

    /// Submits one raw 188-byte unit.
    ///
    /// Ownership of the buffer transfers to the extractor; it ends up back
    /// in the packet pool once consumed. Returns `false` for units that are
    /// not valid TS packets.
    pub fn submit_raw(&mut self, data: BytesMut) -> bool {
        self.submit_packet(TSPacket::new(data))
    }

    /// Submits one parsed TS packet.
    ///
    /// Transport-invalid packets are pooled and refused. Valid packets on
    /// other PIDs are handed to the custom-PID hook, pooled, and accepted.
    /// Packets on the tracked PID drive the reassembly state machine.
    pub fn submit_packet(&mut self, packet: TSPacket) -> bool {
        if !packet.is_valid() {
            log::debug!("dropping transport-invalid packet");
            self.shared.pools.packets.put(packet.into_buffer());
            return false;
        }

        if packet.pid() != self.video_pid {
            if let Some(hook) = &self.custom_pid {
                hook(&packet);
            }
            self.shared.pools.packets.put(packet.into_buffer());
            return true; // valid packet, just not ours
        }

        if packet.payload_unit_start() && self.pes.is_some() {
            if let Some(finished) = self.pes.take() {
                self.finalize(finished);
            }
            self.pes = Some(PESAssembler::new(packet));
        } else if let Some(pes) = &mut self.pes {
            pes.add(packet);
        } else {
            // still searching for a unit boundary; seed from whatever we have
            self.pes = Some(PESAssembler::new(packet));
        }

        true
    }

    /// Reads 188-byte units from `reader` into pooled buffers and submits
    /// them until EOF.
    ///
    /// Returns the number of units read. A trailing partial unit is
    /// discarded.
    pub async fn pump<R>(&mut self, reader: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut count = 0u64;
        loop {
            let mut buf = self.shared.pools.packets.get();
            match reader.read_exact(&mut buf[..]).await {
                Ok(_) => {
                    self.submit_raw(buf);
                    count += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.shared.pools.packets.put(buf);
                    return Ok(count);
                }
                Err(e) => {
                    self.shared.pools.packets.put(buf);
                    return Err(e.into());
                }
            }
        }
    }

    /// Count of units emitted complete and valid.
    pub fn good(&self) -> u64 {
        self.shared.good.load(Ordering::Relaxed)
    }

    /// Count of units discarded for loss or a bad start code.
    pub fn bad(&self) -> u64 {
        self.shared.bad.load(Ordering::Relaxed)
    }

    /// Units currently waiting in the output queue.
    pub fn sample_count(&self) -> usize {
        self.shared.out.len()
    }

    /// Closes out a unit at its boundary.
    fn finalize(&self, pes: PESAssembler) {
        if pes.is_valid() && pes.is_complete() {
            let pts = pes.pts();
            self.shared.out.push(pes);
            self.shared.good.fetch_add(1, Ordering::Relaxed);
            self.notify(self.shared.out.len(), pts);
        } else {
            self.shared.bad.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "discarding unit: valid={} complete={}",
                pes.is_valid(),
                pes.is_complete()
            );
            // lossy units are dropped outright, not recycled
        }
    }

    /// Best-effort subscriber dispatch; never unwinds into ingestion.
    fn notify(&self, depth: usize, pts: u64) {
        if let Some(callback) = &self.sample_ready {
            if catch_unwind(AssertUnwindSafe(|| callback(depth, pts))).is_err() {
                log::warn!("sample-ready callback panicked; continuing");
            }
        }
    }
}

/// Cloneable consumer-side view of a [`TSExtractor`].
///
/// Handles share the output queue, the pools and the counters; any number of
/// threads may hold one. All operations are non-blocking.
#[derive(Debug, Clone)]
pub struct ExtractorHandle {
    shared: Arc<Shared>,
}

impl ExtractorHandle {
    /// Pops the oldest finished unit as a materialized [`VideoSample`].
    ///
    /// The unit's payload is copied into a pooled flat buffer and its TS
    /// packet buffers are reclaimed immediately. `None` when nothing is
    /// pending.
    pub fn dequeue_sample(&self) -> Option<VideoSample> {
        let pes = self.shared.out.pop()?;
        Some(VideoSample::materialize(pes, self.shared.pools.clone()))
    }

    /// Pops the oldest finished unit as a deferred [`VideoSample`] that
    /// streams straight from its TS packets.
    pub fn dequeue_deferred(&self) -> Option<VideoSample> {
        let pes = self.shared.out.pop()?;
        Some(VideoSample::deferred(pes, self.shared.pools.clone()))
    }

    /// Returns a pooled zeroed 188-byte buffer for the upstream source to
    /// fill.
    pub fn pooled_buffer(&self) -> BytesMut {
        self.shared.pools.packets.get()
    }

    /// Returns a pooled buffer with capacity of at least `min_size`.
    pub fn large_buffer(&self, min_size: usize) -> BytesMut {
        self.shared.pools.large.get(min_size)
    }

    /// Recycles a large buffer obtained from [`large_buffer`].
    ///
    /// [`large_buffer`]: ExtractorHandle::large_buffer
    pub fn return_large_buffer(&self, buf: BytesMut) {
        self.shared.pools.large.put(buf);
    }

    /// Count of units emitted complete and valid.
    pub fn good(&self) -> u64 {
        self.shared.good.load(Ordering::Relaxed)
    }

    /// Count of units discarded for loss or a bad start code.
    pub fn bad(&self) -> u64 {
        self.shared.bad.load(Ordering::Relaxed)
    }

    /// Units currently waiting in the output queue.
    pub fn sample_count(&self) -> usize {
        self.shared.out.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::types::{STREAM_ID_H264, TS_HEADER_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    const VIDEO_PID: u16 = 256;

    fn raw_packet(pid: u16, cc: u8, pus: bool, payload: &[u8]) -> BytesMut {
        let mut data = BytesMut::zeroed(TS_PACKET_SIZE);
        data[0] = TS_SYNC_BYTE;
        data[1] = if pus { 0x40 } else { 0x00 } | ((pid >> 8) & 0x1f) as u8;
        data[2] = pid as u8;
        data[3] = 0x10 | (cc & 0x0f);
        data[TS_HEADER_SIZE..TS_HEADER_SIZE + payload.len()].copy_from_slice(payload);
        data
    }

    fn pes_start_payload(pts: Option<u64>, es_bytes: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00, 0x00, 0x01, STREAM_ID_H264, 0x00, 0x00, 0x80];
        match pts {
            Some(ts) => {
                payload.push(0x80);
                payload.push(5);
                payload.push(0x20 | (((ts >> 29) & 0x0e) as u8) | 0x01);
                payload.push((ts >> 22) as u8);
                payload.push((((ts >> 14) & 0xfe) as u8) | 0x01);
                payload.push((ts >> 7) as u8);
                payload.push((((ts << 1) & 0xfe) as u8) | 0x01);
            }
            None => {
                payload.push(0x00);
                payload.push(0);
            }
        }
        payload.extend_from_slice(es_bytes);
        payload
    }

    /// One complete unit (counters base..base+2) plus the next unit's start.
    fn feed_unit(extractor: &mut TSExtractor, base_cc: u8, pts: u64) {
        let start = pes_start_payload(Some(pts), b"unit");
        assert!(extractor.submit_raw(raw_packet(VIDEO_PID, base_cc, true, &start)));
        assert!(extractor.submit_raw(raw_packet(VIDEO_PID, base_cc + 1, false, b"mid")));
        assert!(extractor.submit_raw(raw_packet(VIDEO_PID, base_cc + 2, false, b"end")));
    }

    #[test]
    fn test_complete_unit_is_enqueued() {
        let mut extractor = TSExtractor::new(VIDEO_PID);
        let fired = Arc::new(Mutex::new(Vec::new()));
        let seen = fired.clone();
        extractor.set_sample_ready(move |count, pts| seen.lock().push((count, pts)));

        feed_unit(&mut extractor, 0, 90_000);
        // boundary packet closes the first unit
        let next = pes_start_payload(None, b"next");
        assert!(extractor.submit_raw(raw_packet(VIDEO_PID, 3, true, &next)));

        assert_eq!(extractor.good(), 1);
        assert_eq!(extractor.bad(), 0);
        assert_eq!(extractor.sample_count(), 1);
        assert_eq!(*fired.lock(), vec![(1, 90_000)]);
    }

    #[test]
    fn test_counter_gap_discards_unit() {
        let mut extractor = TSExtractor::new(VIDEO_PID);

        let start = pes_start_payload(Some(1), b"unit");
        extractor.submit_raw(raw_packet(VIDEO_PID, 0, true, &start));
        extractor.submit_raw(raw_packet(VIDEO_PID, 5, false, b"skip")); // gap
        extractor.submit_raw(raw_packet(VIDEO_PID, 6, false, b"more"));
        let next = pes_start_payload(None, b"next");
        extractor.submit_raw(raw_packet(VIDEO_PID, 7, true, &next));

        assert_eq!(extractor.good(), 0);
        assert_eq!(extractor.bad(), 1);
        assert_eq!(extractor.sample_count(), 0);
    }

    #[test]
    fn test_good_and_bad_counts_across_interleaving() {
        let mut extractor = TSExtractor::new(VIDEO_PID);

        feed_unit(&mut extractor, 0, 0); // good once closed
        let start = pes_start_payload(None, b"lossy");
        extractor.submit_raw(raw_packet(VIDEO_PID, 3, true, &start)); // closes good unit
        extractor.submit_raw(raw_packet(VIDEO_PID, 9, false, b"gap")); // poisons this one
        feed_unit(&mut extractor, 10, 0); // closes bad unit, builds another good one
        let start = pes_start_payload(None, b"tail");
        extractor.submit_raw(raw_packet(VIDEO_PID, 13, true, &start));

        assert_eq!(extractor.good(), 2);
        assert_eq!(extractor.bad(), 1);
    }

    #[test]
    fn test_invalid_packet_is_refused_and_pooled() {
        let mut extractor = TSExtractor::new(VIDEO_PID);
        let handle = extractor.handle();

        let mut data = handle.pooled_buffer();
        data[0] = 0x00; // bad sync byte
        assert!(!extractor.submit_raw(data));
        assert_eq!(extractor.good(), 0);
        assert_eq!(handle.shared.pools.packets.len(), 1);
    }

    #[test]
    fn test_other_pid_is_accepted_and_recycled() {
        let mut extractor = TSExtractor::new(VIDEO_PID);
        let handle = extractor.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pids = seen.clone();
        extractor.set_custom_pid_handler(move |p| pids.lock().push(p.pid()));

        assert!(extractor.submit_raw(raw_packet(33, 0, false, b"audio")));
        assert_eq!(*seen.lock(), vec![33]);
        assert_eq!(handle.shared.pools.packets.len(), 1);
        assert_eq!(extractor.sample_count(), 0);
    }

    #[test]
    fn test_dequeue_on_empty_queue_is_none() {
        let extractor = TSExtractor::new(VIDEO_PID);
        let handle = extractor.handle();
        assert!(handle.dequeue_sample().is_none());
        assert!(handle.dequeue_deferred().is_none());
    }

    #[test]
    fn test_dequeued_sample_carries_payload_and_pts() {
        let mut extractor = TSExtractor::new(VIDEO_PID);
        let handle = extractor.handle();

        feed_unit(&mut extractor, 0, 45_000);
        let next = pes_start_payload(None, b"next");
        extractor.submit_raw(raw_packet(VIDEO_PID, 3, true, &next));

        let sample = handle.dequeue_sample().expect("one sample pending");
        assert_eq!(sample.pts(), 45_000);
        let payload = sample.payload().expect("materialized");
        assert_eq!(&payload[..4], b"unit");
        sample.release();

        assert!(handle.dequeue_sample().is_none());
    }

    #[test]
    fn test_panicking_callback_does_not_stop_ingestion() {
        let mut extractor = TSExtractor::new(VIDEO_PID);
        extractor.set_sample_ready(|_, _| panic!("subscriber bug"));

        feed_unit(&mut extractor, 0, 0);
        let next = pes_start_payload(None, b"next");
        assert!(extractor.submit_raw(raw_packet(VIDEO_PID, 3, true, &next)));

        assert_eq!(extractor.good(), 1);
        assert_eq!(extractor.sample_count(), 1);
    }

    #[test]
    fn test_first_packet_without_start_flag_seeds_assembler() {
        let mut extractor = TSExtractor::new(VIDEO_PID);

        // mid-stream join: no payload-unit-start yet
        extractor.submit_raw(raw_packet(VIDEO_PID, 8, false, b"tail of old unit"));
        extractor.submit_raw(raw_packet(VIDEO_PID, 9, false, b"more"));
        let start = pes_start_payload(None, b"fresh");
        extractor.submit_raw(raw_packet(VIDEO_PID, 10, true, &start));

        // the seeded fragment had no start code, so it is counted bad
        assert_eq!(extractor.bad(), 1);
        assert_eq!(extractor.good(), 0);
    }
}
