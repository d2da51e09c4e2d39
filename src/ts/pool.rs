use super::types::TS_PACKET_SIZE;
use bytes::BytesMut;
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;

/// Lock-free recycling pool for 188-byte packet buffers.
///
/// Sits on the ingestion hot path, so push/pop must not take a lock;
/// multiple producers and consumers may touch it concurrently. An empty pool
/// degrades to allocation, never to blocking.
#[derive(Debug, Default)]
pub struct PacketPool {
    buffers: SegQueue<BytesMut>,
}

impl PacketPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            buffers: SegQueue::new(),
        }
    }

    /// Returns a zeroed 188-byte buffer, recycled when one is available.
    pub fn get(&self) -> BytesMut {
        match self.buffers.pop() {
            Some(mut buf) => {
                buf.clear();
                buf.resize(TS_PACKET_SIZE, 0);
                buf
            }
            None => BytesMut::zeroed(TS_PACKET_SIZE),
        }
    }

    /// Recycles a buffer.
    ///
    /// Buffers too small to hold a whole packet are dropped rather than
    /// pooled.
    pub fn put(&self, buf: BytesMut) {
        if buf.capacity() >= TS_PACKET_SIZE {
            self.buffers.push(buf);
        }
    }

    /// Number of buffers currently pooled.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Mutex-guarded pool of variable-size output buffers, handed out by
/// best-fit search.
///
/// The linear scan is infrequent next to packet ingestion, so one coarse
/// lock around the whole pool is enough here.
#[derive(Debug, Default)]
pub struct LargeBufferPool {
    buffers: Mutex<Vec<BytesMut>>,
}

impl LargeBufferPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Returns an empty buffer with capacity of at least `min_size`.
    ///
    /// Picks the smallest pooled buffer that fits; allocates exactly
    /// `min_size` when nothing fits.
    pub fn get(&self, min_size: usize) -> BytesMut {
        let mut buffers = self.buffers.lock();

        let mut best: Option<usize> = None;
        for (i, buf) in buffers.iter().enumerate() {
            if buf.capacity() >= min_size
                && best.map_or(true, |b| buf.capacity() < buffers[b].capacity())
            {
                best = Some(i);
            }
        }

        match best {
            Some(i) => {
                let mut buf = buffers.swap_remove(i);
                buf.clear();
                buf
            }
            None => BytesMut::with_capacity(min_size),
        }
    }

    /// Recycles a buffer.
    pub fn put(&self, buf: BytesMut) {
        self.buffers.lock().push(buf);
    }

    /// Number of buffers currently pooled.
    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }
}

/// The two pools shared between the extractor, its handles and the samples
/// they produce.
#[derive(Debug, Default)]
pub struct BufferPools {
    /// Fixed-size packet buffer pool.
    pub packets: PacketPool,
    /// Variable-size output buffer pool.
    pub large: LargeBufferPool,
}

impl BufferPools {
    /// Creates both pools empty.
    pub fn new() -> Self {
        Self {
            packets: PacketPool::new(),
            large: LargeBufferPool::new(),
        }
    }
}
