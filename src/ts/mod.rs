//! # MPEG Transport Stream demultiplexing
//!
//! This module turns a stream of fixed-size 188-byte TS packets into
//! reassembled video access units:
//!
//! - **Packet view**: [`TSPacket`] wraps a pooled buffer and decodes the
//!   header fields the demultiplexer needs (PID, continuity counter,
//!   payload-unit-start, adaptation-field-aware payload offset).
//! - **Reassembly**: [`PESAssembler`] accumulates the packets of one access
//!   unit, tracks continuity-counter sequencing to detect loss, validates
//!   the PES start code and extracts the presentation timestamp.
//! - **Routing**: [`TSExtractor`] filters packets by PID, detects PES
//!   boundaries, promotes finished units to a lock-free output queue and
//!   notifies subscribers.
//! - **Output**: [`VideoSample`] hands the reconstructed Annex-B byte stream
//!   to the consumer and returns every buffer it owns to the pools on
//!   release.
//!
//! ## Example
//!
//! ```rust
//! use tsplex::ts::{TSExtractor, TS_PACKET_SIZE};
//!
//! let mut extractor = TSExtractor::new(256);
//! let handle = extractor.handle();
//!
//! let buf = handle.pooled_buffer();
//! assert_eq!(buf.len(), TS_PACKET_SIZE);
//! // a zeroed buffer is not a valid TS packet, so it is pooled and refused
//! assert!(!extractor.submit_raw(buf));
//! assert!(handle.dequeue_sample().is_none());
//! ```

/// Extractor state machine routing TS packets into PES units
pub mod extractor;

/// TS packet view over a pooled 188-byte buffer
pub mod packet;

/// PES reassembly, validity checks and PTS extraction
pub mod pes;

/// Recycling pools for packet and output buffers
pub mod pool;

/// Materialized or deferred video sample handles
pub mod sample;

/// Core TS/PES constants and timestamp conversions
pub mod types;

// Re-export commonly used types and constants
pub use extractor::{ExtractorHandle, TSExtractor};
pub use packet::TSPacket;
pub use pes::PESAssembler;
pub use pool::{BufferPools, LargeBufferPool, PacketPool};
pub use sample::VideoSample;
pub use types::{
    PES_VIDEO_START_CODE,
    STREAM_ID_H264,
    TS_HEADER_SIZE,
    TS_PACKET_SIZE,
};
