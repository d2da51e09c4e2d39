#![doc(html_root_url = "https://docs.rs/tsplex/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsplex - MPEG-TS video demultiplexer
//!
//! `tsplex` demultiplexes an MPEG Transport Stream into reassembled
//! Packetized Elementary Stream (PES) units carrying H.264 video, ready to
//! hand to a decoder. It is built around three ideas:
//!
//! - **Reassembly as a state machine**: consecutive 188-byte TS packets
//!   belonging to one access unit are grouped by a [`ts::PESAssembler`],
//!   which tracks continuity counters to detect loss, validates the PES
//!   start code, and decodes the 33-bit presentation timestamp.
//! - **Pooled buffers**: fixed-size packet buffers and variable-size output
//!   buffers are recycled through [`ts::BufferPools`] instead of being
//!   allocated per packet.
//! - **Concurrent producer/consumer**: one thread feeds packets into a
//!   [`ts::TSExtractor`] while any number of consumers drain finished
//!   [`ts::VideoSample`]s through cloneable [`ts::ExtractorHandle`]s backed
//!   by lock-free queues.
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tsplex = "0.1.0"
//! ```
//!
//! ### Feeding a stream
//!
//! ```rust
//! use tsplex::ts::TSExtractor;
//!
//! let mut extractor = TSExtractor::new(256); // track PID 256 for video
//! let handle = extractor.handle();
//!
//! // Obtain a pooled 188-byte buffer, fill it from your source, submit it.
//! let buf = handle.pooled_buffer();
//! // ... copy one TS packet into `buf` ...
//! extractor.submit_raw(buf);
//!
//! // Consumers drain finished samples; an empty queue yields `None`.
//! while let Some(sample) = handle.dequeue_sample() {
//!     // hand sample.payload() to a decoder, then give the buffers back
//!     sample.release();
//! }
//! ```
//!
//! ### Async ingestion
//!
//! ```rust,no_run
//! use tsplex::ts::TSExtractor;
//! use tokio::fs::File;
//!
//! #[tokio::main]
//! async fn main() -> tsplex::Result<()> {
//!     let mut extractor = TSExtractor::new(256);
//!     let mut file = File::open("capture.ts").await?;
//!     let submitted = extractor.pump(&mut file).await?;
//!     println!("submitted {} packets", submitted);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `ts`: the demultiplexing core
//!   - TS packet view and header decoding
//!   - PES reassembly, validity and PTS extraction
//!   - Buffer pools and the extractor state machine
//!   - Video sample output handles
//!
//! - `error`: error handling types
//!   - [`TsplexError`] for I/O failures at the stream boundaries
//!   - [`Result`] type alias for convenience

/// Error types and utilities
pub mod error;

/// MPEG Transport Stream demultiplexing core
pub mod ts;

pub use error::{Result, TsplexError};
