//! Streaming Matroska muxer
//!
//! Turns a live sequence of encoded video (and optionally audio) frames into
//! an append-only Matroska stream. The Segment is written with an unknown
//! size, so output can be forwarded as it is produced: a one-time prefix
//! (EBML header, Segment opener, SegmentInfo, Tracks) followed by one Cluster
//! per video keyframe interval.
//!
//! ```no_run
//! use mkv::{FrameFlags, MkvMuxer, SegmentConfig, VideoConfig, WriteSink};
//!
//! let config = SegmentConfig::new(VideoConfig::new(640, 480, vec![0u8; 4], 33));
//! let mut muxer = MkvMuxer::new(&config, WriteSink::new(std::io::stdout()))?;
//! muxer.put_frame(vec![0u8; 128], FrameFlags::KEYFRAME)?;
//! muxer.finalize()?;
//! # Ok::<(), mkv::MkvError>(())
//! ```

pub mod block;
pub mod cluster;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod extractor;
pub mod muxer;
pub mod sink;
pub mod track;
pub mod uid;

#[cfg(test)]
pub(crate) mod test_utils;

pub use block::{FrameFlags, SimpleBlock};
pub use config::{AudioConfig, SegmentConfig, TimestampOverflowPolicy, VideoConfig};
pub use descriptor::SegmentDescriptor;
pub use error::MkvError;
pub use extractor::{ExtractedFrame, ExtractedTrack, MkvExtractor};
pub use muxer::{MkvMuxer, MuxerStats};
pub use sink::{EmittedSegment, SegmentKind, SegmentSink, VecSink, WriteSink};
pub use track::{Track, TrackKind};
pub use uid::{FixedUid, RandomUid, SegmentUid, SegmentUidSource};

/// Result type for muxer operations
pub type Result<T> = std::result::Result<T, MkvError>;
