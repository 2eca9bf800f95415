//! Keyframe-aligned streaming muxer.
//!
//! The muxer emits the stream prefix on construction, then buffers frames into
//! one open Cluster at a time. Every video keyframe closes the open Cluster,
//! hands it to the sink and starts a new one based at the keyframe's
//! timestamp. Frames arriving before the first video keyframe are dropped.
//!
//! Timestamps are synthesized from the nominal frame durations rather than
//! taken from the input: each block carries its track's running timestamp
//! before it advances. Audio is resynchronized to every video frame.

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::block::{FrameFlags, SimpleBlock, relative_timestamp};
use crate::cluster::Cluster;
use crate::config::{SegmentConfig, TimestampOverflowPolicy};
use crate::descriptor::SegmentDescriptor;
use crate::sink::{EmittedSegment, SegmentSink};
use crate::track::TrackKind;
use crate::uid::{RandomUid, SegmentUidSource};
use crate::{MkvError, Result};

#[derive(Debug)]
enum ClusterState {
    /// Waiting for the first video keyframe
    Idle,
    Open(Cluster),
    Finalized,
}

/// Counters describing what the muxer has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxerStats {
    pub frames_accepted: u64,
    pub frames_dropped: u64,
    pub clusters_emitted: u64,
    pub bytes_emitted: u64,
}

/// Streaming Matroska muxer for one video and an optional audio track.
pub struct MkvMuxer<S: SegmentSink> {
    descriptor: SegmentDescriptor,
    overflow_policy: TimestampOverflowPolicy,
    sink: S,
    state: ClusterState,
    video_timestamp: u64,
    audio_timestamp: u64,
    stats: MuxerStats,
}

impl<S: SegmentSink> MkvMuxer<S> {
    /// Create a muxer with a random SegmentUID and emit the stream prefix.
    pub fn new(config: &SegmentConfig, sink: S) -> Result<Self> {
        Self::with_uid_source(config, sink, &mut RandomUid)
    }

    /// Create a muxer drawing its SegmentUID from `uid_source` and emit the
    /// stream prefix.
    pub fn with_uid_source<U>(config: &SegmentConfig, sink: S, uid_source: &mut U) -> Result<Self>
    where
        U: SegmentUidSource + ?Sized,
    {
        let descriptor = SegmentDescriptor::from_config(config, uid_source)?;
        Self::from_descriptor(descriptor, config.timestamp_overflow, sink)
    }

    /// Create a muxer from an already validated descriptor and emit the stream
    /// prefix.
    pub fn from_descriptor(
        descriptor: SegmentDescriptor,
        overflow_policy: TimestampOverflowPolicy,
        sink: S,
    ) -> Result<Self> {
        let prefix = descriptor.encode()?;
        let mut muxer = Self {
            descriptor,
            overflow_policy,
            sink,
            state: ClusterState::Idle,
            video_timestamp: 0,
            audio_timestamp: 0,
            stats: MuxerStats::default(),
        };

        info!(
            title = %muxer.descriptor.title,
            video_codec = %muxer.descriptor.video.codec_id,
            has_audio = muxer.descriptor.audio.is_some(),
            timescale = muxer.descriptor.timescale,
            bytes = prefix.len(),
            "Emitting Matroska stream prefix"
        );
        muxer.emit(prefix)?;
        Ok(muxer)
    }

    /// Add one frame.
    ///
    /// Returns `Ok(false)` when the frame was dropped because no video
    /// keyframe has been seen yet, `Ok(true)` once it is part of a cluster.
    pub fn put_frame(&mut self, payload: impl Into<Bytes>, flags: FrameFlags) -> Result<bool> {
        match self.state {
            ClusterState::Finalized => return Err(MkvError::Finalized),
            ClusterState::Idle if !flags.is_video_keyframe() => {
                trace!(flags = flags.bits(), "Dropping frame before first video keyframe");
                self.stats.frames_dropped += 1;
                return Ok(false);
            }
            _ => {}
        }

        let kind = flags.track_kind();
        let Some(track) = self.descriptor.track(kind) else {
            warn!(
                flags = flags.bits(),
                "Dropping audio frame, no audio track configured"
            );
            self.stats.frames_dropped += 1;
            return Ok(false);
        };
        let track_number = track.number;
        let frame_duration = track.frame_duration;
        let payload = payload.into();

        let timestamp = match kind {
            TrackKind::Video => self.video_timestamp,
            TrackKind::Audio => self.audio_timestamp,
        };
        let next_timestamp = timestamp.checked_add(frame_duration).ok_or_else(|| {
            MkvError::invalid_stream(format!(
                "{kind} timestamp {timestamp} overflows when advanced by {frame_duration}"
            ))
        })?;

        // A video keyframe starts a new cluster based at its own timestamp.
        let starts_cluster = flags.is_video_keyframe();
        let relative = match &self.state {
            ClusterState::Open(cluster) if !starts_cluster => relative_timestamp(
                timestamp,
                cluster.base_timestamp(),
                track_number,
                self.overflow_policy,
            )?,
            _ => 0,
        };

        let block = SimpleBlock {
            track_number,
            timestamp: relative,
            flags: flags.block_flags(),
            payload,
        };

        let finished = if starts_cluster {
            let mut cluster = Cluster::open(timestamp)?;
            cluster.push(block)?;
            match std::mem::replace(&mut self.state, ClusterState::Open(cluster)) {
                ClusterState::Open(previous) => Some(previous),
                _ => None,
            }
        } else {
            if let ClusterState::Open(cluster) = &mut self.state {
                cluster.push(block)?;
            }
            None
        };

        match kind {
            TrackKind::Video => {
                self.audio_timestamp = self.video_timestamp;
                self.video_timestamp = next_timestamp;
            }
            TrackKind::Audio => self.audio_timestamp = next_timestamp,
        }
        self.stats.frames_accepted += 1;

        trace!(
            track = %kind,
            timestamp,
            relative,
            keyframe = flags.is_keyframe(),
            "Accepted frame"
        );

        if let Some(previous) = finished {
            self.emit_cluster(previous)?;
        }

        Ok(true)
    }

    /// Emit the open cluster, if any, and stop accepting frames.
    pub fn finalize(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, ClusterState::Finalized) {
            ClusterState::Finalized => Err(MkvError::Finalized),
            ClusterState::Idle => {
                debug!("Finalized muxer without any cluster");
                Ok(())
            }
            ClusterState::Open(cluster) => self.emit_cluster(cluster),
        }
    }

    fn emit_cluster(&mut self, cluster: Cluster) -> Result<()> {
        let segment = cluster.finish()?;
        self.stats.clusters_emitted += 1;
        debug!(
            kind = ?segment.kind(),
            bytes = segment.len(),
            "Emitting cluster"
        );
        self.emit(segment)
    }

    fn emit(&mut self, segment: EmittedSegment) -> Result<()> {
        let len = segment.len() as u64;
        self.sink.deliver(segment).map_err(MkvError::sink)?;
        self.stats.bytes_emitted += len;
        Ok(())
    }

    /// Running video timestamp in ticks: the timestamp the next video frame
    /// will get.
    pub fn video_timestamp(&self) -> u64 {
        self.video_timestamp
    }

    /// Running audio timestamp in ticks.
    pub fn audio_timestamp(&self) -> u64 {
        self.audio_timestamp
    }

    /// Base timestamp of the open cluster.
    pub fn cluster_timestamp(&self) -> Option<u64> {
        match &self.state {
            ClusterState::Open(cluster) => Some(cluster.base_timestamp()),
            _ => None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, ClusterState::Finalized)
    }

    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    pub fn stats(&self) -> MuxerStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioConfig, VideoConfig};
    use crate::sink::{SegmentKind, VecSink};
    use crate::test_utils::init_tracing;
    use crate::uid::FixedUid;
    use std::io;

    fn config() -> SegmentConfig {
        SegmentConfig::new(VideoConfig::new(640, 480, vec![0u8; 4], 33))
    }

    fn muxer(config: &SegmentConfig) -> MkvMuxer<VecSink> {
        MkvMuxer::with_uid_source(config, VecSink::new(), &mut FixedUid([0; 16])).unwrap()
    }

    #[test]
    fn test_prefix_emitted_on_construction() {
        let muxer = muxer(&config());
        assert_eq!(muxer.sink().len(), 1);
        assert_eq!(muxer.sink().segments()[0].kind(), SegmentKind::Prefix);
        assert_eq!(muxer.stats().bytes_emitted, muxer.sink().to_bytes().len() as u64);
    }

    #[test]
    fn test_invalid_config_emits_nothing() {
        let mut delivered = 0;
        let sink = |_segment: EmittedSegment| -> io::Result<()> {
            delivered += 1;
            Ok(())
        };
        let config = SegmentConfig::new(VideoConfig::default());
        assert!(matches!(
            MkvMuxer::new(&config, sink),
            Err(MkvError::Configuration { .. })
        ));
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_frames_before_keyframe_are_dropped() {
        init_tracing();
        let mut muxer = muxer(&config());
        assert!(!muxer.put_frame(&b"p"[..], FrameFlags::empty()).unwrap());
        assert!(!muxer.put_frame(&b"a"[..], FrameFlags::AUDIO | FrameFlags::KEYFRAME).unwrap());
        assert_eq!(muxer.video_timestamp(), 0);
        assert_eq!(muxer.stats().frames_dropped, 2);
        assert_eq!(muxer.cluster_timestamp(), None);

        assert!(muxer.put_frame(&b"k"[..], FrameFlags::KEYFRAME).unwrap());
        assert_eq!(muxer.cluster_timestamp(), Some(0));
        assert_eq!(muxer.video_timestamp(), 33);
        assert_eq!(muxer.sink().len(), 1);
    }

    #[test]
    fn test_cluster_emitted_on_next_keyframe() {
        init_tracing();
        let mut muxer = muxer(&config());
        muxer.put_frame(&b"f1"[..], FrameFlags::KEYFRAME).unwrap();
        muxer.put_frame(&b"f2"[..], FrameFlags::empty()).unwrap();
        muxer.put_frame(&b"f3"[..], FrameFlags::KEYFRAME).unwrap();

        let clusters: Vec<_> = muxer.sink().clusters().collect();
        assert_eq!(clusters.len(), 1);
        assert_eq!(
            clusters[0].kind(),
            SegmentKind::Cluster {
                base_timestamp: 0,
                block_count: 2
            }
        );
        assert_eq!(muxer.cluster_timestamp(), Some(66));
    }

    #[test]
    fn test_audio_resyncs_to_video() {
        let config = config().with_audio(AudioConfig::new(48000.0, vec![0x11, 0x90]));
        let mut muxer = muxer(&config);

        muxer.put_frame(&b"v"[..], FrameFlags::KEYFRAME).unwrap();
        assert_eq!(muxer.audio_timestamp(), 0);
        muxer.put_frame(&b"a"[..], FrameFlags::AUDIO).unwrap();
        muxer.put_frame(&b"a"[..], FrameFlags::AUDIO).unwrap();
        assert_eq!(muxer.audio_timestamp(), 32);

        muxer.put_frame(&b"v"[..], FrameFlags::empty()).unwrap();
        assert_eq!(muxer.video_timestamp(), 66);
        assert_eq!(muxer.audio_timestamp(), 33);
    }

    #[test]
    fn test_audio_without_track_is_dropped() {
        let mut muxer = muxer(&config());
        muxer.put_frame(&b"v"[..], FrameFlags::KEYFRAME).unwrap();
        assert!(!muxer.put_frame(&b"a"[..], FrameFlags::AUDIO).unwrap());
        assert_eq!(muxer.audio_timestamp(), 0);
    }

    #[test]
    fn test_finalize_twice_fails() {
        let mut muxer = muxer(&config());
        muxer.put_frame(&b"v"[..], FrameFlags::KEYFRAME).unwrap();
        muxer.finalize().unwrap();
        assert!(muxer.is_finalized());
        assert_eq!(muxer.stats().clusters_emitted, 1);

        assert!(matches!(muxer.finalize(), Err(MkvError::Finalized)));
        assert!(matches!(
            muxer.put_frame(&b"v"[..], FrameFlags::KEYFRAME),
            Err(MkvError::Finalized)
        ));
    }

    #[test]
    fn test_finalize_idle_emits_nothing() {
        let mut muxer = muxer(&config());
        muxer.finalize().unwrap();
        assert_eq!(muxer.sink().len(), 1);
    }

    #[test]
    fn test_sink_error_is_propagated() {
        let mut calls = 0;
        let sink = |_segment: EmittedSegment| -> io::Result<()> {
            calls += 1;
            if calls > 1 {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            } else {
                Ok(())
            }
        };
        let mut muxer =
            MkvMuxer::with_uid_source(&config(), sink, &mut FixedUid([0; 16])).unwrap();
        muxer.put_frame(&b"v"[..], FrameFlags::KEYFRAME).unwrap();
        let err = muxer.put_frame(&b"v"[..], FrameFlags::KEYFRAME).unwrap_err();
        assert!(matches!(err, MkvError::Sink { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_reject_policy_leaves_state_untouched() {
        let config = SegmentConfig::new(VideoConfig::new(640, 480, vec![0u8; 4], 20_000))
            .with_timestamp_overflow(TimestampOverflowPolicy::Reject);
        let mut muxer = muxer(&config);

        muxer.put_frame(&b"k"[..], FrameFlags::KEYFRAME).unwrap();
        muxer.put_frame(&b"p"[..], FrameFlags::empty()).unwrap();
        let stats = muxer.stats();

        let err = muxer.put_frame(&b"p"[..], FrameFlags::empty()).unwrap_err();
        assert!(matches!(
            err,
            MkvError::TimestampOverflow {
                track_number: 1,
                relative: 40_000
            }
        ));
        assert!(!err.is_fatal());
        assert_eq!(muxer.video_timestamp(), 40_000);
        assert_eq!(muxer.stats(), stats);

        // A keyframe still starts a fresh cluster
        assert!(muxer.put_frame(&b"k"[..], FrameFlags::KEYFRAME).unwrap());
        assert_eq!(muxer.cluster_timestamp(), Some(40_000));
    }

    #[test]
    fn test_truncate_policy_saturates() {
        init_tracing();
        let config = SegmentConfig::new(VideoConfig::new(640, 480, vec![0u8; 4], 20_000));
        let mut muxer = muxer(&config);

        muxer.put_frame(&b"k"[..], FrameFlags::KEYFRAME).unwrap();
        muxer.put_frame(&b"p"[..], FrameFlags::empty()).unwrap();
        assert!(muxer.put_frame(&b"p"[..], FrameFlags::empty()).unwrap());
        assert_eq!(muxer.video_timestamp(), 60_000);

        muxer.finalize().unwrap();
        let cluster = muxer.sink().clusters().next().unwrap().to_bytes();
        // Third block: 40000 ticks past the base, saturated to i16::MAX
        assert!(cluster.ends_with(&[0xA3, 0x85, 0x81, 0x7F, 0xFF, 0x00, b'p']));
        // Second block still carries its exact offset
        assert!(
            cluster
                .windows(7)
                .any(|w| w == [0xA3, 0x85, 0x81, 0x4E, 0x20, 0x00, b'p'])
        );
    }

    #[test]
    fn test_timestamp_exhaustion_is_an_error() {
        let config = SegmentConfig::new(VideoConfig::new(640, 480, vec![0u8; 4], u64::MAX / 2 + 1))
            .with_audio(AudioConfig::new(48000.0, vec![0x11, 0x90]).with_frame_duration(u64::MAX));
        let mut muxer = muxer(&config);

        assert!(muxer.put_frame(&b"k"[..], FrameFlags::KEYFRAME).unwrap());
        let stats = muxer.stats();
        let video_timestamp = muxer.video_timestamp();

        let err = muxer.put_frame(&b"k"[..], FrameFlags::KEYFRAME).unwrap_err();
        assert!(matches!(err, MkvError::InvalidStream { .. }));
        assert_eq!(muxer.video_timestamp(), video_timestamp);
        assert_eq!(muxer.cluster_timestamp(), Some(0));
        assert_eq!(muxer.stats(), stats);

        // Audio at 0 advances once, then runs out
        assert!(muxer.put_frame(&b"a"[..], FrameFlags::AUDIO).unwrap());
        assert!(matches!(
            muxer.put_frame(&b"a"[..], FrameFlags::AUDIO),
            Err(MkvError::InvalidStream { .. })
        ));
        assert_eq!(muxer.audio_timestamp(), u64::MAX);
    }
}
