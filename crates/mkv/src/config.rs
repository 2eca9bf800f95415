//! Muxer configuration.
//!
//! All timestamps and durations are expressed in ticks of the segment
//! timescale. With the default scale of 1,000,000 ns per tick a tick is one
//! millisecond.

use bytes::Bytes;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMESCALE: u64 = 1_000_000;
pub const DEFAULT_TITLE: &str = "live";
pub const DEFAULT_MUXING_APP: &str = concat!("mkv-", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_WRITING_APP: &str = "rust-srec";
pub const DEFAULT_VIDEO_CODEC: &str = "V_MPEG4/ISO/ASP";
pub const DEFAULT_AUDIO_CODEC: &str = "A_AAC";
pub const DEFAULT_AUDIO_CHANNELS: u8 = 2;

/// What to do when a block timestamp relative to its cluster does not fit in
/// the signed 16-bit SimpleBlock field (a cluster spanning more than ~32767
/// ticks).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimestampOverflowPolicy {
    /// Saturate to the nearest representable value and log a warning.
    #[default]
    Truncate,
    /// Refuse the frame with [`crate::MkvError::TimestampOverflow`].
    Reject,
}

/// Video track parameters. Width, height and codec private data are mandatory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VideoConfig {
    /// Matroska codec ID
    pub codec: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Codec initialization data (e.g. decoder configuration record)
    pub codec_private: Option<Bytes>,
    /// Nominal duration of one frame in ticks
    pub frame_duration: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_owned(),
            width: None,
            height: None,
            codec_private: None,
            frame_duration: 0,
        }
    }
}

impl VideoConfig {
    pub fn new(
        width: u32,
        height: u32,
        codec_private: impl Into<Bytes>,
        frame_duration: u64,
    ) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            codec_private: Some(codec_private.into()),
            frame_duration,
            ..Self::default()
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }
}

/// Audio track parameters. Sample rate and codec private data are mandatory.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AudioConfig {
    /// Matroska codec ID
    pub codec: String,
    pub channels: u8,
    /// Sampling frequency in Hz
    pub sample_rate: Option<f64>,
    pub codec_private: Option<Bytes>,
    /// Nominal duration of one frame in ticks. Defaults to half the video
    /// frame duration.
    pub frame_duration: Option<u64>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_AUDIO_CODEC.to_owned(),
            channels: DEFAULT_AUDIO_CHANNELS,
            sample_rate: None,
            codec_private: None,
            frame_duration: None,
        }
    }
}

impl AudioConfig {
    pub fn new(sample_rate: f64, codec_private: impl Into<Bytes>) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            codec_private: Some(codec_private.into()),
            ..Self::default()
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn with_channels(mut self, channels: u8) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_frame_duration(mut self, frame_duration: u64) -> Self {
        self.frame_duration = Some(frame_duration);
        self
    }
}

/// Configuration of one muxed segment
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentConfig {
    /// Nanoseconds per tick (Matroska TimestampScale)
    pub timescale: u64,
    /// Segment title, usually the stream name
    pub title: String,
    pub muxing_app: String,
    pub writing_app: String,
    pub video: VideoConfig,
    pub audio: Option<AudioConfig>,
    pub timestamp_overflow: TimestampOverflowPolicy,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            timescale: DEFAULT_TIMESCALE,
            title: DEFAULT_TITLE.to_owned(),
            muxing_app: DEFAULT_MUXING_APP.to_owned(),
            writing_app: DEFAULT_WRITING_APP.to_owned(),
            video: VideoConfig::default(),
            audio: None,
            timestamp_overflow: TimestampOverflowPolicy::default(),
        }
    }
}

impl SegmentConfig {
    pub fn new(video: VideoConfig) -> Self {
        Self {
            video,
            ..Self::default()
        }
    }

    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_timescale(mut self, timescale: u64) -> Self {
        self.timescale = timescale;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_muxing_app(mut self, muxing_app: impl Into<String>) -> Self {
        self.muxing_app = muxing_app.into();
        self
    }

    pub fn with_writing_app(mut self, writing_app: impl Into<String>) -> Self {
        self.writing_app = writing_app.into();
        self
    }

    pub fn with_timestamp_overflow(mut self, policy: TimestampOverflowPolicy) -> Self {
        self.timestamp_overflow = policy;
        self
    }

    /// Effective audio frame duration in ticks, if audio is configured.
    pub fn audio_frame_duration(&self) -> Option<u64> {
        self.audio.as_ref().map(|audio| {
            audio
                .frame_duration
                .unwrap_or(self.video.frame_duration / 2)
        })
    }
}
