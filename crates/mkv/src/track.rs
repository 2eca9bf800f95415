use std::fmt;

use bytes::Bytes;
use ebml::{Element, ids};

use crate::config::{SegmentConfig, VideoConfig};
use crate::{MkvError, Result};

pub const VIDEO_TRACK_NUMBER: u64 = 1;
pub const AUDIO_TRACK_NUMBER: u64 = 2;
pub const VIDEO_TRACK_UID: u64 = 0x77;
pub const AUDIO_TRACK_UID: u64 = 0x78;

/// Kind of a track, with its fixed Matroska numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn number(self) -> u64 {
        match self {
            TrackKind::Video => VIDEO_TRACK_NUMBER,
            TrackKind::Audio => AUDIO_TRACK_NUMBER,
        }
    }

    pub fn uid(self) -> u64 {
        match self {
            TrackKind::Video => VIDEO_TRACK_UID,
            TrackKind::Audio => AUDIO_TRACK_UID,
        }
    }

    /// Matroska TrackType value
    pub fn track_type(self) -> u64 {
        match self {
            TrackKind::Video => 0x01,
            TrackKind::Audio => 0x02,
        }
    }

    pub fn from_track_type(track_type: u64) -> Option<Self> {
        match track_type {
            0x01 => Some(TrackKind::Video),
            0x02 => Some(TrackKind::Audio),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-specific track metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackSettings {
    Video { width: u32, height: u32 },
    Audio { sampling_frequency: f64, channels: u8 },
}

/// A validated track description.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub number: u64,
    pub uid: u64,
    pub kind: TrackKind,
    pub codec_id: String,
    pub codec_private: Bytes,
    pub settings: TrackSettings,
    /// Nominal frame duration in ticks
    pub frame_duration: u64,
}

impl Track {
    /// Validate the video part of a configuration.
    pub fn video(config: &VideoConfig) -> Result<Self> {
        let width = config
            .width
            .ok_or_else(|| MkvError::configuration("video width is required"))?;
        let height = config
            .height
            .ok_or_else(|| MkvError::configuration("video height is required"))?;
        let codec_private = config
            .codec_private
            .clone()
            .ok_or_else(|| MkvError::configuration("video codec private data is required"))?;
        if config.frame_duration == 0 {
            return Err(MkvError::configuration(
                "video frame duration must be greater than zero",
            ));
        }

        Ok(Self {
            number: VIDEO_TRACK_NUMBER,
            uid: VIDEO_TRACK_UID,
            kind: TrackKind::Video,
            codec_id: config.codec.clone(),
            codec_private,
            settings: TrackSettings::Video { width, height },
            frame_duration: config.frame_duration,
        })
    }

    /// Validate the audio part of a configuration. Returns `None` when audio is
    /// not enabled.
    pub fn audio(config: &SegmentConfig) -> Result<Option<Self>> {
        let Some(audio) = config.audio.as_ref() else {
            return Ok(None);
        };

        let sampling_frequency = audio
            .sample_rate
            .ok_or_else(|| MkvError::configuration("audio sample rate is required"))?;
        if !(sampling_frequency.is_finite() && sampling_frequency > 0.0) {
            return Err(MkvError::configuration(format!(
                "invalid audio sample rate: {sampling_frequency}"
            )));
        }
        let codec_private = audio
            .codec_private
            .clone()
            .ok_or_else(|| MkvError::configuration("audio codec private data is required"))?;

        Ok(Some(Self {
            number: AUDIO_TRACK_NUMBER,
            uid: AUDIO_TRACK_UID,
            kind: TrackKind::Audio,
            codec_id: audio.codec.clone(),
            codec_private,
            settings: TrackSettings::Audio {
                sampling_frequency,
                channels: audio.channels,
            },
            frame_duration: config.audio_frame_duration().unwrap_or_default(),
        }))
    }

    /// Build the TrackEntry element. `timescale` converts the frame duration
    /// to the nanoseconds DefaultDuration is expressed in.
    pub fn to_element(&self, timescale: u64) -> Element {
        let mut children = vec![
            Element::uint(ids::TRACK_NUMBER, self.number),
            Element::uint(ids::TRACK_UID, self.uid),
            Element::uint(ids::TRACK_TYPE, self.kind.track_type()),
            Element::text(ids::NAME, self.kind.name()),
            Element::text(ids::CODEC_ID, self.codec_id.clone()),
        ];

        if self.frame_duration > 0 {
            children.push(Element::uint(
                ids::DEFAULT_DURATION,
                self.frame_duration.saturating_mul(timescale),
            ));
        }

        children.push(match self.settings {
            TrackSettings::Video { width, height } => Element::master(
                ids::VIDEO,
                vec![
                    Element::uint(ids::PIXEL_WIDTH, u64::from(width)),
                    Element::uint(ids::PIXEL_HEIGHT, u64::from(height)),
                ],
            ),
            TrackSettings::Audio {
                sampling_frequency,
                channels,
            } => Element::master(
                ids::AUDIO,
                vec![
                    Element::float(ids::SAMPLING_FREQUENCY, sampling_frequency),
                    Element::uint(ids::CHANNELS, u64::from(channels)),
                ],
            ),
        });

        children.push(Element::binary(
            ids::CODEC_PRIVATE,
            self.codec_private.clone(),
        ));

        Element::master(ids::TRACK_ENTRY, children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;

    #[test]
    fn test_video_track_requires_dimensions_and_private_data() {
        let mut config = VideoConfig::new(640, 480, vec![0u8; 4], 33);
        assert!(Track::video(&config).is_ok());

        config.width = None;
        let err = Track::video(&config).unwrap_err();
        assert!(matches!(err, MkvError::Configuration { .. }));
        assert!(err.to_string().contains("width"));

        let config = VideoConfig {
            codec_private: None,
            ..VideoConfig::new(640, 480, vec![0u8; 4], 33)
        };
        assert!(matches!(
            Track::video(&config),
            Err(MkvError::Configuration { .. })
        ));

        let config = VideoConfig::new(640, 480, vec![0u8; 4], 0);
        assert!(matches!(
            Track::video(&config),
            Err(MkvError::Configuration { .. })
        ));
    }

    #[test]
    fn test_audio_track_requires_sample_rate_and_private_data() {
        let video = VideoConfig::new(640, 480, vec![0u8; 4], 40);
        let config = SegmentConfig::new(video.clone());
        assert!(Track::audio(&config).unwrap().is_none());

        let config = SegmentConfig::new(video.clone()).with_audio(AudioConfig {
            codec_private: Some(Bytes::from_static(&[0x12, 0x10])),
            ..AudioConfig::default()
        });
        assert!(matches!(
            Track::audio(&config),
            Err(MkvError::Configuration { .. })
        ));

        let config = SegmentConfig::new(video.clone()).with_audio(AudioConfig {
            sample_rate: Some(44100.0),
            ..AudioConfig::default()
        });
        assert!(matches!(
            Track::audio(&config),
            Err(MkvError::Configuration { .. })
        ));

        let config = SegmentConfig::new(video)
            .with_audio(AudioConfig::new(44100.0, Bytes::from_static(&[0x12, 0x10])));
        let track = Track::audio(&config).unwrap().unwrap();
        assert_eq!(track.number, AUDIO_TRACK_NUMBER);
        assert_eq!(track.frame_duration, 20);
        assert_eq!(
            track.settings,
            TrackSettings::Audio {
                sampling_frequency: 44100.0,
                channels: 2
            }
        );
    }

    #[test]
    fn test_video_track_entry_bytes() {
        let track = Track::video(&VideoConfig::new(640, 480, vec![0u8; 4], 33)).unwrap();
        let bytes = track.to_element(1_000_000).to_bytes().unwrap();

        let parts: [&[u8]; 11] = [
            &[0xAE, 0xBC],
            &[0xD7, 0x81, 0x01],
            &[0x73, 0xC5, 0x81, 0x77],
            &[0x83, 0x81, 0x01],
            &[0x53, 0x6E, 0x85],
            b"video",
            &[0x86, 0x8F],
            b"V_MPEG4/ISO/ASP",
            // 33 ms in ns
            &[0x23, 0xE3, 0x83, 0x84, 0x01, 0xF7, 0x8A, 0x40],
            &[0xE0, 0x88, 0xB0, 0x82, 0x02, 0x80, 0xBA, 0x82, 0x01, 0xE0],
            &[0x63, 0xA2, 0x84, 0x00, 0x00, 0x00, 0x00],
        ];
        let expected = parts.concat();
        assert_eq!(&bytes[..], &expected[..]);
    }
}
