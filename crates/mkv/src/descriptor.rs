//! Stream prefix: EBML header, Segment opener, SegmentInfo and Tracks.

use bytes::Bytes;
use ebml::{Element, ids};

use crate::config::SegmentConfig;
use crate::sink::{EmittedSegment, SegmentKind};
use crate::track::{Track, TrackKind};
use crate::uid::{SegmentUid, SegmentUidSource};
use crate::{MkvError, Result};

pub const EBML_VERSION: u64 = 1;
pub const EBML_READ_VERSION: u64 = 1;
pub const EBML_MAX_ID_LENGTH: u64 = 4;
pub const EBML_MAX_SIZE_LENGTH: u64 = 8;
pub const DOC_TYPE: &str = "matroska";
pub const DOC_TYPE_VERSION: u64 = 2;
pub const DOC_TYPE_READ_VERSION: u64 = 2;

/// Validated, immutable description of a segment.
///
/// Built once per stream from a [`SegmentConfig`]; everything the muxer needs
/// to know about the tracks comes from here.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    pub uid: SegmentUid,
    /// Nanoseconds per tick
    pub timescale: u64,
    pub title: String,
    pub muxing_app: String,
    pub writing_app: String,
    pub video: Track,
    pub audio: Option<Track>,
}

impl SegmentDescriptor {
    /// Validate `config` and draw a SegmentUID from `uid_source`.
    pub fn from_config<U>(config: &SegmentConfig, uid_source: &mut U) -> Result<Self>
    where
        U: SegmentUidSource + ?Sized,
    {
        if config.timescale == 0 {
            return Err(MkvError::configuration("timescale must be greater than zero"));
        }
        let video = Track::video(&config.video)?;
        let audio = Track::audio(config)?;

        Ok(Self {
            uid: uid_source.next_uid(),
            timescale: config.timescale,
            title: config.title.clone(),
            muxing_app: config.muxing_app.clone(),
            writing_app: config.writing_app.clone(),
            video,
            audio,
        })
    }

    pub fn track(&self, kind: TrackKind) -> Option<&Track> {
        match kind {
            TrackKind::Video => Some(&self.video),
            TrackKind::Audio => self.audio.as_ref(),
        }
    }

    pub fn ebml_header(&self) -> Element {
        Element::master(
            ids::EBML,
            vec![
                Element::uint(ids::EBML_VERSION, EBML_VERSION),
                Element::uint(ids::EBML_READ_VERSION, EBML_READ_VERSION),
                Element::uint(ids::EBML_MAX_ID_LENGTH, EBML_MAX_ID_LENGTH),
                Element::uint(ids::EBML_MAX_SIZE_LENGTH, EBML_MAX_SIZE_LENGTH),
                Element::text(ids::DOC_TYPE, DOC_TYPE),
                Element::uint(ids::DOC_TYPE_VERSION, DOC_TYPE_VERSION),
                Element::uint(ids::DOC_TYPE_READ_VERSION, DOC_TYPE_READ_VERSION),
            ],
        )
    }

    pub fn segment_info(&self) -> Element {
        Element::master(
            ids::SEGMENT_INFO,
            vec![
                Element::binary(ids::SEGMENT_UID, Bytes::copy_from_slice(&self.uid)),
                Element::uint(ids::TIMESTAMP_SCALE, self.timescale),
                Element::text(ids::TITLE, self.title.clone()),
                Element::text(ids::MUXING_APP, self.muxing_app.clone()),
                Element::text(ids::WRITING_APP, self.writing_app.clone()),
            ],
        )
    }

    pub fn tracks(&self) -> Element {
        let mut entries = vec![self.video.to_element(self.timescale)];
        if let Some(audio) = &self.audio {
            entries.push(audio.to_element(self.timescale));
        }
        Element::master(ids::TRACKS, entries)
    }

    /// Encode the stream prefix as four chunks: EBML header, unknown-size
    /// Segment opener, SegmentInfo and Tracks. The result ends exactly where
    /// the first Cluster starts.
    pub fn encode(&self) -> Result<EmittedSegment> {
        let chunks = vec![
            self.ebml_header().to_bytes()?,
            ebml::build_unknown_size_element(ids::SEGMENT)?,
            self.segment_info().to_bytes()?,
            self.tracks().to_bytes()?,
        ];
        Ok(EmittedSegment::new(SegmentKind::Prefix, chunks))
    }
}
