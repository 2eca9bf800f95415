//! Reader for simple SimpleBlock-only Matroska streams.
//!
//! This is the inverse of [`crate::MkvMuxer`]: it recovers the track
//! descriptions and the frames of a complete buffer so a stream can be
//! inspected or replayed through another muxer. Lacing, BlockGroups and
//! seeking are not supported.

use bytes::Bytes;
use ebml::{EbmlError, ElementIter, RawElement, ids};
use tracing::trace;

use crate::block::{FrameFlags, SimpleBlock};
use crate::config::{AudioConfig, DEFAULT_TIMESCALE, SegmentConfig, VideoConfig};
use crate::track::TrackKind;
use crate::{MkvError, Result};

const SUPPORTED_DOC_TYPES: [&str; 2] = ["matroska", "webm"];

/// A TrackEntry as found in the stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTrack {
    pub number: u64,
    pub uid: u64,
    pub kind: Option<TrackKind>,
    pub name: Option<String>,
    pub codec_id: String,
    pub codec_private: Bytes,
    /// Frame duration in nanoseconds
    pub default_duration: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sampling_frequency: Option<f64>,
    pub channels: Option<u8>,
}

impl ExtractedTrack {
    fn parse(entry: &RawElement) -> Result<Self> {
        let mut track = Self::default();
        for child in entry.children() {
            let child = child?;
            match child.id {
                ids::TRACK_NUMBER => track.number = child.as_uint()?,
                ids::TRACK_UID => track.uid = child.as_uint()?,
                ids::TRACK_TYPE => track.kind = TrackKind::from_track_type(child.as_uint()?),
                ids::NAME => track.name = Some(child.as_text()),
                ids::CODEC_ID => track.codec_id = child.as_text(),
                ids::CODEC_PRIVATE => track.codec_private = child.payload.clone(),
                ids::DEFAULT_DURATION => track.default_duration = Some(child.as_uint()?),
                ids::VIDEO => {
                    for setting in child.children() {
                        let setting = setting?;
                        match setting.id {
                            ids::PIXEL_WIDTH => track.width = Some(narrow(setting.as_uint()?)?),
                            ids::PIXEL_HEIGHT => track.height = Some(narrow(setting.as_uint()?)?),
                            _ => {}
                        }
                    }
                }
                ids::AUDIO => {
                    for setting in child.children() {
                        let setting = setting?;
                        match setting.id {
                            ids::SAMPLING_FREQUENCY => {
                                track.sampling_frequency = Some(setting.as_float()?)
                            }
                            ids::CHANNELS => track.channels = Some(narrow(setting.as_uint()?)?),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        if track.number == 0 {
            return Err(MkvError::invalid_stream("TrackEntry without a track number"));
        }
        Ok(track)
    }

    /// Frame duration converted to ticks of `timescale`.
    pub fn frame_duration(&self, timescale: u64) -> Option<u64> {
        self.default_duration
            .filter(|_| timescale > 0)
            .map(|duration| duration / timescale)
    }
}

fn narrow<T: TryFrom<u64>>(value: u64) -> Result<T> {
    T::try_from(value)
        .map_err(|_| MkvError::invalid_stream(format!("value {value} out of range")))
}

/// A frame recovered from a SimpleBlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFrame {
    pub track_number: u64,
    /// Absolute timestamp in ticks: cluster Timecode plus block offset
    pub timestamp: i64,
    pub flags: FrameFlags,
    pub payload: Bytes,
}

/// Parsed view of a complete Matroska buffer.
#[derive(Debug, Clone)]
pub struct MkvExtractor {
    doc_type: String,
    timescale: u64,
    title: Option<String>,
    muxing_app: Option<String>,
    writing_app: Option<String>,
    tracks: Vec<ExtractedTrack>,
    clusters: Vec<RawElement>,
}

impl MkvExtractor {
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let mut top_level = ElementIter::new(data.into());

        let header = top_level
            .next()
            .ok_or_else(|| MkvError::invalid_stream("empty input"))??;
        if header.id != ids::EBML {
            return Err(MkvError::invalid_stream(format!(
                "expected EBML header, found element 0x{:X}",
                header.id
            )));
        }
        let doc_type = header
            .find_child(ids::DOC_TYPE)?
            .map(|element| element.as_text())
            .unwrap_or_default();
        if !SUPPORTED_DOC_TYPES.contains(&doc_type.as_str()) {
            return Err(MkvError::invalid_stream(format!(
                "unsupported DocType {doc_type:?}"
            )));
        }

        let mut extractor = Self {
            doc_type,
            timescale: DEFAULT_TIMESCALE,
            title: None,
            muxing_app: None,
            writing_app: None,
            tracks: Vec::new(),
            clusters: Vec::new(),
        };

        let mut found_segment = false;
        for element in top_level {
            let element = element?;
            if element.id != ids::SEGMENT {
                trace!(id = element.id, "Skipping top-level element");
                continue;
            }
            found_segment = true;
            extractor.read_segment(&element)?;
        }
        if !found_segment {
            return Err(MkvError::invalid_stream("no Segment element"));
        }

        Ok(extractor)
    }

    fn read_segment(&mut self, segment: &RawElement) -> Result<()> {
        for child in segment.children() {
            let child = child?;
            if child.size.is_unknown() {
                // Only the Segment itself may be open-ended
                return Err(EbmlError::UnknownSize(child.id).into());
            }
            match child.id {
                ids::SEGMENT_INFO => self.read_info(&child)?,
                ids::TRACKS => {
                    for entry in child.children() {
                        let entry = entry?;
                        if entry.id == ids::TRACK_ENTRY {
                            self.tracks.push(ExtractedTrack::parse(&entry)?);
                        }
                    }
                }
                ids::CLUSTER => self.clusters.push(child),
                id => trace!(id, "Skipping segment child"),
            }
        }
        Ok(())
    }

    fn read_info(&mut self, info: &RawElement) -> Result<()> {
        for child in info.children() {
            let child = child?;
            match child.id {
                ids::TIMESTAMP_SCALE => self.timescale = child.as_uint()?,
                ids::TITLE => self.title = Some(child.as_text()),
                ids::MUXING_APP => self.muxing_app = Some(child.as_text()),
                ids::WRITING_APP => self.writing_app = Some(child.as_text()),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn timescale(&self) -> u64 {
        self.timescale
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn muxing_app(&self) -> Option<&str> {
        self.muxing_app.as_deref()
    }

    pub fn writing_app(&self) -> Option<&str> {
        self.writing_app.as_deref()
    }

    pub fn tracks(&self) -> &[ExtractedTrack] {
        &self.tracks
    }

    pub fn track(&self, number: u64) -> Option<&ExtractedTrack> {
        self.tracks.iter().find(|track| track.number == number)
    }

    fn first_track(&self, kind: TrackKind) -> Option<&ExtractedTrack> {
        self.tracks.iter().find(|track| track.kind == Some(kind))
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Rebuild a muxer configuration from the stream's tracks.
    pub fn segment_config(&self) -> Result<SegmentConfig> {
        let video = self
            .first_track(TrackKind::Video)
            .ok_or_else(|| MkvError::invalid_stream("no video track"))?;

        let mut config = SegmentConfig::new(VideoConfig {
            codec: video.codec_id.clone(),
            width: video.width,
            height: video.height,
            codec_private: Some(video.codec_private.clone()),
            frame_duration: video.frame_duration(self.timescale).unwrap_or_default(),
        })
        .with_timescale(self.timescale);

        if let Some(title) = &self.title {
            config = config.with_title(title.clone());
        }
        if let Some(audio) = self.first_track(TrackKind::Audio) {
            config = config.with_audio(AudioConfig {
                codec: audio.codec_id.clone(),
                channels: audio.channels.unwrap_or(crate::config::DEFAULT_AUDIO_CHANNELS),
                sample_rate: audio.sampling_frequency,
                codec_private: Some(audio.codec_private.clone()),
                frame_duration: audio.frame_duration(self.timescale),
            });
        }
        Ok(config)
    }

    /// Iterate over every SimpleBlock of every cluster, in stream order.
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            extractor: self,
            next_cluster: 0,
            current: None,
            failed: false,
        }
    }

    fn track_kind(&self, number: u64) -> TrackKind {
        self.track(number)
            .and_then(|track| track.kind)
            .unwrap_or(TrackKind::Video)
    }
}

/// Iterator returned by [`MkvExtractor::frames`].
pub struct Frames<'a> {
    extractor: &'a MkvExtractor,
    next_cluster: usize,
    /// Cluster timecode and an iterator over its children
    current: Option<(u64, ElementIter)>,
    failed: bool,
}

impl Frames<'_> {
    fn open_next_cluster(&mut self) -> Result<bool> {
        let Some(cluster) = self.extractor.clusters.get(self.next_cluster) else {
            return Ok(false);
        };
        self.next_cluster += 1;
        let timecode = match cluster.find_child(ids::TIMECODE)? {
            Some(timecode) => timecode.as_uint()?,
            None => return Err(MkvError::invalid_stream("Cluster without Timecode")),
        };
        self.current = Some((timecode, cluster.children()));
        Ok(true)
    }

    fn next_frame(&mut self) -> Result<Option<ExtractedFrame>> {
        loop {
            let Some((timecode, children)) = self.current.as_mut() else {
                if !self.open_next_cluster()? {
                    return Ok(None);
                }
                continue;
            };

            let Some(child) = children.next() else {
                self.current = None;
                continue;
            };
            let child = child?;
            match child.id {
                ids::SIMPLE_BLOCK => {}
                ids::BLOCK_GROUP => {
                    trace!(timecode = *timecode, "Skipping BlockGroup");
                    continue;
                }
                _ => continue,
            }

            let block = SimpleBlock::parse(child.payload)?;
            let timestamp = i64::try_from(*timecode)
                .ok()
                .and_then(|base| base.checked_add(i64::from(block.timestamp)))
                .ok_or_else(|| {
                    MkvError::invalid_stream(format!(
                        "block timestamp {} overflows cluster timecode {}",
                        block.timestamp, timecode
                    ))
                })?;
            return Ok(Some(ExtractedFrame {
                track_number: block.track_number,
                timestamp,
                flags: FrameFlags::from_block(
                    block.flags,
                    self.extractor.track_kind(block.track_number),
                ),
                payload: block.payload,
            }));
        }
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<ExtractedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_frame() {
            Ok(frame) => frame.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
