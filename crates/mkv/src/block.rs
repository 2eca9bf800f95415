//! SimpleBlock encoding and frame flags.
//!
//! SimpleBlock layout (payload of element 0xA3):
//!
//! ```text
//! +--------------+-------------------+-------+-------------+
//! | track (vint) | timestamp (i16 BE) | flags | frame bytes |
//! +--------------+-------------------+-------+-------------+
//! ```
//!
//! The timestamp is relative to the enclosing cluster's Timecode.

use std::io::Cursor;

use bitflags::bitflags;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use ebml::{EbmlError, ElementSize, ids, vint};
use tracing::warn;

use crate::config::TimestampOverflowPolicy;
use crate::track::TrackKind;
use crate::{MkvError, Result};

/// Lacing bits of the SimpleBlock flag byte. Lacing is never produced.
const LACING_MASK: u8 = 0x06;

bitflags! {
    /// Per-frame flags passed to the muxer.
    ///
    /// The low byte is copied into the SimpleBlock flag byte; `AUDIO` selects
    /// the audio track instead of the video track.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u16 {
        const DISCARDABLE = 0x01;
        const INVISIBLE = 0x08;
        const KEYFRAME = 0x80;
        const AUDIO = 0x100;
    }
}

impl FrameFlags {
    pub fn is_keyframe(self) -> bool {
        self.contains(FrameFlags::KEYFRAME)
    }

    pub fn is_audio(self) -> bool {
        self.contains(FrameFlags::AUDIO)
    }

    /// Only video keyframes open a new cluster.
    pub fn is_video_keyframe(self) -> bool {
        self.is_keyframe() && !self.is_audio()
    }

    pub fn track_kind(self) -> TrackKind {
        if self.is_audio() {
            TrackKind::Audio
        } else {
            TrackKind::Video
        }
    }

    /// The SimpleBlock flag byte.
    pub fn block_flags(self) -> u8 {
        (self.bits() & 0xFF) as u8
    }

    /// Rebuild frame flags from a SimpleBlock flag byte and its track.
    pub fn from_block(flags: u8, kind: TrackKind) -> Self {
        let mut frame_flags = FrameFlags::from_bits_truncate(u16::from(flags));
        frame_flags.set(FrameFlags::AUDIO, kind == TrackKind::Audio);
        frame_flags
    }
}

/// One encoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleBlock {
    pub track_number: u64,
    /// Timestamp relative to the cluster base, in ticks
    pub timestamp: i16,
    pub flags: u8,
    pub payload: Bytes,
}

impl SimpleBlock {
    /// Size of the block header: track vint, timestamp and flags.
    pub fn block_header_len(&self) -> Result<usize> {
        Ok(vint::size_width(self.track_number)? + 3)
    }

    /// Payload size of the SimpleBlock element.
    pub fn element_payload_len(&self) -> Result<u64> {
        Ok(self.block_header_len()? as u64 + self.payload.len() as u64)
    }

    /// Total serialized size including the element ID and size fields.
    pub fn encoded_len(&self) -> Result<u64> {
        let payload_len = self.element_payload_len()?;
        Ok(ebml::element::header_len(ids::SIMPLE_BLOCK, payload_len)? as u64 + payload_len)
    }

    /// Element header followed by the block header. The frame bytes are not
    /// included so they can be forwarded without copying.
    pub fn header_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(16);
        ebml::put_element_header(&mut buf, ids::SIMPLE_BLOCK, self.element_payload_len()?)?;
        vint::put_size(&mut buf, self.track_number)?;
        buf.put_i16(self.timestamp);
        buf.put_u8(self.flags);
        Ok(buf.freeze())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len()? as usize);
        buf.put_slice(&self.header_bytes()?);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Parse the payload of a SimpleBlock element.
    pub fn parse(data: Bytes) -> Result<Self> {
        let (track_number, track_len) = ebml::decode_size(&data)?;
        let ElementSize::Known(track_number) = track_number else {
            return Err(MkvError::invalid_stream("SimpleBlock track number is reserved"));
        };

        let mut cursor = Cursor::new(&data[track_len..]);
        let timestamp = cursor
            .read_i16::<BigEndian>()
            .map_err(EbmlError::from)?;
        let flags = cursor.read_u8().map_err(EbmlError::from)?;
        if flags & LACING_MASK != 0 {
            return Err(MkvError::invalid_stream(format!(
                "laced SimpleBlock (flags 0x{flags:02X}) is not supported"
            )));
        }

        Ok(Self {
            track_number,
            timestamp,
            flags,
            payload: data.slice(track_len + 3..),
        })
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags & FrameFlags::KEYFRAME.bits() as u8 != 0
    }
}

/// Compute the block timestamp of `timestamp` relative to a cluster `base`,
/// applying `policy` when it does not fit in an `i16`.
pub fn relative_timestamp(
    timestamp: u64,
    base: u64,
    track_number: u64,
    policy: TimestampOverflowPolicy,
) -> Result<i16> {
    let relative = timestamp.wrapping_sub(base) as i64;
    match i16::try_from(relative) {
        Ok(relative) => Ok(relative),
        Err(_) => match policy {
            TimestampOverflowPolicy::Truncate => {
                let truncated = relative.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
                warn!(
                    track_number,
                    timestamp,
                    cluster_timestamp = base,
                    relative,
                    truncated,
                    "Block timestamp out of range for cluster, truncating"
                );
                Ok(truncated)
            }
            TimestampOverflowPolicy::Reject => {
                Err(MkvError::TimestampOverflow {
                    track_number,
                    relative,
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_flags() {
        let flags = FrameFlags::KEYFRAME;
        assert!(flags.is_video_keyframe());
        assert_eq!(flags.block_flags(), 0x80);
        assert_eq!(flags.track_kind(), TrackKind::Video);

        let flags = FrameFlags::from_bits_truncate(0x180);
        assert!(flags.is_keyframe());
        assert!(!flags.is_video_keyframe());
        assert_eq!(flags.track_kind(), TrackKind::Audio);
        assert_eq!(flags.block_flags(), 0x80);

        let flags = FrameFlags::INVISIBLE | FrameFlags::DISCARDABLE;
        assert_eq!(flags.block_flags(), 0x09);

        assert_eq!(
            FrameFlags::from_block(0x80, TrackKind::Audio),
            FrameFlags::KEYFRAME | FrameFlags::AUDIO
        );
    }

    #[test]
    fn test_simple_block_bytes() {
        let block = SimpleBlock {
            track_number: 1,
            timestamp: 33,
            flags: 0,
            payload: Bytes::from_static(b"f2"),
        };
        assert_eq!(block.element_payload_len().unwrap(), 6);
        assert_eq!(block.encoded_len().unwrap(), 8);
        assert_eq!(
            &block.to_bytes().unwrap()[..],
            &[0xA3, 0x86, 0x81, 0x00, 0x21, 0x00, b'f', b'2']
        );
        assert_eq!(&block.header_bytes().unwrap()[..], &[0xA3, 0x86, 0x81, 0x00, 0x21, 0x00]);
    }

    #[test]
    fn test_simple_block_negative_timestamp() {
        let block = SimpleBlock {
            track_number: 2,
            timestamp: -2,
            flags: 0x80,
            payload: Bytes::new(),
        };
        assert_eq!(
            &block.to_bytes().unwrap()[..],
            &[0xA3, 0x84, 0x82, 0xFF, 0xFE, 0x80]
        );
    }

    #[test]
    fn test_parse_simple_block() {
        let block = SimpleBlock {
            track_number: 2,
            timestamp: -120,
            flags: 0x81,
            payload: Bytes::from_static(&[1, 2, 3, 4]),
        };
        let bytes = block.to_bytes().unwrap();
        // Skip element ID and size
        let parsed = SimpleBlock::parse(bytes.slice(2..)).unwrap();
        assert_eq!(parsed, block);
        assert!(parsed.is_keyframe());
    }

    #[test]
    fn test_parse_rejects_lacing_and_truncation() {
        assert!(matches!(
            SimpleBlock::parse(Bytes::from_static(&[0x81, 0x00, 0x00, 0x02, 0xAA])),
            Err(MkvError::InvalidStream { .. })
        ));
        assert!(matches!(
            SimpleBlock::parse(Bytes::from_static(&[0x81, 0x00])),
            Err(MkvError::Ebml { .. })
        ));
    }

    #[test]
    fn test_relative_timestamp_policies() {
        let truncate = TimestampOverflowPolicy::Truncate;
        let reject = TimestampOverflowPolicy::Reject;

        assert_eq!(relative_timestamp(66, 33, 1, reject).unwrap(), 33);
        assert_eq!(relative_timestamp(10, 33, 2, reject).unwrap(), -23);
        assert_eq!(relative_timestamp(32_767, 0, 1, reject).unwrap(), i16::MAX);

        assert_eq!(relative_timestamp(40_000, 0, 1, truncate).unwrap(), i16::MAX);
        assert_eq!(relative_timestamp(0, 40_000, 2, truncate).unwrap(), i16::MIN);

        assert!(matches!(
            relative_timestamp(40_000, 0, 1, reject),
            Err(MkvError::TimestampOverflow {
                track_number: 1,
                relative: 40_000
            })
        ));
    }
}
