//! Segment identifier sources.

use rand::RngExt;

pub const SEGMENT_UID_LEN: usize = 16;

pub type SegmentUid = [u8; SEGMENT_UID_LEN];

/// Supplies the 16-byte SegmentUID written into SegmentInfo.
pub trait SegmentUidSource {
    fn next_uid(&mut self) -> SegmentUid;
}

/// Random identifiers from the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUid;

impl SegmentUidSource for RandomUid {
    fn next_uid(&mut self) -> SegmentUid {
        rand::rng().random()
    }
}

/// Always returns the same identifier. Useful for reproducible output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedUid(pub SegmentUid);

impl SegmentUidSource for FixedUid {
    fn next_uid(&mut self) -> SegmentUid {
        self.0
    }
}

impl<F> SegmentUidSource for F
where
    F: FnMut() -> SegmentUid,
{
    fn next_uid(&mut self) -> SegmentUid {
        self()
    }
}
