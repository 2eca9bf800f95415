//! Destinations for emitted segments.
//!
//! The muxer hands every finished piece of output to a [`SegmentSink`] in
//! stream order. Concatenating the chunks of all delivered segments, in call
//! order, reproduces the exact Matroska byte stream.

use std::io::{self, Write};

use bytes::{BufMut, Bytes, BytesMut};

/// What an emitted segment contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// EBML header, Segment opener, SegmentInfo and Tracks
    Prefix,
    /// One complete Cluster
    Cluster {
        base_timestamp: u64,
        block_count: usize,
    },
}

/// An immutable piece of output made of ordered byte chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedSegment {
    kind: SegmentKind,
    chunks: Vec<Bytes>,
}

impl EmittedSegment {
    pub fn new(kind: SegmentKind, chunks: Vec<Bytes>) -> Self {
        Self { kind, chunks }
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, SegmentKind::Cluster { .. })
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Bytes> {
        self.chunks
    }

    /// Total byte length of all chunks.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate the chunks into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            chunks => {
                let mut buf = BytesMut::with_capacity(self.len());
                for chunk in chunks {
                    buf.put_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}

/// Receives emitted segments in order, on the caller's thread.
///
/// An error returned here is propagated out of the muxer call that produced
/// the segment.
pub trait SegmentSink {
    fn deliver(&mut self, segment: EmittedSegment) -> io::Result<()>;
}

impl<F> SegmentSink for F
where
    F: FnMut(EmittedSegment) -> io::Result<()>,
{
    fn deliver(&mut self, segment: EmittedSegment) -> io::Result<()> {
        self(segment)
    }
}

/// Collects segments in memory.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    segments: Vec<EmittedSegment>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[EmittedSegment] {
        &self.segments
    }

    pub fn clusters(&self) -> impl Iterator<Item = &EmittedSegment> {
        self.segments.iter().filter(|segment| segment.is_cluster())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// The whole stream received so far.
    pub fn to_bytes(&self) -> Bytes {
        let total = self.segments.iter().map(EmittedSegment::len).sum();
        let mut buf = BytesMut::with_capacity(total);
        for chunk in self.segments.iter().flat_map(EmittedSegment::chunks) {
            buf.put_slice(chunk);
        }
        buf.freeze()
    }

    pub fn into_segments(self) -> Vec<EmittedSegment> {
        self.segments
    }
}

impl SegmentSink for VecSink {
    fn deliver(&mut self, segment: EmittedSegment) -> io::Result<()> {
        self.segments.push(segment);
        Ok(())
    }
}

/// Writes every chunk to an [`io::Write`] implementation.
#[derive(Debug)]
pub struct WriteSink<W: Write> {
    writer: W,
    bytes_written: u64,
    flush_each_segment: bool,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
            flush_each_segment: false,
        }
    }

    /// Flush the writer after every segment so each Cluster reaches the
    /// consumer as soon as it is complete.
    pub fn with_flush_each_segment(mut self, flush: bool) -> Self {
        self.flush_each_segment = flush;
        self
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SegmentSink for WriteSink<W> {
    fn deliver(&mut self, segment: EmittedSegment) -> io::Result<()> {
        for chunk in segment.chunks() {
            self.writer.write_all(chunk)?;
            self.bytes_written += chunk.len() as u64;
        }
        if self.flush_each_segment {
            self.writer.flush()?;
        }
        Ok(())
    }
}
