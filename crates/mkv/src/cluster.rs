use bytes::{BufMut, Bytes, BytesMut};
use ebml::{Element, ids};

use crate::Result;
use crate::block::SimpleBlock;
use crate::sink::{EmittedSegment, SegmentKind};

/// Accumulator for the currently open cluster.
///
/// The Timecode and Position children are encoded when the cluster is opened,
/// so they always precede the blocks. Position is written as 0: byte offsets
/// are not tracked for a live stream.
#[derive(Debug, Clone)]
pub struct Cluster {
    base_timestamp: u64,
    prelude: Bytes,
    blocks: Vec<SimpleBlock>,
    payload_len: u64,
}

impl Cluster {
    pub fn open(base_timestamp: u64) -> Result<Self> {
        let mut prelude = BytesMut::with_capacity(16);
        Element::uint(ids::TIMECODE, base_timestamp).write_to(&mut prelude)?;
        Element::uint(ids::POSITION, 0).write_to(&mut prelude)?;
        let prelude = prelude.freeze();

        Ok(Self {
            base_timestamp,
            payload_len: prelude.len() as u64,
            prelude,
            blocks: Vec::new(),
        })
    }

    pub fn base_timestamp(&self) -> u64 {
        self.base_timestamp
    }

    pub fn blocks(&self) -> &[SimpleBlock] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Current payload size of the Cluster element.
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    pub fn push(&mut self, block: SimpleBlock) -> Result<()> {
        self.payload_len += block.encoded_len()?;
        self.blocks.push(block);
        Ok(())
    }

    /// Close the cluster and serialize it.
    ///
    /// The first chunk holds the Cluster header, Timecode and Position; each
    /// block then contributes its header chunk followed by its frame bytes,
    /// which are passed through without copying.
    pub fn finish(self) -> Result<EmittedSegment> {
        let mut head = BytesMut::with_capacity(16 + self.prelude.len());
        ebml::put_element_header(&mut head, ids::CLUSTER, self.payload_len)?;
        head.put_slice(&self.prelude);

        let mut chunks = Vec::with_capacity(1 + self.blocks.len() * 2);
        chunks.push(head.freeze());
        for block in &self.blocks {
            chunks.push(block.header_bytes()?);
            if !block.payload.is_empty() {
                chunks.push(block.payload.clone());
            }
        }

        Ok(EmittedSegment::new(
            SegmentKind::Cluster {
                base_timestamp: self.base_timestamp,
                block_count: self.blocks.len(),
            },
            chunks,
        ))
    }
}
