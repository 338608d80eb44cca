use core::ops::Range;

use crate::error::{CapacityError, ImageResult};
use crate::geometry::Geometry;

/// Clusters assigned to one file. The allocator only ever hands out runs from
/// a monotonically increasing cursor, so a chain is a contiguous range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClusterChain {
    first: u16,
    count: u16,
}

impl ClusterChain {
    pub fn new(first: u16, count: u16) -> Self {
        Self { first, count }
    }

    /// The chain of an empty file: no clusters, first cluster 0.
    pub fn empty() -> Self {
        Self { first: 0, count: 0 }
    }

    /// Cluster number stored in the directory entry, 0 for an empty file
    pub fn first_cluster(&self) -> u16 {
        if self.count == 0 {
            0
        } else {
            self.first
        }
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn range(&self) -> Range<u16> {
        if self.count == 0 {
            return 0..0;
        }
        self.first..self.first + self.count
    }

    pub fn iter(&self) -> Range<u16> {
        self.range()
    }
}

/// Hands out clusters from a cursor that starts at 2 and only moves forward.
/// Nothing is ever freed, so no cluster is handed out twice.
pub struct ClusterAllocator {
    next_free: u32,
    limit: u32,
    bytes_per_cluster: u32,
}

impl ClusterAllocator {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            next_free: 2,
            limit: geometry.cluster_limit(),
            bytes_per_cluster: geometry.bytes_per_cluster(),
        }
    }

    pub fn clusters_needed(&self, byte_len: u64) -> u64 {
        byte_len.div_ceil(self.bytes_per_cluster as u64)
    }

    pub fn free_clusters(&self) -> u32 {
        self.limit.saturating_sub(self.next_free)
    }

    pub fn next_free(&self) -> u32 {
        self.next_free
    }

    /// Check that a file of `byte_len` bytes fits without moving the cursor.
    pub fn check(&self, byte_len: u64) -> ImageResult {
        if byte_len > u32::MAX as u64 {
            return Err(CapacityError::FileTooLarge { len: byte_len }.into());
        }
        let needed = self.clusters_needed(byte_len);
        let available = self.free_clusters();
        if needed > available as u64 {
            return Err(CapacityError::OutOfClusters { needed, available }.into());
        }
        Ok(())
    }

    /// Reserve enough clusters for `byte_len` bytes. Zero-length files get an
    /// empty chain and do not move the cursor. On error the cursor is left
    /// where it was.
    pub fn allocate(&mut self, byte_len: u64) -> ImageResult<ClusterChain> {
        self.check(byte_len)?;
        let needed = self.clusters_needed(byte_len) as u32;
        if needed == 0 {
            return Ok(ClusterChain::empty());
        }
        let chain = ClusterChain::new(self.next_free as u16, needed as u16);
        self.next_free += needed;
        Ok(chain)
    }
}
