use alloc::vec;
use alloc::vec::Vec;

use crate::cluster::ClusterChain;
use crate::geometry::Geometry;

pub const FREE_CLUSTER: u16 = 0x0000;
/// Value written to the last cluster of every chain
pub const END_OF_CHAIN: u16 = 0xffff;
/// Any entry at or above this value terminates a chain
pub const END_OF_CHAIN_MIN: u16 = 0xfff8;

pub fn is_end_of_chain(entry: u16) -> bool {
    entry >= END_OF_CHAIN_MIN
}

/// In-memory FAT16 table. A single table backs every on-disk copy, so the
/// copies are identical by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationTable {
    entries: Vec<u16>,
}

impl AllocationTable {
    /// An empty table sized to fill `sectors_per_fat` sectors. Entry 0 echoes
    /// the media descriptor and entry 1 holds an end-of-chain marker.
    pub fn new(geometry: &Geometry, media_descriptor: u8) -> Self {
        let mut entries = vec![FREE_CLUSTER; geometry.fat_entries() as usize];
        entries[0] = 0xff00 | media_descriptor as u16;
        entries[1] = END_OF_CHAIN;
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, cluster: u16) -> u16 {
        self.entries[cluster as usize]
    }

    pub fn set(&mut self, cluster: u16, value: u16) {
        self.entries[cluster as usize] = value;
    }

    /// Point every cluster of the chain at its successor and terminate the
    /// last one. An empty chain leaves the table untouched.
    pub fn link_chain(&mut self, chain: &ClusterChain) {
        let mut clusters = chain.iter().peekable();
        while let Some(cluster) = clusters.next() {
            let value = match clusters.peek() {
                Some(&next) => next,
                None => END_OF_CHAIN,
            };
            self.set(cluster, value);
        }
    }

    /// Walk the chain starting at `first_cluster`. The walk stops at an
    /// end-of-chain marker, at a free or out-of-range entry, or after visiting
    /// as many clusters as the table holds, so a corrupt table cannot loop
    /// forever.
    pub fn walk(&self, first_cluster: u16) -> ChainWalk<'_> {
        ChainWalk {
            table: self,
            current: if first_cluster >= 2 { Some(first_cluster) } else { None },
            remaining: self.entries.len(),
        }
    }

    /// Little-endian bytes of the whole table, one copy's worth.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.entries.len() * 2);
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.to_le_bytes());
        }
        bytes
    }
}

pub struct ChainWalk<'table> {
    table: &'table AllocationTable,
    current: Option<u16>,
    remaining: usize,
}

impl Iterator for ChainWalk<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        let cluster = self.current?;
        if self.remaining == 0 || cluster as usize >= self.table.len() {
            self.current = None;
            return None;
        }
        self.remaining -= 1;
        let next = self.table.get(cluster);
        self.current = if is_end_of_chain(next) || next < 2 {
            None
        } else {
            Some(next)
        };
        Some(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::VolumeParams;

    fn table() -> AllocationTable {
        let geometry = Geometry::compute(16 * 1024 * 1024, &VolumeParams::default()).unwrap();
        AllocationTable::new(&geometry, 0xf8)
    }

    #[test]
    fn reserved_entries() {
        let table = table();
        assert_eq!(table.len(), 125 * 256);
        assert_eq!(table.get(0), 0xfff8);
        assert_eq!(table.get(1), 0xffff);
        assert!((2..table.len() as u16).all(|c| table.get(c) == FREE_CLUSTER));
    }

    #[test]
    fn serialized_layout() {
        let bytes = table().to_bytes();
        assert_eq!(bytes.len(), 125 * 512);
        assert_eq!(&bytes[0..4], &[0xf8, 0xff, 0xff, 0xff]);
        assert!(bytes[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn linked_chain_walks_back() {
        let mut table = table();
        let chain = ClusterChain::new(5, 4);
        table.link_chain(&chain);
        assert_eq!(table.get(5), 6);
        assert_eq!(table.get(7), 8);
        assert_eq!(table.get(8), END_OF_CHAIN);
        let walked: Vec<u16> = table.walk(5).collect();
        assert_eq!(walked, vec![5, 6, 7, 8]);
    }

    #[test]
    fn single_cluster_chain_terminates() {
        let mut table = table();
        table.link_chain(&ClusterChain::new(2, 1));
        assert!(is_end_of_chain(table.get(2)));
        assert_eq!(table.walk(2).count(), 1);
    }

    #[test]
    fn empty_chain_is_noop() {
        let mut table = table();
        let before = table.clone();
        table.link_chain(&ClusterChain::empty());
        assert_eq!(table, before);
        assert_eq!(table.walk(0).count(), 0);
    }

    #[test]
    fn walk_survives_cycles() {
        let mut table = table();
        table.set(2, 3);
        table.set(3, 2);
        assert_eq!(table.walk(2).count(), table.len());
    }
}
