use alloc::vec;
use alloc::vec::Vec;

use crate::bpb::BootSector;
use crate::cluster::{ClusterAllocator, ClusterChain};
use crate::dir::{DirEntry, ShortName, DIR_ENTRY_SIZE};
use crate::error::{CapacityError, ImageResult, NameError};
use crate::geometry::{Geometry, VolumeParams};
use crate::table::AllocationTable;

/// What the builder recorded for one packed file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub name: ShortName,
    pub chain: ClusterChain,
    pub byte_size: u32,
    pub timestamp: u32,
}

/// Owns the in-progress volume: the zero-filled image buffer, the FAT, and the
/// free-cluster cursor. Files are packed in the order they are added; the boot
/// sector and FAT copies are laid down by `finish`.
pub struct ImageBuilder {
    geometry: Geometry,
    boot_sector: BootSector,
    table: AllocationTable,
    allocator: ClusterAllocator,
    image: Vec<u8>,
    records: Vec<FileRecord>,
    get_timestamp: fn() -> u32,
}

impl ImageBuilder {
    /// `get_timestamp` returns seconds since 1980-01-01 and is sampled once
    /// per added file.
    pub fn new(
        size_bytes: u64,
        params: &VolumeParams,
        get_timestamp: fn() -> u32,
    ) -> ImageResult<Self> {
        let geometry = Geometry::compute(size_bytes, params)?;
        let boot_sector = BootSector::new(&geometry, params)?;
        let table = AllocationTable::new(&geometry, params.media_descriptor);
        let allocator = ClusterAllocator::new(&geometry);
        let image = vec![0u8; geometry.image_len()];

        Ok(Self {
            geometry,
            boot_sector,
            table,
            allocator,
            image,
            records: Vec::new(),
            get_timestamp,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn free_clusters(&self) -> u32 {
        self.allocator.free_clusters()
    }

    /// Check that `files` more files totalling `clusters` clusters would fit,
    /// without touching the image.
    pub fn check_capacity(&self, files: usize, clusters: u64) -> ImageResult {
        let max = self.geometry.root_directory_entries;
        let requested = self.records.len() + files;
        if requested > max as usize {
            return Err(CapacityError::RootDirectoryFull { requested, max }.into());
        }
        let available = self.allocator.free_clusters();
        if clusters > available as u64 {
            return Err(CapacityError::OutOfClusters {
                needed: clusters,
                available,
            }
            .into());
        }
        Ok(())
    }

    /// Pack one file: allocate its chain, copy its bytes cluster by cluster,
    /// link the chain in the FAT, and write its root directory entry. All
    /// checks happen before the first byte is written, so a failed call
    /// leaves the builder unchanged.
    pub fn add_file(&mut self, name: ShortName, data: &[u8]) -> ImageResult<&FileRecord> {
        if self.records.iter().any(|record| record.name == name) {
            return Err(NameError::Duplicate(*name.as_bytes()).into());
        }
        let byte_len = data.len() as u64;
        self.check_capacity(1, self.allocator.clusters_needed(byte_len))?;
        let chain = self.allocator.allocate(byte_len)?;

        let bytes_per_cluster = self.geometry.bytes_per_cluster() as usize;
        for (cluster, chunk) in chain.iter().zip(data.chunks(bytes_per_cluster)) {
            let offset = self.geometry.cluster_offset(cluster as u32);
            // The buffer starts zeroed, so the tail of a short last chunk is
            // already padding.
            self.image[offset..offset + chunk.len()].copy_from_slice(chunk);
        }
        self.table.link_chain(&chain);

        let timestamp = (self.get_timestamp)();
        let byte_size = data.len() as u32;
        let entry = DirEntry::file(name, &chain, byte_size, timestamp);
        let index = self.records.len();
        let offset = self.geometry.root_directory_offset() + index * DIR_ENTRY_SIZE;
        self.image[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());

        log::debug!(
            "packed {} ({} bytes) into clusters {:?}",
            name,
            byte_size,
            chain.range(),
        );

        self.records.push(FileRecord {
            name,
            chain,
            byte_size,
            timestamp,
        });
        Ok(&self.records[index])
    }

    /// Lay down the boot sector and every FAT copy and hand back the finished
    /// image.
    pub fn finish(mut self) -> Vec<u8> {
        let boot = self.boot_sector.to_bytes();
        self.image[..boot.len()].copy_from_slice(&boot);

        let fat = self.table.to_bytes();
        for index in 0..self.geometry.fat_count {
            let offset = self.geometry.fat_offset(index);
            self.image[offset..offset + fat.len()].copy_from_slice(&fat);
        }

        log::info!(
            "built {} byte FAT16 volume with {} files, {} clusters free",
            self.image.len(),
            self.records.len(),
            self.allocator.free_clusters(),
        );
        self.image
    }
}

/// Build a complete volume in one go. Root directory and cluster capacity are
/// checked for the whole file set before anything is packed.
pub fn build_image(
    size_bytes: u64,
    params: &VolumeParams,
    files: &[(ShortName, &[u8])],
    get_timestamp: fn() -> u32,
) -> ImageResult<Vec<u8>> {
    let mut builder = ImageBuilder::new(size_bytes, params, get_timestamp)?;

    let mut clusters = 0u64;
    for (_, data) in files {
        let len = data.len() as u64;
        if len > u32::MAX as u64 {
            return Err(CapacityError::FileTooLarge { len }.into());
        }
        clusters += len.div_ceil(builder.geometry().bytes_per_cluster() as u64);
    }
    builder.check_capacity(files.len(), clusters)?;

    for (name, data) in files {
        builder.add_file(*name, data)?;
    }
    Ok(builder.finish())
}
