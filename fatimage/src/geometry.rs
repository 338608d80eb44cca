use alloc::string::String;

use crate::error::{ConfigError, ImageResult};

/// Size of one root directory entry
pub const DIR_ENTRY_SIZE: u32 = 32;

/// Drivers identify a volume as FAT16 by its cluster count alone
pub const FAT16_MIN_CLUSTERS: u32 = 4085;
pub const FAT16_MAX_CLUSTERS: u32 = 65524;

/// Cluster numbers from 0xFFF7 upward are reserved for bad-cluster and
/// end-of-chain markers.
const FIRST_RESERVED_CLUSTER: u32 = 0xFFF7;

/// Overridable structural constants, plus the identity fields that end up in
/// the boot sector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeParams {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_directory_entries: u16,
    pub media_descriptor: u8,
    pub oem_name: String,
    pub volume_label: String,
    pub volume_serial: u32,
    pub drive_number: u8,
    pub sectors_per_track: u16,
    pub heads: u16,
    pub hidden_sectors: u32,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            bytes_per_sector: 512,
            sectors_per_cluster: 4,
            reserved_sectors: 1,
            fat_count: 2,
            root_directory_entries: 512,
            media_descriptor: 0xf8,
            oem_name: String::from("MKFSFAT"),
            volume_label: String::from("NO NAME"),
            volume_serial: 12345678,
            drive_number: 0x80,
            sectors_per_track: 32,
            heads: 2,
            hidden_sectors: 0,
        }
    }
}

impl VolumeParams {
    pub fn validate(&self) -> ImageResult {
        let bps = self.bytes_per_sector;
        if !bps.is_power_of_two() || !(512..=4096).contains(&bps) {
            return Err(ConfigError::BytesPerSector(bps).into());
        }
        let spc = self.sectors_per_cluster;
        if !spc.is_power_of_two() || spc > 128 {
            return Err(ConfigError::SectorsPerCluster(spc).into());
        }
        if self.reserved_sectors == 0 {
            return Err(ConfigError::NoReservedSectors.into());
        }
        if self.fat_count == 0 {
            return Err(ConfigError::NoFats.into());
        }
        if self.root_directory_entries == 0 {
            return Err(ConfigError::NoRootEntries.into());
        }
        Ok(())
    }
}

/// Sector layout of a volume, derived once from the image size and never
/// changed afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_directory_entries: u16,
    pub total_sectors: u32,
    pub sectors_per_fat: u16,
}

impl Geometry {
    /// Derive the layout for an image of `size_bytes`. Sizes that are not a
    /// whole number of sectors are truncated.
    ///
    /// The FAT size comes from the approximation
    /// `ceil((total - reserved - root + spc * fats) / (spc * fats + bps / 2))`,
    /// which may leave a few data sectors unused but always yields a table
    /// large enough to describe every cluster. A cluster count outside
    /// `FAT16_MIN_CLUSTERS..=FAT16_MAX_CLUSTERS` is rejected.
    pub fn compute(size_bytes: u64, params: &VolumeParams) -> ImageResult<Self> {
        params.validate()?;

        let bps = params.bytes_per_sector as u64;
        let spc = params.sectors_per_cluster as u64;
        let reserved = params.reserved_sectors as u64;
        let fats = params.fat_count as u64;

        let total = size_bytes / bps;
        if total == 0 {
            return Err(ConfigError::ZeroSizedImage.into());
        }
        if total > u32::MAX as u64 {
            return Err(ConfigError::ImageTooLarge {
                total_sectors: total,
            }
            .into());
        }

        let root_sectors =
            root_directory_sectors(params.root_directory_entries, params.bytes_per_sector) as u64;
        if total < reserved + root_sectors {
            return Err(ConfigError::NoDataRegion {
                required: reserved + root_sectors + fats + spc,
                total_sectors: total as u32,
            }
            .into());
        }

        let entries_per_fat_sector = bps / 2;
        let numerator = total - reserved - root_sectors + spc * fats;
        let denominator = spc * fats + entries_per_fat_sector;
        let fat_sectors = numerator.div_ceil(denominator).max(1);
        if fat_sectors > u16::MAX as u64 {
            return Err(ConfigError::FatTooLarge {
                sectors: fat_sectors,
            }
            .into());
        }

        let required = reserved + fats * fat_sectors + root_sectors + spc;
        if required > total {
            return Err(ConfigError::NoDataRegion {
                required,
                total_sectors: total as u32,
            }
            .into());
        }

        let geometry = Self {
            bytes_per_sector: params.bytes_per_sector,
            sectors_per_cluster: params.sectors_per_cluster,
            reserved_sectors: params.reserved_sectors,
            fat_count: params.fat_count,
            root_directory_entries: params.root_directory_entries,
            total_sectors: total as u32,
            sectors_per_fat: fat_sectors as u16,
        };

        log::debug!(
            "geometry: {} sectors, {} sectors per FAT, data at sector {}, {} clusters",
            geometry.total_sectors,
            geometry.sectors_per_fat,
            geometry.first_data_sector(),
            geometry.cluster_count(),
        );
        let clusters = geometry.cluster_count();
        if !(FAT16_MIN_CLUSTERS..=FAT16_MAX_CLUSTERS).contains(&clusters) {
            return Err(ConfigError::ClusterCountOutOfRange { clusters }.into());
        }

        Ok(geometry)
    }

    pub fn root_directory_sectors(&self) -> u32 {
        root_directory_sectors(self.root_directory_entries, self.bytes_per_sector)
    }

    pub fn first_root_directory_sector(&self) -> u32 {
        let fat_sectors = (self.fat_count as u32) * (self.sectors_per_fat as u32);

        (self.reserved_sectors as u32) + fat_sectors
    }

    pub fn first_data_sector(&self) -> u32 {
        self.first_root_directory_sector() + self.root_directory_sectors()
    }

    pub fn data_sectors(&self) -> u32 {
        self.total_sectors - self.first_data_sector()
    }

    /// Number of whole clusters in the data region. Trailing sectors that do
    /// not fill a cluster are unused.
    pub fn cluster_count(&self) -> u32 {
        self.data_sectors() / self.sectors_per_cluster as u32
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.sectors_per_cluster as u32 * self.bytes_per_sector as u32
    }

    pub fn fat_entries(&self) -> u32 {
        self.sectors_per_fat as u32 * self.bytes_per_sector as u32 / 2
    }

    /// One past the highest cluster number a file may use. Bounded by the data
    /// region, by the entries the FAT can hold, and by the reserved range.
    pub fn cluster_limit(&self) -> u32 {
        (self.cluster_count() + 2)
            .min(self.fat_entries())
            .min(FIRST_RESERVED_CLUSTER)
    }

    pub fn image_len(&self) -> usize {
        self.total_sectors as usize * self.bytes_per_sector as usize
    }

    pub fn fat_offset(&self, index: u8) -> usize {
        let sector =
            self.reserved_sectors as usize + index as usize * self.sectors_per_fat as usize;
        sector * self.bytes_per_sector as usize
    }

    pub fn root_directory_offset(&self) -> usize {
        self.first_root_directory_sector() as usize * self.bytes_per_sector as usize
    }

    pub fn cluster_sector(&self, cluster: u32) -> u32 {
        self.first_data_sector() + (cluster - 2) * self.sectors_per_cluster as u32
    }

    pub fn cluster_offset(&self, cluster: u32) -> usize {
        self.cluster_sector(cluster) as usize * self.bytes_per_sector as usize
    }
}

fn root_directory_sectors(entries: u16, bytes_per_sector: u16) -> u32 {
    (entries as u32 * DIR_ENTRY_SIZE).div_ceil(bytes_per_sector as u32)
}
