use core::fmt;

/// Everything that can stop a volume from being built. Each variant is raised
/// before the offending bytes are written, so a failed build never leaves a
/// half-populated section behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageError {
    Configuration(ConfigError),
    Name(NameError),
    Capacity(CapacityError),
}

pub type ImageResult<T = ()> = Result<T, ImageError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The requested size does not cover a single sector
    ZeroSizedImage,
    /// More sectors than the 32-bit BPB field can describe
    ImageTooLarge { total_sectors: u64 },
    BytesPerSector(u16),
    SectorsPerCluster(u8),
    NoReservedSectors,
    NoFats,
    NoRootEntries,
    /// The derived FAT does not fit the 16-bit sectors-per-FAT field
    FatTooLarge { sectors: u64 },
    /// Reserved area, FATs and root directory leave no room for a cluster
    NoDataRegion { required: u64, total_sectors: u32 },
    FieldTooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },
    BootloaderTooLarge { len: usize },
    /// Too few or too many clusters for drivers to treat the volume as FAT16
    ClusterCountOutOfRange { clusters: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameError {
    /// The directory field is exactly 11 bytes, no more and no less
    Length(usize),
    InvalidByte { index: usize, byte: u8 },
    /// A dotted name whose stem or extension does not fit 8.3
    TooLong { stem: usize, ext: usize },
    Empty,
    /// Two files in the root directory share a name
    Duplicate([u8; 11]),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapacityError {
    RootDirectoryFull { requested: usize, max: u16 },
    OutOfClusters { needed: u64, available: u32 },
    /// The 32-bit size field of a directory entry cannot hold the file
    FileTooLarge { len: u64 },
}

impl From<ConfigError> for ImageError {
    fn from(err: ConfigError) -> Self {
        ImageError::Configuration(err)
    }
}

impl From<NameError> for ImageError {
    fn from(err: NameError) -> Self {
        ImageError::Name(err)
    }
}

impl From<CapacityError> for ImageError {
    fn from(err: CapacityError) -> Self {
        ImageError::Capacity(err)
    }
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Configuration(err) => write!(f, "configuration error: {}", err),
            ImageError::Name(err) => write!(f, "name error: {}", err),
            ImageError::Capacity(err) => write!(f, "capacity error: {}", err),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSizedImage => write!(f, "image size is smaller than one sector"),
            ConfigError::ImageTooLarge { total_sectors } => {
                write!(f, "{} sectors exceed the 32-bit sector count", total_sectors)
            }
            ConfigError::BytesPerSector(bps) => write!(
                f,
                "bytes per sector must be a power of two between 512 and 4096, got {}",
                bps
            ),
            ConfigError::SectorsPerCluster(spc) => write!(
                f,
                "sectors per cluster must be a power of two between 1 and 128, got {}",
                spc
            ),
            ConfigError::NoReservedSectors => write!(f, "at least one reserved sector is required"),
            ConfigError::NoFats => write!(f, "at least one FAT copy is required"),
            ConfigError::NoRootEntries => write!(f, "root directory must hold at least one entry"),
            ConfigError::FatTooLarge { sectors } => {
                write!(f, "FAT of {} sectors does not fit a FAT16 boot sector", sectors)
            }
            ConfigError::NoDataRegion {
                required,
                total_sectors,
            } => write!(
                f,
                "image of {} sectors cannot hold {} sectors of metadata plus one cluster",
                total_sectors, required
            ),
            ConfigError::FieldTooLong { field, max, len } => {
                write!(f, "{} is {} bytes, field holds {}", field, len, max)
            }
            ConfigError::BootloaderTooLarge { len } => {
                write!(f, "bootloader is {} bytes, boot sector holds 512", len)
            }
            ConfigError::ClusterCountOutOfRange { clusters } => write!(
                f,
                "{} clusters is outside the FAT16 range 4085..=65524, \
                 adjust the size or sectors per cluster",
                clusters
            ),
        }
    }
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::Length(len) => write!(f, "8.3 name must be 11 bytes, got {}", len),
            NameError::InvalidByte { index, byte } => {
                write!(f, "byte {:#04x} at position {} is not allowed in an 8.3 name", byte, index)
            }
            NameError::TooLong { stem, ext } => write!(
                f,
                "name with {}-character stem and {}-character extension does not fit 8.3",
                stem, ext
            ),
            NameError::Empty => write!(f, "name is empty"),
            NameError::Duplicate(name) => write!(
                f,
                "\"{}\" is already in the root directory",
                core::str::from_utf8(name).unwrap_or("?")
            ),
        }
    }
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::RootDirectoryFull { requested, max } => write!(
                f,
                "{} files requested, root directory holds {}",
                requested, max
            ),
            CapacityError::OutOfClusters { needed, available } => write!(
                f,
                "{} clusters needed, {} available",
                needed, available
            ),
            CapacityError::FileTooLarge { len } => {
                write!(f, "file of {} bytes exceeds the 4 GiB FAT limit", len)
            }
        }
    }
}

impl core::error::Error for ImageError {}
