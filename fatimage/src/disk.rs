//! Placing a finished volume and other payloads onto a larger disk image.
//! These steps only copy bytes to sector offsets; they carry no format of
//! their own.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{ConfigError, ImageResult};

pub const SECTOR_SIZE: usize = 512;

/// Trait abstracting raw disk writes.
/// On the host this is backed by a file; in memory, by a byte vector.
pub trait DiskIO {
    type Error;

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<(), Self::Error>;
}

/// An in-memory disk grows to cover any write past its end.
impl DiskIO for Vec<u8> {
    type Error = core::convert::Infallible;

    fn write(&mut self, buffer: &[u8], offset: u64) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + buffer.len();
        if self.len() < end {
            self.resize(end, 0);
        }
        self[start..end].copy_from_slice(buffer);
        Ok(())
    }
}

pub fn sectors_for(byte_len: usize) -> u32 {
    byte_len.div_ceil(SECTOR_SIZE) as u32
}

/// Sector budget of a composite boot disk
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiskParams {
    /// Size of the blank disk, in sectors. Defaults to a 1.44 MB floppy.
    pub disk_sectors: u32,
    /// Kernels longer than this are reported but still written
    pub max_kernel_sectors: u32,
}

impl Default for DiskParams {
    fn default() -> Self {
        Self {
            disk_sectors: 2880,
            max_kernel_sectors: 128,
        }
    }
}

/// Where each piece of a composite disk ended up
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiskLayout {
    pub kernel_start: u32,
    pub kernel_sectors: u32,
    pub volume_start: u32,
    pub total_sectors: u32,
}

/// Assemble a boot disk: bootloader in sector 0, kernel from sector 1, and the
/// FAT16 volume in the first sector after the kernel. The disk grows past
/// `disk_sectors` rather than cut the volume short.
pub fn compose(
    bootloader: &[u8],
    kernel: &[u8],
    volume: &[u8],
    params: &DiskParams,
) -> ImageResult<(Vec<u8>, DiskLayout)> {
    if bootloader.len() > SECTOR_SIZE {
        return Err(ConfigError::BootloaderTooLarge {
            len: bootloader.len(),
        }
        .into());
    }

    let kernel_start = 1;
    let kernel_sectors = sectors_for(kernel.len());
    if kernel_sectors > params.max_kernel_sectors {
        log::warn!(
            "kernel is {} sectors, more than the {} the bootloader expects",
            kernel_sectors,
            params.max_kernel_sectors,
        );
    }
    let volume_start = kernel_start + kernel_sectors;

    let mut disk = vec![0u8; params.disk_sectors as usize * SECTOR_SIZE];
    let placements: [(u32, &[u8]); 3] = [
        (0, bootloader),
        (kernel_start, kernel),
        (volume_start, volume),
    ];
    for (sector, bytes) in placements {
        disk.write(bytes, sector as u64 * SECTOR_SIZE as u64)
            .unwrap_or_else(|never| match never {});
    }

    let layout = DiskLayout {
        kernel_start,
        kernel_sectors,
        volume_start,
        total_sectors: sectors_for(disk.len()),
    };
    log::info!(
        "kernel at sectors {}..{}, FAT16 volume at sector {}",
        layout.kernel_start,
        layout.volume_start,
        layout.volume_start,
    );
    Ok((disk, layout))
}

/// Write `payload` at absolute sector `lba`, zero-padded up to a whole number
/// of sectors. Returns the number of sectors written.
pub fn write_payload<D: DiskIO>(disk: &mut D, lba: u64, payload: &[u8]) -> Result<u32, D::Error> {
    let sectors = sectors_for(payload.len());
    let mut padded = vec![0u8; sectors as usize * SECTOR_SIZE];
    padded[..payload.len()].copy_from_slice(payload);
    disk.write(&padded, lba * SECTOR_SIZE as u64)?;
    Ok(sectors)
}
