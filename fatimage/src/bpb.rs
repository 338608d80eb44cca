use alloc::vec;
use alloc::vec::Vec;

use crate::error::{ConfigError, ImageResult};
use crate::field::{encode_fields, Field};
use crate::geometry::{Geometry, VolumeParams};

pub const BOOT_SECTOR_SIZE: usize = 512;

/// Short jump over the BPB followed by a NOP
const JUMP_INSTRUCTION: [u8; 3] = [0xeb, 0x3c, 0x90];
const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;
const FS_TYPE: &[u8; 8] = b"FAT16   ";
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xaa];

/// Byte offsets of every boot sector field
pub mod offset {
    pub const JUMP: usize = 0x00;
    pub const OEM_NAME: usize = 0x03;
    pub const BYTES_PER_SECTOR: usize = 0x0b;
    pub const SECTORS_PER_CLUSTER: usize = 0x0d;
    pub const RESERVED_SECTORS: usize = 0x0e;
    pub const FAT_COUNT: usize = 0x10;
    pub const ROOT_DIRECTORY_ENTRIES: usize = 0x11;
    pub const TOTAL_SECTORS_16: usize = 0x13;
    pub const MEDIA_DESCRIPTOR: usize = 0x15;
    pub const SECTORS_PER_FAT: usize = 0x16;
    pub const SECTORS_PER_TRACK: usize = 0x18;
    pub const HEADS: usize = 0x1a;
    pub const HIDDEN_SECTORS: usize = 0x1c;
    pub const TOTAL_SECTORS_32: usize = 0x20;
    pub const DRIVE_NUMBER: usize = 0x24;
    pub const EXTENDED_SIGNATURE: usize = 0x26;
    pub const VOLUME_SERIAL: usize = 0x27;
    pub const VOLUME_LABEL: usize = 0x2b;
    pub const FS_TYPE: usize = 0x36;
    pub const BOOT_SIGNATURE: usize = 0x1fe;
}

/// Boot sector contents: the BIOS Parameter Block and its FAT16 extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootSector {
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_directory_entries: u16,
    pub total_sectors_16: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    pub drive_number: u8,
    pub volume_serial: u32,
    pub volume_label: [u8; 11],
}

impl BootSector {
    pub fn new(geometry: &Geometry, params: &VolumeParams) -> ImageResult<Self> {
        let oem_name = pad_field("OEM name", &params.oem_name)?;
        let volume_label = pad_field("volume label", &params.volume_label)?;

        // The 16-bit count is only used when it can hold the whole volume
        let (total_sectors_16, total_sectors_32) = match u16::try_from(geometry.total_sectors) {
            Ok(small) => (small, 0),
            Err(_) => (0, geometry.total_sectors),
        };

        Ok(Self {
            oem_name,
            bytes_per_sector: geometry.bytes_per_sector,
            sectors_per_cluster: geometry.sectors_per_cluster,
            reserved_sectors: geometry.reserved_sectors,
            fat_count: geometry.fat_count,
            root_directory_entries: geometry.root_directory_entries,
            total_sectors_16,
            media_descriptor: params.media_descriptor,
            sectors_per_fat: geometry.sectors_per_fat,
            sectors_per_track: params.sectors_per_track,
            heads: params.heads,
            hidden_sectors: params.hidden_sectors,
            total_sectors_32,
            drive_number: params.drive_number,
            volume_serial: params.volume_serial,
            volume_label,
        })
    }

    pub fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::bytes(offset::JUMP, &JUMP_INSTRUCTION),
            Field::bytes(offset::OEM_NAME, &self.oem_name),
            Field::u16(offset::BYTES_PER_SECTOR, self.bytes_per_sector),
            Field::u8(offset::SECTORS_PER_CLUSTER, self.sectors_per_cluster),
            Field::u16(offset::RESERVED_SECTORS, self.reserved_sectors),
            Field::u8(offset::FAT_COUNT, self.fat_count),
            Field::u16(offset::ROOT_DIRECTORY_ENTRIES, self.root_directory_entries),
            Field::u16(offset::TOTAL_SECTORS_16, self.total_sectors_16),
            Field::u8(offset::MEDIA_DESCRIPTOR, self.media_descriptor),
            Field::u16(offset::SECTORS_PER_FAT, self.sectors_per_fat),
            Field::u16(offset::SECTORS_PER_TRACK, self.sectors_per_track),
            Field::u16(offset::HEADS, self.heads),
            Field::u32(offset::HIDDEN_SECTORS, self.hidden_sectors),
            Field::u32(offset::TOTAL_SECTORS_32, self.total_sectors_32),
            Field::u8(offset::DRIVE_NUMBER, self.drive_number),
            Field::u8(offset::EXTENDED_SIGNATURE, EXTENDED_BOOT_SIGNATURE),
            Field::u32(offset::VOLUME_SERIAL, self.volume_serial),
            Field::bytes(offset::VOLUME_LABEL, &self.volume_label),
            Field::bytes(offset::FS_TYPE, FS_TYPE),
            Field::bytes(offset::BOOT_SIGNATURE, &BOOT_SIGNATURE),
        ]
    }

    pub fn to_bytes(&self) -> [u8; BOOT_SECTOR_SIZE] {
        let mut sector = [0u8; BOOT_SECTOR_SIZE];
        encode_fields(&mut sector, &self.fields());
        sector
    }
}

/// Space-pad an ASCII string into a fixed-width field. Strings wider than the
/// field are rejected rather than truncated.
fn pad_field<const N: usize>(field: &'static str, value: &str) -> ImageResult<[u8; N]> {
    let bytes = value.as_bytes();
    if bytes.len() > N {
        return Err(ConfigError::FieldTooLong {
            field,
            max: N,
            len: bytes.len(),
        }
        .into());
    }
    let mut padded = [0x20u8; N];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageError;

    fn read_u16(buf: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([buf[at], buf[at + 1]])
    }

    fn read_u32(buf: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    fn boot_sector_for(size: u64) -> [u8; BOOT_SECTOR_SIZE] {
        let params = VolumeParams::default();
        let geometry = Geometry::compute(size, &params).unwrap();
        BootSector::new(&geometry, &params).unwrap().to_bytes()
    }

    #[test]
    fn bpb_fields_at_fixed_offsets() {
        let sector = boot_sector_for(16 * 1024 * 1024);
        assert_eq!(&sector[0..3], &[0xeb, 0x3c, 0x90]);
        assert_eq!(&sector[3..11], b"MKFSFAT ");
        assert_eq!(read_u16(&sector, 11), 512);
        assert_eq!(sector[13], 4);
        assert_eq!(read_u16(&sector, 14), 1);
        assert_eq!(sector[16], 2);
        assert_eq!(read_u16(&sector, 17), 512);
        assert_eq!(read_u16(&sector, 19), 32768);
        assert_eq!(sector[21], 0xf8);
        assert_eq!(read_u16(&sector, 22), 125);
        assert_eq!(read_u16(&sector, 24), 32);
        assert_eq!(read_u16(&sector, 26), 2);
        assert_eq!(read_u32(&sector, 28), 0);
        assert_eq!(read_u32(&sector, 32), 0);
    }

    #[test]
    fn extended_bpb() {
        let sector = boot_sector_for(16 * 1024 * 1024);
        assert_eq!(sector[36], 0x80);
        assert_eq!(sector[37], 0);
        assert_eq!(sector[38], 0x29);
        assert_eq!(read_u32(&sector, 39), 12345678);
        assert_eq!(&sector[43..54], b"NO NAME    ");
        assert_eq!(&sector[54..62], b"FAT16   ");
        assert_eq!(&sector[510..512], &[0x55, 0xaa]);
    }

    #[test]
    fn unused_bytes_are_zero() {
        let sector = boot_sector_for(16 * 1024 * 1024);
        assert!(sector[62..510].iter().all(|&b| b == 0));
    }

    #[test]
    fn large_volume_moves_count_to_32bit_field() {
        let sector = boot_sector_for(64 * 1024 * 1024);
        assert_eq!(read_u16(&sector, 19), 0);
        assert_eq!(read_u32(&sector, 32), 131072);
    }

    #[test]
    fn oversized_label_rejected() {
        let params = VolumeParams {
            volume_label: "MUCH TOO LONG".into(),
            ..VolumeParams::default()
        };
        let geometry = Geometry::compute(16 * 1024 * 1024, &params).unwrap();
        assert_eq!(
            BootSector::new(&geometry, &params),
            Err(ImageError::Configuration(ConfigError::FieldTooLong {
                field: "volume label",
                max: 11,
                len: 13,
            })),
        );
    }

    #[test]
    fn fields_do_not_overlap() {
        let params = VolumeParams::default();
        let geometry = Geometry::compute(16 * 1024 * 1024, &params).unwrap();
        let boot = BootSector::new(&geometry, &params).unwrap();
        let mut fields = boot.fields();
        fields.sort_by_key(|f| f.offset);
        for pair in fields.windows(2) {
            assert!(pair[0].end() <= pair[1].offset);
        }
        assert_eq!(fields.last().unwrap().end(), BOOT_SECTOR_SIZE);
    }
}
