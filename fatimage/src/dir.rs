use core::fmt;

use crate::cluster::ClusterChain;
use crate::error::{ImageResult, NameError};
use crate::field::{encode_fields, Field};

pub const DIR_ENTRY_SIZE: usize = 32;

pub const ATTRIBUTE_ARCHIVE: u8 = 0x20;

/// Bytes that may never appear in a short name
const ILLEGAL_NAME_BYTES: &[u8] = b"\"*+,./:;<=>?[\\]|";

/// Marks a deleted entry when it leads the name
const DELETED_MARKER: u8 = 0xe5;

/// An 11-byte, space-padded, upper-case 8.3 name, exactly as it is stored in
/// a directory entry.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ShortName([u8; 11]);

impl ShortName {
    /// Accept an already-formatted 11-byte field, such as `b"KERNEL  BIN"`.
    pub fn from_bytes(raw: &[u8]) -> ImageResult<Self> {
        let field: [u8; 11] = raw.try_into().map_err(|_| NameError::Length(raw.len()))?;
        for (index, &byte) in field.iter().enumerate() {
            let bad_lead = index == 0 && (byte == b' ' || byte == DELETED_MARKER);
            if bad_lead || !is_valid_name_byte(byte) {
                return Err(NameError::InvalidByte { index, byte }.into());
            }
        }
        Ok(Self(field))
    }

    /// Build the field from a dotted host name such as `kernel.bin`,
    /// upper-casing it and padding stem and extension with spaces.
    pub fn from_display(name: &str) -> ImageResult<Self> {
        if name.is_empty() {
            return Err(NameError::Empty.into());
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some(pair) => pair,
            None => (name, ""),
        };
        if stem.is_empty() {
            return Err(NameError::Empty.into());
        }
        if stem.len() > 8 || ext.len() > 3 {
            return Err(NameError::TooLong {
                stem: stem.len(),
                ext: ext.len(),
            }
            .into());
        }
        let mut field = [0x20u8; 11];
        for (i, byte) in stem.bytes().enumerate() {
            field[i] = byte.to_ascii_uppercase();
        }
        for (i, byte) in ext.bytes().enumerate() {
            field[8 + i] = byte.to_ascii_uppercase();
        }
        Self::from_bytes(&field)
    }

    pub fn as_bytes(&self) -> &[u8; 11] {
        &self.0
    }

    pub fn stem(&self) -> &str {
        trim_padding(&self.0[..8])
    }

    pub fn ext(&self) -> &str {
        trim_padding(&self.0[8..])
    }
}

fn is_valid_name_byte(byte: u8) -> bool {
    if byte < 0x20 || byte == 0x7f {
        return false;
    }
    if byte.is_ascii_lowercase() {
        return false;
    }
    !ILLEGAL_NAME_BYTES.contains(&byte)
}

fn trim_padding(field: &[u8]) -> &str {
    let mut len = field.len();
    while len > 0 && field[len - 1] == 0x20 {
        len -= 1;
    }
    core::str::from_utf8(&field[..len]).unwrap_or("?")
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ext().is_empty() {
            write!(f, "{}", self.stem())
        } else {
            write!(f, "{}.{}", self.stem(), self.ext())
        }
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName(\"{}\")", trim_padding(&self.0))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct FileTime(u16);

impl FileTime {
    pub fn get_hours(&self) -> u16 {
        self.0 >> 11
    }

    pub fn get_minutes(&self) -> u16 {
        (self.0 >> 5) & 0x3f
    }

    pub fn get_seconds(&self) -> u16 {
        (self.0 & 0x1f) << 1
    }

    pub fn from_parts(hours: u8, minutes: u8, seconds: u8) -> Self {
        let val = ((hours as u16 & 0x1f) << 11)
            | ((minutes as u16 & 0x3f) << 5)
            | ((seconds as u16 >> 1) & 0x1f);
        FileTime(val)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct FileDate(u16);

impl FileDate {
    pub fn get_year(&self) -> u16 {
        ((self.0 >> 9) & 0x7f) + 1980
    }

    pub fn get_month(&self) -> u16 {
        (self.0 >> 5) & 0xf
    }

    pub fn get_day(&self) -> u16 {
        self.0 & 0x1f
    }

    /// Years outside 1980..=2107 are clamped to the representable range.
    pub fn from_parts(year: u16, month: u8, day: u8) -> Self {
        let year_val = year.clamp(1980, 2107) - 1980;
        let val = (year_val << 9) | ((month as u16 & 0xf) << 5) | (day as u16 & 0x1f);
        FileDate(val)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u32, month: usize) -> u32 {
    const DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 1 && is_leap_year(year) {
        29
    } else {
        DAYS[month]
    }
}

/// Decode a timestamp (seconds since 1980-01-01 00:00:00) into FAT FileDate
/// and FileTime.
pub fn decode_timestamp(ts: u32) -> (FileDate, FileTime) {
    let mut days = ts / 86400;
    let raw_time = ts % 86400;

    let mut year = 1980u32;
    loop {
        let year_len = if is_leap_year(year) { 366 } else { 365 };
        if days < year_len {
            break;
        }
        days -= year_len;
        year += 1;
    }

    let mut month = 0usize;
    while days >= days_in_month(year, month) {
        days -= days_in_month(year, month);
        month += 1;
    }

    let hours = raw_time / 3600;
    let minutes = (raw_time / 60) % 60;
    let seconds = raw_time % 60;

    let fat_date = FileDate::from_parts(year as u16, month as u8 + 1, days as u8 + 1);
    let fat_time = FileTime::from_parts(hours as u8, minutes as u8, seconds as u8);
    (fat_date, fat_time)
}

/// Byte offsets of the directory entry fields written by the builder. The
/// range between the attribute byte and the time field stays zero.
mod offset {
    pub const NAME: usize = 0x00;
    pub const ATTRIBUTES: usize = 0x0b;
    pub const MODIFY_TIME: usize = 0x16;
    pub const MODIFY_DATE: usize = 0x18;
    pub const FIRST_CLUSTER: usize = 0x1a;
    pub const BYTE_SIZE: usize = 0x1c;
}

/// Root directory entry for one packed file
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    name: ShortName,
    attributes: u8,
    modify_time: FileTime,
    modify_date: FileDate,
    first_file_cluster: u16,
    byte_size: u32,
}

impl DirEntry {
    pub fn file(name: ShortName, chain: &ClusterChain, byte_size: u32, timestamp: u32) -> Self {
        let (modify_date, modify_time) = decode_timestamp(timestamp);
        Self {
            name,
            attributes: ATTRIBUTE_ARCHIVE,
            modify_time,
            modify_date,
            first_file_cluster: chain.first_cluster(),
            byte_size,
        }
    }

    pub fn name(&self) -> &ShortName {
        &self.name
    }

    pub fn first_file_cluster(&self) -> u16 {
        self.first_file_cluster
    }

    pub fn byte_size(&self) -> u32 {
        self.byte_size
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        encode_fields(
            &mut raw,
            &[
                Field::bytes(offset::NAME, self.name.as_bytes()),
                Field::u8(offset::ATTRIBUTES, self.attributes),
                Field::u16(offset::MODIFY_TIME, self.modify_time.raw()),
                Field::u16(offset::MODIFY_DATE, self.modify_date.raw()),
                Field::u16(offset::FIRST_CLUSTER, self.first_file_cluster),
                Field::u32(offset::BYTE_SIZE, self.byte_size),
            ],
        );
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageError;

    /// 2024-01-15 12:00:00, as seconds since 1980-01-01
    const JAN_15_2024_NOON: u32 = 1_389_787_200;

    #[test]
    fn raw_name_accepted() {
        let name = ShortName::from_bytes(b"KERNEL  BIN").unwrap();
        assert_eq!(name.stem(), "KERNEL");
        assert_eq!(name.ext(), "BIN");
        assert_eq!(format!("{}", name), "KERNEL.BIN");
    }

    #[test]
    fn raw_name_wrong_length() {
        assert_eq!(
            ShortName::from_bytes(b"KERNEL.BIN"),
            Err(ImageError::Name(NameError::Length(10))),
        );
        assert_eq!(
            ShortName::from_bytes(b"KERNEL   BIN"),
            Err(ImageError::Name(NameError::Length(12))),
        );
    }

    #[test]
    fn raw_name_rejects_unnormalized_bytes() {
        assert_eq!(
            ShortName::from_bytes(b"kernel  BIN"),
            Err(ImageError::Name(NameError::InvalidByte { index: 0, byte: b'k' })),
        );
        assert_eq!(
            ShortName::from_bytes(b"A\0      BIN"),
            Err(ImageError::Name(NameError::InvalidByte { index: 1, byte: 0 })),
        );
        assert_eq!(
            ShortName::from_bytes(b"A*      BIN"),
            Err(ImageError::Name(NameError::InvalidByte { index: 1, byte: b'*' })),
        );
        assert!(ShortName::from_bytes(b"        BIN").is_err());
        let mut deleted = *b"XA      BIN";
        deleted[0] = 0xe5;
        assert!(ShortName::from_bytes(&deleted).is_err());
    }

    #[test]
    fn display_name_normalized() {
        let name = ShortName::from_display("f.bmp").unwrap();
        assert_eq!(name.as_bytes(), b"F       BMP");
        let name = ShortName::from_display("README").unwrap();
        assert_eq!(name.as_bytes(), b"README     ");
        assert_eq!(format!("{}", name), "README");
    }

    #[test]
    fn display_name_too_long() {
        assert_eq!(
            ShortName::from_display("bootloader.bin"),
            Err(ImageError::Name(NameError::TooLong { stem: 10, ext: 3 })),
        );
        assert_eq!(
            ShortName::from_display("a.json"),
            Err(ImageError::Name(NameError::TooLong { stem: 1, ext: 4 })),
        );
        assert_eq!(ShortName::from_display(""), Err(ImageError::Name(NameError::Empty)));
        assert_eq!(ShortName::from_display(".bin"), Err(ImageError::Name(NameError::Empty)));
    }

    #[test]
    fn time_packing() {
        let time = FileTime::from_parts(13, 45, 31);
        assert_eq!(time.raw(), (13 << 11) | (45 << 5) | 15);
        assert_eq!(time.get_hours(), 13);
        assert_eq!(time.get_minutes(), 45);
        assert_eq!(time.get_seconds(), 30);
    }

    #[test]
    fn date_packing() {
        let date = FileDate::from_parts(2024, 1, 15);
        assert_eq!(date.raw(), (44 << 9) | (1 << 5) | 15);
        assert_eq!(date.get_year(), 2024);
        assert_eq!(date.get_month(), 1);
        assert_eq!(date.get_day(), 15);
    }

    #[test]
    fn decode_epoch() {
        let (date, time) = decode_timestamp(0);
        assert_eq!((date.get_year(), date.get_month(), date.get_day()), (1980, 1, 1));
        assert_eq!(time.raw(), 0);
    }

    #[test]
    fn decode_known_date() {
        let (date, time) = decode_timestamp(JAN_15_2024_NOON);
        assert_eq!((date.get_year(), date.get_month(), date.get_day()), (2024, 1, 15));
        assert_eq!((time.get_hours(), time.get_minutes(), time.get_seconds()), (12, 0, 0));
    }

    #[test]
    fn decode_leap_day() {
        // 1980 is a leap year: day 59 (zero-based) is February 29
        let (date, _) = decode_timestamp(59 * 86400);
        assert_eq!((date.get_year(), date.get_month(), date.get_day()), (1980, 2, 29));
        let (date, _) = decode_timestamp(60 * 86400);
        assert_eq!((date.get_year(), date.get_month(), date.get_day()), (1980, 3, 1));
        let (date, _) = decode_timestamp(365 * 86400);
        assert_eq!((date.get_year(), date.get_month(), date.get_day()), (1980, 12, 31));
        let (date, _) = decode_timestamp(366 * 86400);
        assert_eq!((date.get_year(), date.get_month(), date.get_day()), (1981, 1, 1));
    }

    #[test]
    fn entry_layout() {
        let name = ShortName::from_bytes(b"F       BMP").unwrap();
        let entry = DirEntry::file(name, &ClusterChain::new(2, 3), 5000, JAN_15_2024_NOON);
        assert_eq!(entry.name(), &name);
        assert_eq!(entry.first_file_cluster(), 2);
        assert_eq!(entry.byte_size(), 5000);
        let raw = entry.to_bytes();
        assert_eq!(&raw[0..11], b"F       BMP");
        assert_eq!(raw[11], 0x20);
        assert!(raw[12..22].iter().all(|&b| b == 0));
        assert_eq!(u16::from_le_bytes([raw[22], raw[23]]), 12 << 11);
        assert_eq!(u16::from_le_bytes([raw[24], raw[25]]), (44 << 9) | (1 << 5) | 15);
        assert_eq!(u16::from_le_bytes([raw[26], raw[27]]), 2);
        assert_eq!(u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]), 5000);
    }

    #[test]
    fn empty_file_entry() {
        let name = ShortName::from_display("empty.txt").unwrap();
        let entry = DirEntry::file(name, &ClusterChain::empty(), 0, 0);
        assert_eq!(entry.first_file_cluster(), 0);
        let raw = entry.to_bytes();
        assert_eq!(u16::from_le_bytes([raw[26], raw[27]]), 0);
        assert_eq!(u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]), 0);
    }
}
