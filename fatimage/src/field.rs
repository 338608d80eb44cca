//! Fixed-offset record encoding. On-disk structures are described as tables of
//! (offset, value) pairs, where the value's variant fixes the field width.
//! All integers are written little-endian.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldValue<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    Bytes(&'a [u8]),
}

impl FieldValue<'_> {
    pub fn width(&self) -> usize {
        match self {
            FieldValue::U8(_) => 1,
            FieldValue::U16(_) => 2,
            FieldValue::U32(_) => 4,
            FieldValue::Bytes(bytes) => bytes.len(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Field<'a> {
    pub offset: usize,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    pub const fn u8(offset: usize, value: u8) -> Self {
        Self {
            offset,
            value: FieldValue::U8(value),
        }
    }

    pub const fn u16(offset: usize, value: u16) -> Self {
        Self {
            offset,
            value: FieldValue::U16(value),
        }
    }

    pub const fn u32(offset: usize, value: u32) -> Self {
        Self {
            offset,
            value: FieldValue::U32(value),
        }
    }

    pub const fn bytes(offset: usize, value: &'a [u8]) -> Self {
        Self {
            offset,
            value: FieldValue::Bytes(value),
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.value.width()
    }

    /// Write this field into `buffer`. The buffer must cover `offset..end()`.
    pub fn write(&self, buffer: &mut [u8]) {
        let dest = &mut buffer[self.offset..self.end()];
        match self.value {
            FieldValue::U8(v) => dest[0] = v,
            FieldValue::U16(v) => dest.copy_from_slice(&v.to_le_bytes()),
            FieldValue::U32(v) => dest.copy_from_slice(&v.to_le_bytes()),
            FieldValue::Bytes(bytes) => dest.copy_from_slice(bytes),
        }
    }
}

/// Write every field of a table into `buffer`. Bytes not named by any field
/// are left untouched.
pub fn encode_fields(buffer: &mut [u8], fields: &[Field]) {
    for field in fields {
        field.write(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_widths() {
        let mut buffer = [0u8; 12];
        encode_fields(
            &mut buffer,
            &[
                Field::u8(0, 0xab),
                Field::u16(1, 0x1234),
                Field::u32(3, 0xdeadbeef),
                Field::bytes(7, b"FAT"),
            ],
        );
        assert_eq!(
            buffer,
            [0xab, 0x34, 0x12, 0xef, 0xbe, 0xad, 0xde, b'F', b'A', b'T', 0, 0],
        );
    }

    #[test]
    fn untouched_bytes_survive() {
        let mut buffer = [0xffu8; 4];
        encode_fields(&mut buffer, &[Field::u16(1, 0)]);
        assert_eq!(buffer, [0xff, 0, 0, 0xff]);
    }

    #[test]
    fn field_end() {
        assert_eq!(Field::u32(0x27, 0).end(), 0x2b);
        assert_eq!(Field::bytes(0x2b, b"NO NAME    ").end(), 0x36);
    }
}
