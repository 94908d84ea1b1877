//! TIFF and BigTIFF file header.

/// Byte order declared by the first two header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffVariant {
    /// Version 42, 32-bit offsets.
    Classic,
    /// Version 43, 64-bit offsets.
    BigTiff,
}

/// The fixed header at the start of every TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,
    pub variant: TiffVariant,
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parses the header, returning `None` if `bytes` does not start with a
    /// well-formed TIFF or BigTIFF header.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let byte_order = match bytes.get(0..2)? {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => return None,
        };
        let u16_at = |offset: usize| -> Option<u16> {
            let raw: [u8; 2] = bytes.get(offset..offset + 2)?.try_into().ok()?;
            Some(match byte_order {
                ByteOrder::LittleEndian => u16::from_le_bytes(raw),
                ByteOrder::BigEndian => u16::from_be_bytes(raw),
            })
        };

        match u16_at(2)? {
            42 => {
                let raw: [u8; 4] = bytes.get(4..8)?.try_into().ok()?;
                let offset = match byte_order {
                    ByteOrder::LittleEndian => u32::from_le_bytes(raw),
                    ByteOrder::BigEndian => u32::from_be_bytes(raw),
                };
                (offset >= 8).then_some(Self {
                    byte_order,
                    variant: TiffVariant::Classic,
                    first_ifd_offset: u64::from(offset),
                })
            },
            43 => {
                // Offset byte size, then a reserved zero.
                if u16_at(4)? != 8 || u16_at(6)? != 0 {
                    return None;
                }
                let raw: [u8; 8] = bytes.get(8..16)?.try_into().ok()?;
                let offset = match byte_order {
                    ByteOrder::LittleEndian => u64::from_le_bytes(raw),
                    ByteOrder::BigEndian => u64::from_be_bytes(raw),
                };
                (offset >= 16).then_some(Self {
                    byte_order,
                    variant: TiffVariant::BigTiff,
                    first_ifd_offset: offset,
                })
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn is_bigtiff(&self) -> bool {
        self.variant == TiffVariant::BigTiff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_little_endian() {
        let header = TiffHeader::parse(b"II*\0\x08\0\0\0").unwrap();
        assert_eq!(header.byte_order, ByteOrder::LittleEndian);
        assert_eq!(header.variant, TiffVariant::Classic);
        assert_eq!(header.first_ifd_offset, 8);
    }

    #[test]
    fn test_classic_big_endian() {
        let header = TiffHeader::parse(b"MM\0*\0\0\x01\0").unwrap();
        assert_eq!(header.byte_order, ByteOrder::BigEndian);
        assert_eq!(header.first_ifd_offset, 256);
    }

    #[test]
    fn test_bigtiff() {
        let bytes = b"II+\0\x08\0\0\0\x10\0\0\0\0\0\0\0";
        let header = TiffHeader::parse(bytes).unwrap();
        assert!(header.is_bigtiff());
        assert_eq!(header.first_ifd_offset, 16);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(TiffHeader::parse(b""), None);
        assert_eq!(TiffHeader::parse(b"II*\0"), None);
        assert_eq!(TiffHeader::parse(b"II*\0\x04\0\0\0"), None);
        assert_eq!(TiffHeader::parse(b"IM*\0\x08\0\0\0"), None);
        assert_eq!(TiffHeader::parse(b"II+\0\x04\0\0\0\x10\0\0\0\0\0\0\0"), None);
        assert_eq!(TiffHeader::parse(b"\x89PNG\r\n\x1a\n"), None);
    }
}
