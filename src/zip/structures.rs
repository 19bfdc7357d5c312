use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Location of the central directory, as recorded by the classic
/// End of Central Directory record (22 bytes plus comment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub entries_on_disk: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory record");
        }

        let mut cursor = Cursor::new(&data[4..]);
        let disk_number = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_cd = cursor.read_u16::<LittleEndian>()?;

        Ok(Self {
            disk_number,
            entries_on_disk: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Any saturated field means the real values live in the ZIP64 record.
    pub fn needs_zip64(&self) -> bool {
        self.entries_on_disk == u16::MAX
            || self.total_entries == u16::MAX
            || self.cd_size == u32::MAX
            || self.cd_offset == u32::MAX
    }
}

/// ZIP64 End of Central Directory Locator, stored right before the classic record.
pub struct Zip64Locator;

impl Zip64Locator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    /// Returns the offset of the ZIP64 End of Central Directory record.
    pub fn record_offset(data: &[u8]) -> Result<u64> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Missing ZIP64 End of Central Directory locator");
        }
        let mut cursor = Cursor::new(&data[8..16]);
        Ok(cursor.read_u64::<LittleEndian>()?)
    }
}

/// The 64-bit fields of the ZIP64 End of Central Directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 End of Central Directory record");
        }

        // Skip record size, versions, and disk numbers.
        let mut cursor = Cursor::new(&data[24..]);
        let _entries_on_disk = cursor.read_u64::<LittleEndian>()?;

        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// General purpose flag bit marking an encrypted entry
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// One file recorded in the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub header_offset: u64,
    pub encrypted: bool,
}

impl ZipEntry {
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eocd(entries: u16, cd_size: u32, cd_offset: u32) -> Vec<u8> {
        let mut data = Vec::from(EndOfCentralDirectory::SIGNATURE);
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&entries.to_le_bytes());
        data.extend_from_slice(&entries.to_le_bytes());
        data.extend_from_slice(&cd_size.to_le_bytes());
        data.extend_from_slice(&cd_offset.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data
    }

    #[test]
    fn parses_classic_record() {
        let record = EndOfCentralDirectory::from_bytes(&eocd(3, 150, 1024)).unwrap();
        assert_eq!(record.total_entries, 3);
        assert_eq!(record.cd_size, 150);
        assert_eq!(record.cd_offset, 1024);
        assert!(!record.needs_zip64());
    }

    #[test]
    fn saturated_fields_need_zip64() {
        let record = EndOfCentralDirectory::from_bytes(&eocd(3, 150, u32::MAX)).unwrap();
        assert!(record.needs_zip64());
    }

    #[test]
    fn rejects_bad_signature_and_short_input() {
        let mut data = eocd(1, 46, 0);
        data[2] = 0x07;
        assert!(EndOfCentralDirectory::from_bytes(&data).is_err());
        assert!(EndOfCentralDirectory::from_bytes(&data[..10]).is_err());
    }

    #[test]
    fn parses_zip64_record() {
        let mut data = Vec::from(Zip64EndOfCentralDirectory::SIGNATURE);
        data.extend_from_slice(&44u64.to_le_bytes());
        data.extend_from_slice(&45u16.to_le_bytes());
        data.extend_from_slice(&45u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&70_000u64.to_le_bytes());
        data.extend_from_slice(&70_000u64.to_le_bytes());
        data.extend_from_slice(&5_000_000u64.to_le_bytes());
        data.extend_from_slice(&(6u64 << 32).to_le_bytes());

        let record = Zip64EndOfCentralDirectory::from_bytes(&data).unwrap();
        assert_eq!(record.total_entries, 70_000);
        assert_eq!(record.cd_size, 5_000_000);
        assert_eq!(record.cd_offset, 6u64 << 32);
    }

    #[test]
    fn directory_names_end_with_slash() {
        let entry = ZipEntry {
            name: "css/".to_string(),
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            header_offset: 0,
            encrypted: false,
        };
        assert!(entry.is_directory());
        assert_eq!(CompressionMethod::from_u16(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from_u16(12).as_u16(), 12);
    }
}
