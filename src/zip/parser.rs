//! Central directory parsing.
//!
//! A zip archive is read from its tail: the End of Central Directory record
//! points at the central directory, which lists every entry together with the
//! offset of its Local File Header. Nothing before the central directory is
//! touched until an entry is actually requested.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Largest trailing comment the format can carry.
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// ZIP64 extended information extra field tag.
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Reads archive metadata from any [`ReadAt`] source.
pub struct ZipParser<R: ReadAt + ?Sized> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt + ?Sized> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Locate the End of Central Directory record.
    ///
    /// Reads the whole tail that could hold the record and a maximal comment,
    /// then scans backwards for a signature whose comment length lines up
    /// exactly with the end of the file.
    ///
    /// Returns the record and its absolute offset.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let record_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < record_size {
            bail!("Not a zip archive: {} bytes is too small", self.size);
        }

        let tail_len = (record_size + MAX_COMMENT_SIZE).min(self.size);
        let tail_start = self.size - tail_len;
        let mut tail = vec![0u8; tail_len as usize];
        self.reader.read_exact_at(tail_start, &mut tail).await?;

        let last_candidate = tail.len() - EndOfCentralDirectory::SIZE;
        for pos in (0..=last_candidate).rev() {
            if &tail[pos..pos + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let record = EndOfCentralDirectory::from_bytes(&tail[pos..])?;
            if record.comment_len as usize == tail.len() - pos - EndOfCentralDirectory::SIZE {
                return Ok((record, tail_start + pos as u64));
            }
        }

        bail!("Not a zip archive: End of Central Directory record not found")
    }

    /// Resolve `(offset, size, entry count)` of the central directory,
    /// following the ZIP64 locator when the classic record is saturated.
    async fn central_directory_bounds(&self) -> Result<(u64, u64, u64)> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        if eocd.disk_number != 0 {
            bail!("Multi-disk archives are not supported");
        }

        if !eocd.needs_zip64() {
            return Ok((
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            ));
        }

        let locator_offset = eocd_offset
            .checked_sub(Zip64Locator::SIZE as u64)
            .context("ZIP64 locator would start before the archive")?;
        let mut locator = [0u8; Zip64Locator::SIZE];
        self.reader.read_exact_at(locator_offset, &mut locator).await?;
        let record_offset = Zip64Locator::record_offset(&locator)?;

        let mut record = [0u8; Zip64EndOfCentralDirectory::MIN_SIZE];
        self.reader.read_exact_at(record_offset, &mut record).await?;
        let zip64 = Zip64EndOfCentralDirectory::from_bytes(&record)?;

        Ok((zip64.cd_offset, zip64.cd_size, zip64.total_entries))
    }

    /// Read every entry recorded in the central directory, in archive order.
    pub async fn read_directory(&self) -> Result<Vec<ZipEntry>> {
        let (cd_offset, cd_size, total_entries) = self.central_directory_bounds().await?;

        match cd_offset.checked_add(cd_size) {
            Some(end) if end <= self.size => {}
            _ => bail!(
                "Central directory ({} bytes at {}) lies outside the {} byte archive",
                cd_size,
                cd_offset,
                self.size
            ),
        }
        if total_entries > cd_size / CDFH_MIN_SIZE as u64 {
            bail!(
                "Central directory of {} bytes cannot hold {} entries",
                cd_size,
                total_entries
            );
        }

        let mut directory = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut directory).await?;

        let mut cursor = Cursor::new(directory.as_slice());
        let mut entries = Vec::with_capacity(total_entries as usize);
        for index in 0..total_entries {
            let entry = parse_cdfh(&mut cursor)
                .with_context(|| format!("Corrupt central directory entry #{index}"))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Absolute offset of an entry's (possibly compressed) data.
    ///
    /// The Local File Header repeats the name and carries its own extra
    /// field, which need not match the central directory copy.
    pub async fn data_offset(&self, entry: &ZipEntry) -> Result<u64> {
        let mut header = [0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.header_offset, &mut header).await?;

        if &header[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.name);
        }

        let mut cursor = Cursor::new(&header[26..]);
        let name_len = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_len = cursor.read_u16::<LittleEndian>()? as u64;

        entry
            .header_offset
            .checked_add(LFH_SIZE as u64 + name_len + extra_len)
            .with_context(|| format!("Data offset of {} overflows", entry.name))
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Parse one Central Directory File Header at the cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipEntry> {
    let mut signature = [0u8; 4];
    cursor.read_exact(&mut signature)?;
    if signature != CDFH_SIGNATURE {
        bail!("Invalid Central Directory File Header signature");
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    let _mod_time = cursor.read_u16::<LittleEndian>()?;
    let _mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let name_len = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_len = cursor.read_u16::<LittleEndian>()? as u64;
    let comment_len = cursor.read_u16::<LittleEndian>()? as u64;
    let _disk_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut header_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut raw_name = vec![0u8; name_len];
    cursor.read_exact(&mut raw_name)?;
    let name = String::from_utf8_lossy(&raw_name).into_owned();

    // Only the 0x0001 field matters; each 64-bit value is present only when
    // its 32-bit counterpart above is saturated.
    let extra_end = cursor.position() + extra_len;
    while cursor.position() + 4 <= extra_end {
        let tag = cursor.read_u16::<LittleEndian>()?;
        let field_len = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = cursor.position() + field_len;

        if tag == ZIP64_EXTRA_ID {
            if uncompressed_size == u32::MAX as u64 && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == u32::MAX as u64 && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if header_offset == u32::MAX as u64 && cursor.position() + 8 <= field_end {
                header_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }
    cursor.set_position(extra_end + comment_len);

    if cursor.position() > cursor.get_ref().len() as u64 {
        bail!("Header for {} runs past the central directory", name);
    }

    Ok(ZipEntry {
        name,
        compression_method: CompressionMethod::from_u16(method),
        compressed_size,
        uncompressed_size,
        crc32,
        header_offset,
        encrypted: flags & FLAG_ENCRYPTED != 0,
    })
}
