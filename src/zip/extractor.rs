use bytes::Bytes;
use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipEntry};

/// Reads entry contents out of an archive
pub struct ZipExtractor<R: ReadAt + ?Sized> {
    parser: ZipParser<R>,
}

impl<R: ReadAt + ?Sized> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all entries in the archive
    pub async fn list_entries(&self) -> Result<Vec<ZipEntry>> {
        self.parser.read_directory().await
    }

    /// Read and decompress one entry, checking its size and CRC-32.
    pub async fn read_entry(&self, entry: &ZipEntry) -> Result<Bytes> {
        if entry.encrypted {
            bail!("{} is encrypted", entry.name);
        }

        let data_offset = self.parser.data_offset(entry).await?;
        let archive_size = self.parser.reader().size();
        match data_offset.checked_add(entry.compressed_size) {
            Some(end) if end <= archive_size => {}
            _ => bail!(
                "{} claims {} bytes at offset {}, past the end of the {} byte archive",
                entry.name,
                entry.compressed_size,
                data_offset,
                archive_size
            ),
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .await
            .with_context(|| format!("failed to read data of {}", entry.name))?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => inflate(&raw, entry)?,
            CompressionMethod::Unknown(method) => bail!(
                "Unsupported compression method {} for {} (only STORED and DEFLATE are supported)",
                method,
                entry.name
            ),
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "{} decompressed to {} bytes, expected {}",
                entry.name,
                data.len(),
                entry.uncompressed_size
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!(
                "CRC mismatch for {}: stored {:08x}, computed {:08x}",
                entry.name,
                entry.crc32,
                crc.sum()
            );
        }

        Ok(Bytes::from(data))
    }
}

fn inflate(raw: &[u8], entry: &ZipEntry) -> Result<Vec<u8>> {
    // One extra byte lets an oversized stream show up as a length mismatch.
    let limit = entry.uncompressed_size.saturating_add(1);
    let mut data = Vec::with_capacity(entry.uncompressed_size.min(16 << 20) as usize);
    DeflateDecoder::new(raw)
        .take(limit)
        .read_to_end(&mut data)
        .with_context(|| format!("failed to inflate {}", entry.name))?;
    Ok(data)
}
