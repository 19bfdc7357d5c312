//! Shared fixtures: a minimal zip writer and a server started on an
//! ephemeral port.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use zipdoc::{
    ArchiveReader, ArchiveSet, ContentCache, ContentSource, DocService, Server, ServerConfig,
};

struct Pending {
    name: String,
    method: u16,
    crc32: u32,
    uncompressed_size: u32,
    data: Vec<u8>,
    offset: u32,
    /// Size the central directory reports instead of the real one.
    claimed_size: Option<u64>,
}

/// Builds a zip archive in memory.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Pending>,
    body: Vec<u8>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.push(name, 0, data, data.to_vec());
        self
    }

    pub fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.push(name, 8, data, compressed);
        self
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.push(name, 0, b"", Vec::new());
        self
    }

    /// A stored entry whose central directory record claims `claimed` bytes
    /// through a ZIP64 extra field.
    pub fn oversized(mut self, name: &str, data: &[u8], claimed: u64) -> Self {
        self.push(name, 0, data, data.to_vec());
        if let Some(entry) = self.entries.last_mut() {
            entry.claimed_size = Some(claimed);
        }
        self
    }

    /// Write every central directory record with ZIP64 extra fields and end
    /// the archive with a saturated EOCD behind a ZIP64 record and locator.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    fn push(&mut self, name: &str, method: u16, plain: &[u8], data: Vec<u8>) {
        let mut crc = Crc::new();
        crc.update(plain);
        let entry = Pending {
            name: name.to_string(),
            method,
            crc32: crc.sum(),
            uncompressed_size: plain.len() as u32,
            data,
            offset: self.body.len() as u32,
            claimed_size: None,
        };

        let out = &mut self.body;
        out.extend_from_slice(b"PK\x03\x04");
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(entry.method).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0x21).unwrap();
        out.write_u32::<LittleEndian>(entry.crc32).unwrap();
        out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(entry.uncompressed_size).unwrap();
        out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&entry.data);

        self.entries.push(entry);
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = self.body;
        let cd_offset = out.len() as u32;

        for entry in &self.entries {
            let wide = self.zip64 || entry.claimed_size.is_some();
            let compressed = entry.claimed_size.unwrap_or(entry.data.len() as u64);
            let uncompressed = entry.claimed_size.unwrap_or(entry.uncompressed_size as u64);

            out.extend_from_slice(b"PK\x01\x02");
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(if wide { 45 } else { 20 }).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0x21).unwrap();
            out.write_u32::<LittleEndian>(entry.crc32).unwrap();
            if wide {
                out.write_u32::<LittleEndian>(u32::MAX).unwrap();
                out.write_u32::<LittleEndian>(u32::MAX).unwrap();
            } else {
                out.write_u32::<LittleEndian>(compressed as u32).unwrap();
                out.write_u32::<LittleEndian>(uncompressed as u32).unwrap();
            }
            out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(if wide { 28 } else { 0 }).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            let offset = if wide { u32::MAX } else { entry.offset };
            out.write_u32::<LittleEndian>(offset).unwrap();
            out.extend_from_slice(entry.name.as_bytes());
            if wide {
                out.write_u16::<LittleEndian>(0x0001).unwrap();
                out.write_u16::<LittleEndian>(24).unwrap();
                out.write_u64::<LittleEndian>(uncompressed).unwrap();
                out.write_u64::<LittleEndian>(compressed).unwrap();
                out.write_u64::<LittleEndian>(entry.offset as u64).unwrap();
            }
        }

        let cd_size = out.len() as u32 - cd_offset;
        let count = self.entries.len() as u16;

        if self.zip64 {
            let record_offset = out.len() as u64;
            out.extend_from_slice(b"PK\x06\x06");
            out.write_u64::<LittleEndian>(44).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(count as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_offset as u64).unwrap();

            out.extend_from_slice(b"PK\x06\x07");
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(record_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        let (count, cd_size, cd_offset) = if self.zip64 {
            (u16::MAX, u32::MAX, u32::MAX)
        } else {
            (count, cd_size, cd_offset)
        };
        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);
        out
    }

    pub fn write_to(self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// A running server plus the handle needed to stop it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub service: Arc<DocService>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<zipdoc::Result<()>>,
}

impl TestServer {
    /// Open `archives` (path, prefix) in order and serve them on 127.0.0.1.
    pub async fn start(archives: &[(&Path, &str)], cache_limit: usize) -> Self {
        let mut sources: Vec<Box<dyn ContentSource>> = Vec::new();
        for (path, prefix) in archives {
            sources.push(Box::new(ArchiveReader::open(path, prefix).await.unwrap()));
        }
        let service = DocService::new(ArchiveSet::new(sources), ContentCache::new(cache_limit));
        Self::serve(service).await
    }

    pub async fn serve(service: DocService) -> Self {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(config, Arc::new(service)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let service = Arc::clone(server.service());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(async move {
            rx.await.ok();
        }));

        Self {
            addr,
            service,
            shutdown: Some(tx),
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Signal shutdown and wait for the accept loop to finish draining.
    pub async fn stop(mut self) -> zipdoc::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap()
    }
}
