//! # zipdoc
//!
//! Serve a static documentation site straight out of zip archives.
//!
//! A site builder packs generated pages into a zip file; this crate serves
//! that file over HTTP without unpacking it. Several archives can be layered:
//! each request is answered by the first archive containing the path, so a
//! bundle of shared scripts can sit next to the site itself. Files read from
//! the archives are kept in a small in-memory cache that is flushed as a whole
//! once it grows past a size threshold.
//!
//! ## Features
//!
//! - STORED and DEFLATE entries, ZIP64 archives, CRC-checked reads
//! - Per-archive directory prefixes
//! - `/` served as `index.html`, `..` segments refused
//! - Bounded connection count, header read timeout, graceful shutdown
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use zipdoc::{
//!     ArchiveReader, ArchiveSet, ContentCache, ContentSource, DocService, Server, ServerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let site = ArchiveReader::open(Path::new("html.zip"), "").await?;
//!     let sources: Vec<Box<dyn ContentSource>> = vec![Box::new(site)];
//!     let archives = ArchiveSet::new(sources);
//!     let service = Arc::new(DocService::new(archives, ContentCache::default()));
//!
//!     let server = Server::bind(ServerConfig::default(), service).await?;
//!     println!("serving on http://{}", server.local_addr()?);
//!     server.run(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod server;
pub mod zip;

pub use archive::{ArchiveReader, ArchiveSet, ArchiveSpec, ContentSource};
pub use cache::{CacheStats, ContentCache};
pub use cli::Cli;
pub use config::ServerConfig;
pub use error::{Error, Result};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use server::{DocService, Server};
pub use zip::{ZipEntry, ZipExtractor};
