//! Archive-backed content sources.
//!
//! An [`ArchiveReader`] answers lookups for one zip file. An [`ArchiveSet`]
//! keeps several sources in search order and returns the first hit, so a site
//! archive can be layered over a bundle of shared scripts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt};
use crate::zip::{ZipEntry, ZipExtractor};

/// A lookup capability: logical path in, file bytes out.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Returns `Ok(None)` when the path is simply not present.
    async fn get(&self, path: &str) -> Result<Option<Bytes>>;

    /// Human readable name used in logs.
    fn label(&self) -> &str;
}

/// How to open one archive: its location and the directory prefix its
/// logical paths live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
    pub path: PathBuf,
    pub prefix: String,
}

impl ArchiveSpec {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
        }
    }
}

/// One zip archive opened read-only.
///
/// The name index is built once when the archive is opened and never changes.
pub struct ArchiveReader {
    label: String,
    prefix: String,
    extractor: ZipExtractor<dyn ReadAt>,
    entries: HashMap<String, ZipEntry>,
}

impl ArchiveReader {
    /// Open the zip file at `path`; every lookup is resolved under `prefix`.
    pub async fn open(path: &Path, prefix: &str) -> Result<Self> {
        let open_error = |reason| Error::ArchiveOpen {
            path: path.to_path_buf(),
            reason,
        };

        let reader = LocalFileReader::new(path).map_err(open_error)?;
        Self::from_reader(path.display().to_string(), Arc::new(reader), prefix)
            .await
            .map_err(|err| match err {
                Error::Internal(reason) => open_error(reason),
                other => other,
            })
    }

    /// Build a reader over any random-access source, e.g. an in-memory archive.
    pub async fn from_reader(
        label: impl Into<String>,
        reader: Arc<dyn ReadAt>,
        prefix: &str,
    ) -> Result<Self> {
        let label = label.into();
        let extractor = ZipExtractor::new(reader);
        let listed = extractor
            .list_entries()
            .await
            .with_context(|| format!("{label} is not a readable zip archive"))?;

        let entries: HashMap<_, _> = listed
            .into_iter()
            .filter(|entry| !entry.is_directory())
            .map(|entry| (entry.name.clone(), entry))
            .collect();

        info!(archive = %label, entries = entries.len(), prefix, "opened archive");

        Ok(Self {
            label,
            prefix: prefix.to_string(),
            extractor,
            entries,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `path` (without the prefix) names a file in this archive.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&self.full_name(path))
    }

    /// Full in-archive names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn full_name(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }
}

#[async_trait]
impl ContentSource for ArchiveReader {
    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        let Some(entry) = self.entries.get(&self.full_name(path)) else {
            return Ok(None);
        };

        let data = self
            .extractor
            .read_entry(entry)
            .await
            .with_context(|| format!("failed to read {} from {}", entry.name, self.label))?;
        Ok(Some(data))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Ordered content sources searched first-hit-wins.
///
/// All archive reads go through a single lock: at most one task reads from
/// any archive at a time.
pub struct ArchiveSet {
    sources: Vec<Box<dyn ContentSource>>,
    io_lock: Mutex<()>,
    fetches: AtomicU64,
}

impl ArchiveSet {
    pub fn new(sources: Vec<Box<dyn ContentSource>>) -> Self {
        Self {
            sources,
            io_lock: Mutex::new(()),
            fetches: AtomicU64::new(0),
        }
    }

    /// Open every archive in order; the first failure aborts.
    pub async fn open(specs: &[ArchiveSpec]) -> Result<Self> {
        let mut sources: Vec<Box<dyn ContentSource>> = Vec::with_capacity(specs.len());
        for spec in specs {
            sources.push(Box::new(ArchiveReader::open(&spec.path, &spec.prefix).await?));
        }
        Ok(Self::new(sources))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of archive scans performed so far (cache misses that reached
    /// the archives).
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Search the sources in order and return the first hit.
    pub async fn fetch(&self, path: &str) -> Result<Option<Bytes>> {
        let _guard = self.io_lock.lock().await;
        self.fetches.fetch_add(1, Ordering::Relaxed);
        first_hit(&self.sources, path).await
    }
}

/// First source that has `path`, in order. Errors stop the search.
pub async fn first_hit(sources: &[Box<dyn ContentSource>], path: &str) -> Result<Option<Bytes>> {
    for source in sources {
        if let Some(data) = source.get(path).await? {
            debug!(path, source = source.label(), "found in archive");
            return Ok(Some(data));
        }
    }
    Ok(None)
}
