use super::ReadAt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Read-only archive file with positional reads.
///
/// Reads never move a shared cursor, so one handle can serve every request.
/// Each read runs on the blocking pool and goes through an owned buffer.
pub struct LocalFileReader {
    file: Arc<File>,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            anyhow::bail!("{} is a directory", path.display());
        }
        Ok(Self {
            file: Arc::new(file),
            size: metadata.len(),
        })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let file = Arc::clone(&self.file);
        let len = buf.len();
        let (chunk, n) = tokio::task::spawn_blocking(move || {
            let mut chunk = vec![0u8; len];
            let n = read_file_at(&file, &mut chunk, offset)?;
            Ok::<_, std::io::Error>((chunk, n))
        })
        .await
        .context("blocking read task failed")??;

        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

fn read_file_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_at(buf, offset)
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        file.seek_read(buf, offset)
    }
}
