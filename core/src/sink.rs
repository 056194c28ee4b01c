//! Destinations for exported workbooks

use crate::error::{MigcheckError, Result};
use async_trait::async_trait;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[async_trait]
pub trait ArtifactSink: Send {
    /// Store one artifact under `name`
    async fn write_artifact(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Complete the run. Not called when the batch was cancelled.
    async fn finish(&mut self) -> Result<()>;

    /// Where artifacts end up, for display
    fn location(&self) -> String;
}

/// Writes each artifact to its own file as soon as it is produced
pub struct DirectorySink {
    base_path: PathBuf,
}

impl DirectorySink {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn write_artifact(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(name);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = std::fs::File::create(&full_path)?;
        file.write_all(data)?;
        file.flush()?;

        log::debug!("Wrote {} ({} bytes)", full_path.display(), data.len());
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        self.base_path.to_string_lossy().to_string()
    }
}

/// Collects artifacts into one zip archive that is written only on `finish`
pub struct ArchiveSink {
    path: PathBuf,
    writer: Option<ZipWriter<Cursor<Vec<u8>>>>,
    entries: usize,
}

impl ArchiveSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Some(ZipWriter::new(Cursor::new(Vec::new()))),
            entries: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    fn writer(&mut self) -> Result<&mut ZipWriter<Cursor<Vec<u8>>>> {
        self.writer
            .as_mut()
            .ok_or_else(|| MigcheckError::archive("archive already finished"))
    }
}

#[async_trait]
impl ArtifactSink for ArchiveSink {
    async fn write_artifact(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
        let writer = self.writer()?;
        writer.start_file(name, options)?;
        writer.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| MigcheckError::archive("archive already finished"))?;
        let bytes = writer.finish()?.into_inner();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, &bytes).await?;

        log::info!(
            "Wrote archive {} with {} entries",
            self.path.display(),
            self.entries
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_directory_sink_writes_immediately() {
        let dir = TempDir::new().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("out"));

        sink.write_artifact("1) a-T(Source).xlsx", b"abc").await.unwrap();
        let written = std::fs::read(dir.path().join("out").join("1) a-T(Source).xlsx")).unwrap();
        assert_eq!(written, b"abc");
    }

    #[tokio::test]
    async fn test_archive_sink_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.zip");
        let mut sink = ArchiveSink::new(&path);

        sink.write_artifact("first.xlsx", b"one").await.unwrap();
        sink.write_artifact("second.xlsx", b"two").await.unwrap();
        assert!(!path.exists());

        sink.finish().await.unwrap();
        assert_eq!(sink.entries(), 2);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut contents = String::new();
        archive.by_name("second.xlsx").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "two");

        assert!(sink.write_artifact("late.xlsx", b"x").await.is_err());
    }
}
