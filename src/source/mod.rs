pub mod gcs;
pub mod local;

use crate::config::StorageConfig;
use crate::error::LoadError;
use async_trait::async_trait;
use std::io::Read;
use std::path::PathBuf;

/// Where the input file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Gcs { bucket: String, path: String },
    File(PathBuf),
}

/// Supplies the forward-only byte stream the loader decodes.
#[async_trait]
pub trait SourceStream: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Read + Send>, LoadError>;

    /// Static label used when wrapping errors from [`SourceStream::open`].
    fn stage(&self) -> &'static str;

    fn describe(&self) -> String;
}

impl SourceSpec {
    pub fn provider(&self, storage: &StorageConfig) -> Result<Box<dyn SourceStream>, LoadError> {
        let provider: Box<dyn SourceStream> = match self {
            SourceSpec::Gcs { bucket, path } => {
                Box::new(gcs::GcsObjectSource::new(storage, bucket, path)?)
            }
            SourceSpec::File(path) => Box::new(local::LocalFileSource::new(path.clone())),
        };
        Ok(provider)
    }
}

/// Drains `reader` fully; mid-stream failures surface as [`LoadError::StreamRead`].
pub fn read_all(mut reader: Box<dyn Read + Send>) -> Result<Vec<u8>, LoadError> {
    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .map_err(LoadError::StreamRead)?;
    Ok(buffer)
}
