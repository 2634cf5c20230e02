use crate::error::LoadError;
use crate::source::SourceStream;
use async_trait::async_trait;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SourceStream for LocalFileSource {
    async fn open(&self) -> Result<Box<dyn Read + Send>, LoadError> {
        info!("Opening input file {}", self.path.display());
        let file = File::open(&self.path).map_err(|e| LoadError::StreamAcquisition {
            location: self.describe(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(file))
    }

    fn stage(&self) -> &'static str {
        "error: open file"
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
