use std::{
    collections::HashSet,
    fs::OpenOptions,
    io::Write,
    path::Path,
};

use frostbak::model::ArchiveId;
use frostbak::transport::{TransportError, UploadTransport};

/// Hands out fresh random ids and remembers what it was asked to upload.
#[derive(Default)]
pub struct RecordingTransport {
    pub uploads: Vec<String>,
    pub fail_on: HashSet<String>,
}

impl RecordingTransport {
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: names.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl UploadTransport for RecordingTransport {
    fn upload(&mut self, _: &Path, filename: &str) -> Result<ArchiveId, TransportError> {
        self.uploads.push(filename.to_string());
        if self.fail_on.contains(filename) {
            return Err(TransportError::Rejected(format!("simulated failure for {filename}")));
        }
        Ok(ArchiveId::generate())
    }
}

/// Appends to the file while "uploading" it, as a concurrent writer would.
#[derive(Default)]
pub struct MutatingTransport;

impl UploadTransport for MutatingTransport {
    fn upload(&mut self, directory: &Path, filename: &str) -> Result<ArchiveId, TransportError> {
        let path = directory.join(filename);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| TransportError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(b" appended during upload")
            .map_err(|source| TransportError::Io { path, source })?;
        Ok(ArchiveId::generate())
    }
}
