//! Read-only access to the serialized model.

use crate::error::{ClassifierError, Result};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A model file mapped into memory for the lifetime of the interpreter.
///
/// The mapping is read-only and released when the artifact is dropped.
#[derive(Debug)]
pub struct ModelArtifact {
    path: PathBuf,
    mmap: Mmap,
}

impl ModelArtifact {
    /// Map the model resource at `path`.
    ///
    /// Missing or unreadable files yield `ClassifierError::Io`, empty files
    /// `ClassifierError::InvalidModel`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;

        if metadata.is_dir() {
            return Err(ClassifierError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )));
        }
        if metadata.len() == 0 {
            return Err(ClassifierError::invalid_model(format!(
                "{} is empty",
                path.display()
            )));
        }

        // The file is opened read-only and never written by this process.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        debug!("Mapped model {} ({} bytes)", path.display(), mmap.len());

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
