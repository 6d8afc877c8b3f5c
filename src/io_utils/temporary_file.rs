//! Clean up files via `Drop` action

//! Unlike what the `tempfile` crate offers, can clean paths that we
//! didn't create ourselves, e.g. the copy of an archive placed into
//! an iteration directory for extraction.

//! Relying on `Drop` means that kill by signals without handlers
//! prevents the cleanup; a left-over copy is harmless, though, as the
//! date directory is recreated on the next run.

use std::path::{Path, PathBuf};

use crate::{debug, warn};

#[derive(Debug)]
pub struct TemporaryFile {
    path: PathBuf,
}

impl TemporaryFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl From<PathBuf> for TemporaryFile {
    fn from(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TemporaryFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("deleted temporary file {:?}", self.path),
            Err(e) => match e.kind() {
                std::io::ErrorKind::NotFound => (),
                _ => warn!("error deleting temporary file {:?}: {e:#}", self.path),
            },
        }
    }
}
