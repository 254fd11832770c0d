//! Output-directory lifecycle.

use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

/// Destination lifecycle for the output bundle.
///
/// `replace` must leave a fresh empty directory at `path`, destroying
/// whatever was there before. This is the only destructive step in the
/// pipeline; keeping it behind a trait lets tests observe or refuse it.
pub trait OutputSink {
    /// Replace whatever exists at `path` with a fresh empty directory.
    fn replace(&self, path: &Path) -> io::Result<()>;
}

/// Filesystem sink with delete-then-create semantics.
///
/// An existing directory at the target path is removed recursively,
/// including all prior artifacts. There is no merge and no append.
#[derive(Debug, Default)]
pub struct ReplaceDirSink;

impl OutputSink for ReplaceDirSink {
    fn replace(&self, path: &Path) -> io::Result<()> {
        if path.exists() {
            warn!(
                "Output directory {} already exists. Removing it...",
                path.display()
            );
            fs::remove_dir_all(path)?;
        }
        fs::create_dir_all(path)?;
        info!("Created output directory: {}", path.display());
        Ok(())
    }
}
