// src/fs/mod.rs

//! Temporary file allocation for overflowing output.
//!
//! The bounded sink never touches the filesystem directly; it asks a
//! [`TempFileProvider`] for a fresh file and a writer. Production code uses
//! [`TempDir`], tests can use [`mock::MemoryTempFiles`].

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

pub mod mock;

/// Name of the directory created under the system temp dir.
pub const TEMP_DIR_NAME: &str = "buildrun";

/// Abstract source of scratch files.
pub trait TempFileProvider: Send + Sync + Debug {
    /// Create a new, uniquely named file with the given extension and open it
    /// for writing. Never reuses or truncates an existing file.
    fn create(&self, ext: &str) -> Result<(PathBuf, Box<dyn Write + Send>)>;
}

/// Scratch files inside a single directory, `<tmp>/buildrun` by default.
#[derive(Debug, Clone)]
pub struct TempDir {
    root: PathBuf,
}

impl Default for TempDir {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join(TEMP_DIR_NAME))
    }
}

impl TempDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove the directory and everything in it.
    ///
    /// A directory that does not exist counts as already clean.
    pub fn cleanup(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(dir = %self.root.display(), "removed temp directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing temp dir {:?}", self.root)),
        }
    }

    /// Write `text` to a fresh file and return its path.
    pub fn save(&self, text: &str, ext: &str) -> Result<PathBuf> {
        let (path, mut file) = self.create(ext)?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .with_context(|| format!("writing temp file {:?}", path))?;
        Ok(path)
    }

    fn ensure_root(&self) -> Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&self.root)
            .with_context(|| format!("creating temp dir {:?}", self.root))
    }
}

impl TempFileProvider for TempDir {
    fn create(&self, ext: &str) -> Result<(PathBuf, Box<dyn Write + Send>)> {
        self.ensure_root()?;
        let suffix = format!(".{}", ext.trim_start_matches('.'));
        let (file, path) = tempfile::Builder::new()
            .prefix("output-")
            .suffix(&suffix)
            .tempfile_in(&self.root)
            .with_context(|| format!("creating temp file in {:?}", self.root))?
            .keep()
            .context("keeping temp file")?;
        debug!(path = %path.display(), "created temp file");
        Ok((path, Box::new(file)))
    }
}

/// Render a path as a `file://` URI.
pub fn file_uri(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_files_are_distinct_and_kept() {
        let base = tempfile::tempdir().unwrap();
        let dir = TempDir::new(base.path());

        let (a, mut wa) = dir.create("txt").unwrap();
        let (b, mut wb) = dir.create("txt").unwrap();
        assert_ne!(a, b);
        wa.write_all(b"first").unwrap();
        wb.write_all(b"second").unwrap();
        drop((wa, wb));

        assert_eq!(fs::read_to_string(&a).unwrap(), "first");
        assert_eq!(fs::read_to_string(&b).unwrap(), "second");
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("output-"));
    }

    #[test]
    fn file_uri_adds_leading_slash_for_drive_paths() {
        assert_eq!(file_uri(Path::new("/tmp/x.txt")), "file:///tmp/x.txt");
        assert_eq!(file_uri(Path::new("C:\\tmp\\x.txt")), "file:///C:/tmp/x.txt");
    }

    #[test]
    fn temp_dir_allocates_inside_root_and_cleans_up() {
        let base = tempfile::tempdir().unwrap();
        let dir = TempDir::new(base.path().join("scratch"));

        let path = dir.save("hello", "txt").unwrap();
        assert!(path.starts_with(dir.root()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("txt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");

        dir.cleanup().unwrap();
        assert!(!dir.root().exists());
        dir.cleanup().unwrap();
    }
}
