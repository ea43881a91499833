// src/fs/mock.rs

use super::TempFileProvider;
use anyhow::Result;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type FileTable = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

/// In-memory temp files. Clones share the same table, so a test can keep one
/// handle and inspect what a sink wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTempFiles {
    files: FileTable,
    next_id: Arc<Mutex<u64>>,
    broken_writers: Arc<AtomicUsize>,
}

impl MemoryTempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` files are created with writers that fail every write.
    pub fn break_next_writers(&self, count: usize) {
        self.broken_writers.store(count, Ordering::SeqCst);
    }

    /// Contents of the file at `path`, if it was ever created.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files.get(path).cloned()
    }

    /// Number of files created so far.
    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn take_broken(&self) -> bool {
        self.broken_writers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl TempFileProvider for MemoryTempFiles {
    fn create(&self, ext: &str) -> Result<(PathBuf, Box<dyn Write + Send>)> {
        let path = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            PathBuf::from(format!("/mem/{:04}.{}", *next, ext))
        };
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), Vec::new());

        let writer = MemoryFileWriter {
            path: path.clone(),
            files: Arc::clone(&self.files),
            broken: self.take_broken(),
        };
        Ok((path, Box::new(writer)))
    }
}

struct MemoryFileWriter {
    path: PathBuf,
    files: FileTable,
    broken: bool,
}

impl Write for MemoryFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.broken {
            return Err(std::io::Error::other(format!("write failed: {:?}", self.path)));
        }
        let mut files = self.files.lock().unwrap();
        match files.get_mut(&self.path) {
            Some(content) => {
                content.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file removed: {:?}", self.path),
            )),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.broken {
            return Err(std::io::Error::other(format!("flush failed: {:?}", self.path)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writers_append_to_shared_table() {
        let fs = MemoryTempFiles::new();
        let (path, mut w) = fs.create("txt").unwrap();
        w.write_all(b"abc").unwrap();
        w.write_all(b"def").unwrap();
        assert_eq!(fs.contents(&path).unwrap(), b"abcdef");

        let (other, _) = fs.create("txt").unwrap();
        assert_ne!(path, other);
        assert_eq!(fs.file_count(), 2);
    }

    #[test]
    fn broken_writers_fail_then_recover() {
        let fs = MemoryTempFiles::new();
        fs.break_next_writers(1);
        let (_, mut broken) = fs.create("txt").unwrap();
        assert!(broken.write_all(b"x").is_err());

        let (path, mut ok) = fs.create("txt").unwrap();
        ok.write_all(b"y").unwrap();
        assert_eq!(fs.contents(&path).unwrap(), b"y");
    }
}
