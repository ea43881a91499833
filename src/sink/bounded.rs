// src/sink/bounded.rs

//! Bounded, batching output sink.
//!
//! Output is batched in memory and flushed to a [`RevealSurface`] on a timer.
//! Once the total amount of output would exceed the configured capacity, the
//! sink switches (exactly once) to a backing file:
//!
//! - everything flushed so far is copied to the file in arrival order,
//! - the in-memory copy is dropped,
//! - the surface gets a single pointer line to the file,
//! - the flush timer is stopped and later appends go straight to the file.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::errors::{BuildRunError, Result};
use crate::fs::{TempFileProvider, file_uri};
use crate::sink::surface::RevealSurface;
use crate::text::{Utf8Decoder, escape_nul};

/// Default capacity of the in-memory view, in bytes.
pub const MAX_OUTPUT_VIEW_SIZE: usize = 1_000_000;

/// Default flush period.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOptions {
    pub flush_period: Duration,
    /// Bytes kept in memory / on the surface before switching to a file.
    pub capacity: usize,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            flush_period: DEFAULT_FLUSH_PERIOD,
            capacity: MAX_OUTPUT_VIEW_SIZE,
        }
    }
}

/// Where flushed output currently goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    InMemory,
    FileBacked,
}

enum Storage {
    InMemory,
    FileBacked {
        path: PathBuf,
        uri: String,
        /// `None` once the sink is closed.
        file: Option<BufWriter<Box<dyn Write + Send>>>,
    },
}

pub struct BoundedSink<S: RevealSurface> {
    surface: S,
    files: Arc<dyn TempFileProvider>,
    options: SinkOptions,
    pending: Vec<Vec<u8>>,
    total_bytes: usize,
    retained: Vec<Vec<u8>>,
    storage: Storage,
    timer: Option<Interval>,
    decoder: Utf8Decoder,
    warned_nul: bool,
    closed: bool,
}

impl<S: RevealSurface> std::fmt::Debug for BoundedSink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedSink")
            .field("options", &self.options)
            .field("mode", &self.mode())
            .field("total_bytes", &self.total_bytes)
            .field("pending_chunks", &self.pending.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<S: RevealSurface> BoundedSink<S> {
    pub fn new(options: SinkOptions, surface: S, files: Arc<dyn TempFileProvider>) -> Self {
        Self {
            surface,
            files,
            options,
            pending: Vec::new(),
            total_bytes: 0,
            retained: Vec::new(),
            storage: Storage::InMemory,
            timer: None,
            decoder: Utf8Decoder::new(),
            warned_nul: false,
            closed: false,
        }
    }

    /// Arm the periodic flush timer. Must be called inside a Tokio runtime.
    pub fn start(&mut self) {
        if self.closed || self.mode() == SinkMode::FileBacked {
            return;
        }
        let period = self.options.flush_period;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    /// Resolves when the next timed flush is due; never resolves while the
    /// timer is stopped. Cancel-safe, for use in `select!`.
    pub async fn next_flush(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        if self.closed {
            return Err(BuildRunError::SinkClosed);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.total_bytes += chunk.len();

        if let Storage::FileBacked { file, .. } = &mut self.storage {
            // The file's own buffering replaces batching.
            let file = file.as_mut().ok_or(BuildRunError::SinkClosed)?;
            file.write_all(chunk)?;
            return Ok(());
        }

        self.pending.push(chunk.to_vec());
        if self.total_bytes > self.options.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Move pending chunks to the surface or the backing file.
    pub fn flush(&mut self) -> Result<()> {
        if self.closed || self.pending.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.pending);
        if !self.warned_nul && batch.iter().any(|chunk| chunk.contains(&0)) {
            self.warned_nul = true;
            warn!("output contained null characters; showing them as \\0");
        }

        if let Storage::FileBacked { file, .. } = &mut self.storage {
            let file = file.as_mut().ok_or(BuildRunError::SinkClosed)?;
            for chunk in &batch {
                file.write_all(chunk)?;
            }
            return Ok(());
        }

        if self.total_bytes > self.options.capacity {
            return self.overflow(batch);
        }

        let joined = batch.concat();
        let text = escape_nul(&self.decoder.decode(&joined));
        if !text.is_empty() {
            self.surface.append(&text);
        }
        self.retained.extend(batch);
        Ok(())
    }

    fn overflow(&mut self, batch: Vec<Vec<u8>>) -> Result<()> {
        let (path, file) = match self.files.create("txt") {
            Ok(opened) => opened,
            Err(err) => {
                // Keep the batch; the next flush tries again.
                self.pending = batch;
                return Err(err.into());
            }
        };

        // Retained output is only dropped once the file holds all of it.
        let mut file = BufWriter::new(file);
        let copied = self
            .retained
            .iter()
            .chain(batch.iter())
            .try_for_each(|chunk| file.write_all(chunk))
            .and_then(|()| file.flush());
        if let Err(err) = copied {
            warn!(path = %path.display(), error = %err, "copying output to overflow file failed");
            self.pending = batch;
            return Err(err.into());
        }
        self.retained.clear();

        let uri = file_uri(&path);
        info!(
            path = %path.display(),
            bytes = self.total_bytes,
            capacity = self.options.capacity,
            "output exceeded view capacity; continuing in file"
        );
        self.surface.append(&format!("\nFULL OUTPUT IN {uri}"));
        self.storage = Storage::FileBacked {
            path,
            uri,
            file: Some(file),
        };
        self.timer = None;
        Ok(())
    }

    /// Final flush, then stop the timer and release the backing file.
    ///
    /// Idempotent; only the first call does anything.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.timer = None;
        let flushed = self.flush();

        let released = match &mut self.storage {
            Storage::InMemory => {
                let tail = self.decoder.finish();
                if !tail.is_empty() {
                    self.surface.append(&tail);
                }
                Ok(())
            }
            Storage::FileBacked { file, path, .. } => match file.take() {
                Some(mut f) => {
                    debug!(path = %path.display(), "closing overflow file");
                    f.flush().map_err(BuildRunError::from)
                }
                None => Ok(()),
            },
        };

        self.closed = true;
        flushed.and(released)
    }

    /// Everything kept in memory (NULs escaped) plus, after an overflow, a
    /// note naming the backing file.
    pub fn overflow_summary(&self) -> String {
        let joined = self.retained.concat();
        let mut out = escape_nul(&String::from_utf8_lossy(&joined));
        if let Storage::FileBacked { uri, .. } = &self.storage {
            out.push_str("...TRUNCATED\nFull output in ");
            out.push_str(uri);
        }
        out
    }

    pub fn mode(&self) -> SinkMode {
        match self.storage {
            Storage::InMemory => SinkMode::InMemory,
            Storage::FileBacked { .. } => SinkMode::FileBacked,
        }
    }

    pub fn overflow_path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::InMemory => None,
            Storage::FileBacked { path, .. } => Some(path),
        }
    }

    pub fn total_bytes_seen(&self) -> usize {
        self.total_bytes
    }

    pub fn had_illegal_chars(&self) -> bool {
        self.warned_nul
    }

    pub fn timer_active(&self) -> bool {
        self.timer.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MemoryTempFiles;
    use crate::sink::surface::MemorySurface;

    fn sink(capacity: usize, files: &MemoryTempFiles) -> BoundedSink<MemorySurface> {
        let options = SinkOptions {
            flush_period: Duration::from_millis(10),
            capacity,
        };
        BoundedSink::new(options, MemorySurface::new(), Arc::new(files.clone()))
    }

    #[test]
    fn below_capacity_is_a_pass_through() {
        let files = MemoryTempFiles::new();
        let mut s = sink(100, &files);
        s.append(b"hello ").unwrap();
        s.append(b"world").unwrap();
        assert_eq!(s.surface_mut().text(), "");
        s.flush().unwrap();
        assert_eq!(s.surface_mut().text(), "hello world");
        s.close().unwrap();

        assert_eq!(s.mode(), SinkMode::InMemory);
        assert_eq!(s.overflow_summary(), "hello world");
        assert_eq!(files.file_count(), 0);
    }

    #[test]
    fn exceeding_capacity_switches_to_file_once() {
        let files = MemoryTempFiles::new();
        let mut s = sink(100, &files);

        s.append(&[b'a'; 60]).unwrap();
        s.flush().unwrap();
        assert_eq!(s.mode(), SinkMode::InMemory);

        // Crossing the cap forces a flush without waiting for the timer.
        s.append(&[b'b'; 60]).unwrap();
        assert_eq!(s.mode(), SinkMode::FileBacked);

        s.append(b"tail").unwrap();
        s.flush().unwrap();
        s.close().unwrap();

        let text = s.surface_mut().text().to_string();
        assert_eq!(text.matches("FULL OUTPUT IN").count(), 1);
        assert!(text.starts_with(&"a".repeat(60)));
        assert!(!text.contains('b'));

        let path = s.overflow_path().unwrap().to_path_buf();
        let mut expected = vec![b'a'; 60];
        expected.extend_from_slice(&[b'b'; 60]);
        expected.extend_from_slice(b"tail");
        assert_eq!(files.contents(&path).unwrap(), expected);
        assert_eq!(s.total_bytes_seen(), 124);
    }

    #[test]
    fn summary_after_overflow_names_file() {
        let files = MemoryTempFiles::new();
        let mut s = sink(4, &files);
        s.append(b"12345").unwrap();
        s.close().unwrap();
        let summary = s.overflow_summary();
        assert!(summary.starts_with("...TRUNCATED\nFull output in file:///mem/"));
    }

    #[test]
    fn nul_bytes_are_escaped_and_warned_once() {
        let files = MemoryTempFiles::new();
        let mut s = sink(100, &files);
        s.append(b"a\0b").unwrap();
        s.flush().unwrap();
        assert!(s.had_illegal_chars());
        s.append(b"\0").unwrap();
        s.close().unwrap();
        assert_eq!(s.surface_mut().text(), "a\\0b\\0");
        assert_eq!(s.overflow_summary(), "a\\0b\\0");
    }

    #[test]
    fn split_characters_reach_the_surface_whole() {
        let files = MemoryTempFiles::new();
        let mut s = sink(100, &files);
        let bytes = "ąč".as_bytes();
        s.append(&bytes[..1]).unwrap();
        s.flush().unwrap();
        s.append(&bytes[1..]).unwrap();
        s.flush().unwrap();
        assert_eq!(s.surface_mut().text(), "ąč");
        assert_eq!(s.surface_mut().append_count(), 1);
    }

    #[test]
    fn append_after_close_is_rejected_and_close_is_idempotent() {
        let files = MemoryTempFiles::new();
        let mut s = sink(100, &files);
        s.append(b"x").unwrap();
        s.close().unwrap();
        s.close().unwrap();
        assert!(s.is_closed());
        assert!(matches!(s.append(b"y"), Err(BuildRunError::SinkClosed)));
        assert_eq!(s.surface_mut().text(), "x");
    }

    #[test]
    fn failed_overflow_copy_keeps_every_byte() {
        let files = MemoryTempFiles::new();
        let mut s = sink(10_000, &files);
        s.append(&[b'a'; 9_000]).unwrap();
        s.flush().unwrap();

        files.break_next_writers(1);
        assert!(s.append(&[b'b'; 2_000]).is_err());
        assert_eq!(s.mode(), SinkMode::InMemory);
        assert_eq!(s.overflow_summary(), "a".repeat(9_000));

        // The next flush retries with a working file.
        s.append(b"c").unwrap();
        assert_eq!(s.mode(), SinkMode::FileBacked);
        s.close().unwrap();

        let path = s.overflow_path().unwrap().to_path_buf();
        let mut expected = vec![b'a'; 9_000];
        expected.extend_from_slice(&[b'b'; 2_000]);
        expected.push(b'c');
        assert_eq!(files.contents(&path).unwrap(), expected);
        assert_eq!(files.file_count(), 2);
        assert_eq!(s.surface_mut().text().matches("FULL OUTPUT IN").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flushes_periodically_and_stops_on_overflow() {
        let files = MemoryTempFiles::new();
        let mut s = sink(10, &files);
        s.start();
        assert!(s.timer_active());

        s.append(b"abc").unwrap();
        s.next_flush().await;
        s.flush().unwrap();
        assert_eq!(s.surface_mut().text(), "abc");

        s.append(b"0123456789").unwrap();
        assert_eq!(s.mode(), SinkMode::FileBacked);
        assert!(!s.timer_active());

        s.close().unwrap();
        assert!(!s.timer_active());
    }
}
