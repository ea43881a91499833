// src/sink/surface.rs

//! Append-only text targets for program output.

use std::io::Write;

/// Append-only text sink representing the visible log.
///
/// Whoever routes output owns the surface and lends it to each run; there is
/// no global "active" surface.
pub trait RevealSurface: Send {
    fn append(&mut self, text: &str);

    fn append_line(&mut self, text: &str) {
        self.append(text);
        self.append("\n");
    }
}

impl<T: RevealSurface + ?Sized> RevealSurface for &mut T {
    fn append(&mut self, text: &str) {
        (**self).append(text);
    }
}

impl<T: RevealSurface + ?Sized> RevealSurface for Box<T> {
    fn append(&mut self, text: &str) {
        (**self).append(text);
    }
}

/// Writes straight to the process' stdout.
#[derive(Debug, Default)]
pub struct ConsoleSurface;

impl RevealSurface for ConsoleSurface {
    fn append(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout (e.g. `| head`) must not abort the run.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Collects everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySurface {
    text: String,
    appends: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of `append` calls received.
    pub fn append_count(&self) -> usize {
        self.appends
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.appends = 0;
    }
}

impl RevealSurface for MemorySurface {
    fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.appends += 1;
    }
}
