// src/sink/mod.rs

//! Output routing for running processes.
//!
//! - [`surface`] defines the append-only [`RevealSurface`] plus console and
//!   in-memory implementations.
//! - [`bounded`] implements [`BoundedSink`], which batches output onto a
//!   surface and spills to a temp file once the output grows too large.

pub mod bounded;
pub mod surface;

pub use bounded::{BoundedSink, SinkMode, SinkOptions, MAX_OUTPUT_VIEW_SIZE};
pub use surface::{ConsoleSurface, MemorySurface, RevealSurface};
