// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{BuildRunError, Result};
use crate::exec::RunSettings;
use crate::fs::TempDir;
use crate::input::BlockMarkers;
use crate::sink::SinkOptions;
use crate::types::RunMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// output_flush_period_ms = 500
/// max_output_view_size = 1000000
///
/// [language.cpp]
/// build = "g++ -O2 -o main main.cpp"
/// run = "./main"
/// input_begin = "/*input"
/// input_end = "*/"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Global tuning from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Languages from `[language.<name>]`.
    #[serde(default)]
    pub language: BTreeMap<String, LanguageConfig>,
}

/// Validated configuration. Build one with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    language: BTreeMap<String, LanguageConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        language: BTreeMap<String, LanguageConfig>,
    ) -> Self {
        Self { config, language }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn languages(&self) -> &BTreeMap<String, LanguageConfig> {
        &self.language
    }

    pub fn language(&self, name: &str) -> Result<&LanguageConfig> {
        self.language
            .get(name)
            .ok_or_else(|| BuildRunError::UnknownLanguage(name.to_string()))
    }

    /// Pick the language for `path`: the explicit name if given, otherwise
    /// the first language whose extension matches the file's.
    pub fn language_for(&self, path: &Path, name: Option<&str>) -> Result<(&str, &LanguageConfig)> {
        if let Some(name) = name {
            let (key, lang) = self
                .language
                .get_key_value(name)
                .ok_or_else(|| BuildRunError::UnknownLanguage(name.to_string()))?;
            return Ok((key.as_str(), lang));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| BuildRunError::UnknownLanguage(path.display().to_string()))?;

        self.language
            .iter()
            .find(|(key, lang)| lang.extension(key) == ext)
            .map(|(key, lang)| (key.as_str(), lang))
            .ok_or_else(|| BuildRunError::UnknownLanguage(format!(".{ext}")))
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            sink: self.config.sink_options(),
            progress_interval: self.config.progress_interval(),
            files: Arc::new(self.config.temp_dir()),
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How often batched output is flushed to the console.
    #[serde(default = "default_output_flush_period_ms")]
    pub output_flush_period_ms: u64,

    /// Bytes of output shown before switching to a file.
    #[serde(default = "default_max_output_view_size")]
    pub max_output_view_size: usize,

    /// How often progress is reported and the process is probed.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Directory for overflow files; defaults to `<system tmp>/buildrun`.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

fn default_output_flush_period_ms() -> u64 {
    500
}

fn default_max_output_view_size() -> usize {
    crate::sink::MAX_OUTPUT_VIEW_SIZE
}

fn default_progress_interval_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            output_flush_period_ms: default_output_flush_period_ms(),
            max_output_view_size: default_max_output_view_size(),
            progress_interval_ms: default_progress_interval_ms(),
            temp_dir: None,
        }
    }
}

impl ConfigSection {
    pub fn sink_options(&self) -> SinkOptions {
        SinkOptions {
            flush_period: Duration::from_millis(self.output_flush_period_ms),
            capacity: self.max_output_view_size,
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn temp_dir(&self) -> TempDir {
        match &self.temp_dir {
            Some(dir) => TempDir::new(dir.clone()),
            None => TempDir::default(),
        }
    }
}

/// `[language.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguageConfig {
    /// File extension (without the dot) selecting this language. Defaults to
    /// the language name.
    #[serde(default)]
    pub ext: Option<String>,

    /// Builds the program; run once before the input blocks. Optional.
    #[serde(default)]
    pub build: Option<String>,

    /// Runs the program; called once per input block.
    #[serde(default)]
    pub run: Option<String>,

    /// Like `build`, used in debug mode. Falls back to `build`.
    #[serde(default)]
    pub debug_build: Option<String>,

    /// Like `run`, used in debug mode.
    #[serde(default)]
    pub debug: Option<String>,

    #[serde(default)]
    pub input_begin: Option<String>,
    #[serde(default)]
    pub input_end: Option<String>,
    #[serde(default)]
    pub output_begin: Option<String>,
    #[serde(default)]
    pub output_end: Option<String>,
}

impl LanguageConfig {
    pub fn extension<'a>(&'a self, name: &'a str) -> &'a str {
        self.ext
            .as_deref()
            .map(|e| e.trim_start_matches('.'))
            .unwrap_or(name)
    }

    /// Block markers, if this language declares input blocks.
    pub fn markers(&self) -> Option<BlockMarkers> {
        let (begin, end) = self.input_begin.as_ref().zip(self.input_end.as_ref())?;
        Some(BlockMarkers {
            input_begin: begin.clone(),
            input_end: end.clone(),
            output: self
                .output_begin
                .clone()
                .zip(self.output_end.clone()),
        })
    }

    /// Build command for `mode`, if any.
    pub fn build_command(&self, mode: RunMode) -> Option<&str> {
        match mode {
            RunMode::Debug => self.debug_build.as_deref().or(self.build.as_deref()),
            RunMode::Build | RunMode::Run => self.build.as_deref(),
        }
    }

    /// Run command for `mode`. `None` in build mode.
    pub fn run_command(&self, mode: RunMode) -> Option<&str> {
        match mode {
            RunMode::Build => None,
            RunMode::Run => self.run.as_deref(),
            RunMode::Debug => self.debug.as_deref(),
        }
    }
}
