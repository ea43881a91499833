#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use buildrun::config::{ConfigFile, ConfigSection, LanguageConfig, RawConfigFile};
use buildrun::errors::BuildRunError;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                language: BTreeMap::new(),
            },
        }
    }

    pub fn with_language(mut self, name: &str, lang: LanguageConfig) -> Self {
        self.config.language.insert(name.to_string(), lang);
        self
    }

    pub fn flush_period_ms(mut self, ms: u64) -> Self {
        self.config.config.output_flush_period_ms = ms;
        self
    }

    pub fn max_output_view_size(mut self, bytes: usize) -> Self {
        self.config.config.max_output_view_size = bytes;
        self
    }

    pub fn progress_interval_ms(mut self, ms: u64) -> Self {
        self.config.config.progress_interval_ms = ms;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.config.temp_dir = Some(dir.into());
        self
    }

    pub fn try_build(self) -> Result<ConfigFile, BuildRunError> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `LanguageConfig`.
pub struct LanguageConfigBuilder {
    lang: LanguageConfig,
}

impl LanguageConfigBuilder {
    pub fn new() -> Self {
        Self {
            lang: LanguageConfig::default(),
        }
    }

    /// A language that only runs `cmd`.
    pub fn run(cmd: &str) -> Self {
        Self::new().with_run(cmd)
    }

    pub fn ext(mut self, ext: &str) -> Self {
        self.lang.ext = Some(ext.to_string());
        self
    }

    pub fn with_run(mut self, cmd: &str) -> Self {
        self.lang.run = Some(cmd.to_string());
        self
    }

    pub fn build_cmd(mut self, cmd: &str) -> Self {
        self.lang.build = Some(cmd.to_string());
        self
    }

    pub fn debug(mut self, cmd: &str) -> Self {
        self.lang.debug = Some(cmd.to_string());
        self
    }

    pub fn debug_build(mut self, cmd: &str) -> Self {
        self.lang.debug_build = Some(cmd.to_string());
        self
    }

    pub fn input_markers(mut self, begin: &str, end: &str) -> Self {
        self.lang.input_begin = Some(begin.to_string());
        self.lang.input_end = Some(end.to_string());
        self
    }

    pub fn output_markers(mut self, begin: &str, end: &str) -> Self {
        self.lang.output_begin = Some(begin.to_string());
        self.lang.output_end = Some(end.to_string());
        self
    }

    pub fn build(self) -> LanguageConfig {
        self.lang
    }
}

impl Default for LanguageConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
