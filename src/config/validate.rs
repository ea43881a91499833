// src/config/validate.rs

use crate::config::model::{ConfigFile, LanguageConfig, RawConfigFile};
use crate::errors::{BuildRunError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildRunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.language))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_languages(cfg)?;
    validate_global_config(cfg)?;
    for (name, lang) in cfg.language.iter() {
        validate_language(name, lang)?;
    }
    Ok(())
}

fn ensure_has_languages(cfg: &RawConfigFile) -> Result<()> {
    if cfg.language.is_empty() {
        return Err(BuildRunError::ConfigError(
            "config must contain at least one [language.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let c = &cfg.config;
    let checks = [
        ("output_flush_period_ms", c.output_flush_period_ms == 0),
        ("max_output_view_size", c.max_output_view_size == 0),
        ("progress_interval_ms", c.progress_interval_ms == 0),
    ];
    for (key, is_zero) in checks {
        if is_zero {
            return Err(BuildRunError::ConfigError(format!(
                "[config].{key} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_language(name: &str, lang: &LanguageConfig) -> Result<()> {
    if lang.build.is_none() && lang.run.is_none() {
        return Err(BuildRunError::ConfigError(format!(
            "language '{name}' needs at least one of `build` or `run`"
        )));
    }

    let paired = |a: &Option<String>, b: &Option<String>, what: &str| {
        if a.is_some() != b.is_some() {
            return Err(BuildRunError::ConfigError(format!(
                "language '{name}': `{what}_begin` and `{what}_end` must be set together"
            )));
        }
        if a.as_deref() == Some("") || b.as_deref() == Some("") {
            return Err(BuildRunError::ConfigError(format!(
                "language '{name}': `{what}_begin` and `{what}_end` must not be empty"
            )));
        }
        Ok(())
    };
    paired(&lang.input_begin, &lang.input_end, "input")?;
    paired(&lang.output_begin, &lang.output_end, "output")?;

    if lang.output_begin.is_some() && lang.input_begin.is_none() {
        return Err(BuildRunError::ConfigError(format!(
            "language '{name}': output markers require input markers"
        )));
    }
    Ok(())
}
