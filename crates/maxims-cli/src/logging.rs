// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "MAXIMS_LOG";

// HTTP stack internals are only interesting when asked for explicitly.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// Sends log records to `path`; the terminal belongs to the TUI.
pub fn init(path: &Path, level: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(build_filter(env::var(LOG_ENV).ok().as_deref(), level)?)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))
}

fn build_filter(override_directives: Option<&str>, level: &str) -> Result<EnvFilter> {
    match override_directives.map(str::trim) {
        Some(directives) if !directives.is_empty() => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} value {directives:?}")),
        _ => EnvFilter::try_new(format!("{level},{QUIET_DEPENDENCIES}"))
            .with_context(|| format!("invalid log.level {level:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::build_filter;
    use anyhow::Result;

    #[test]
    fn config_level_applies_without_override() -> Result<()> {
        let filter = build_filter(None, "debug")?;
        let rendered = filter.to_string();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("reqwest=warn"));
        Ok(())
    }

    #[test]
    fn env_override_replaces_config_level() -> Result<()> {
        let filter = build_filter(Some("maxims_llm=trace"), "info")?;
        assert_eq!(filter.to_string(), "maxims_llm=trace");
        Ok(())
    }

    #[test]
    fn blank_override_falls_back_to_config_level() -> Result<()> {
        let filter = build_filter(Some("   "), "warn")?;
        assert!(filter.to_string().contains("warn"));
        Ok(())
    }

    #[test]
    fn invalid_override_is_reported() {
        let error = build_filter(Some("maxims_llm=loudest"), "info").expect_err("bad directive");
        assert!(error.to_string().contains("MAXIMS_LOG"));
    }
}
