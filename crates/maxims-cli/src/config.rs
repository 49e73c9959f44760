// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use maxims_app::{Catalog, DEFAULT_MAXIMS};
use maxims_llm::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "maxims";
const CONFIG_VERSION: i64 = 1;
const CONFIG_PATH_ENV: &str = "MAXIMS_CONFIG_PATH";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub llm: Llm,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            llm: Llm::default(),
            catalog: CatalogSection::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Llm {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            model: Some(DEFAULT_MODEL.to_owned()),
            api_key_env: Some(DEFAULT_API_KEY_ENV.to_owned()),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSection {
    pub maxims: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub path: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            path: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version; add `version = 1` and keep values under [llm], [catalog], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Run `maxims --print-example-config` for the current layout",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.llm_base_url().is_empty() {
            bail!("llm.base_url in {} must not be empty", path.display());
        }

        if self.llm_model().trim().is_empty() {
            bail!("llm.model in {} must not be empty", path.display());
        }

        if self.llm_api_key_env().trim().is_empty() {
            bail!(
                "llm.api_key_env in {} must name an environment variable",
                path.display()
            );
        }

        if let Some(timeout) = &self.llm.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "llm.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        self.catalog()
            .with_context(|| format!("invalid [catalog] in {}", path.display()))?;

        let level = self.log_level();
        if !LOG_LEVELS.contains(&level) {
            bail!(
                "log.level in {} must be one of {}, got {level:?}",
                path.display(),
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    pub fn llm_base_url(&self) -> &str {
        self.llm
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn llm_model(&self) -> &str {
        self.llm.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn llm_api_key_env(&self) -> &str {
        self.llm.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// `None` means requests are never cut short.
    pub fn llm_timeout(&self) -> Result<Option<Duration>> {
        self.llm.timeout.as_deref().map(parse_duration).transpose()
    }

    pub fn catalog(&self) -> Result<Catalog> {
        match &self.catalog.maxims {
            Some(maxims) => Catalog::new(maxims.iter().cloned()),
            None => Ok(Catalog::default()),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log.path {
            return Ok(PathBuf::from(path));
        }
        let cache_root = dirs::cache_dir().ok_or_else(|| {
            anyhow!("cannot resolve cache directory; set [log].path to a writable file")
        })?;
        Ok(cache_root.join(APP_NAME).join("maxims.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# maxims config\n# Place this file at: {}\n\nversion = 1\n\n[llm]\nbase_url = \"{}\"\nmodel = \"{}\"\n# Environment variable holding the Gemini API key; GEMINI_API_KEY is tried next.\napi_key_env = \"{}\"\n# Optional. Unset means no request timeout. Accepts <N>ms, <N>s or <N>m.\n# timeout = \"30s\"\n\n[catalog]\n# Optional. Replaces the built-in list; entries must be unique.\n# maxims = [\"{}\", \"{}\"]\n\n[log]\n# Overridden by MAXIMS_LOG.\nlevel = \"{}\"\n# Optional. Default is the platform cache dir (for example ~/.cache/maxims/maxims.log)\n# path = \"/absolute/path/to/maxims.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_MODEL,
            DEFAULT_API_KEY_ENV,
            DEFAULT_MAXIMS[0],
            DEFAULT_MAXIMS[1],
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("timeout {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use maxims_app::Maxim;
    use maxims_testkit::temp_config;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(
            config.llm_base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(config.llm_model(), "gemini-2.5-flash");
        assert_eq!(config.llm_api_key_env(), "API_KEY");
        assert_eq!(config.llm_timeout()?, None);
        assert_eq!(config.catalog()?.len(), 24);
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = temp_config("[llm]\nmodel=\"gemini-2.5-pro\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[llm], [catalog], and [log]"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = temp_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = temp_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = temp_config(
            "version = 1\n[llm]\nbase_url = \"http://localhost:8080/v1beta/\"\nmodel = \"gemini-2.5-pro\"\napi_key_env = \"MY_KEY\"\ntimeout = \"2s\"\n[catalog]\nmaxims = [\"Embrace fun\", \"Pick up trash\"]\n[log]\nlevel = \"debug\"\npath = \"/tmp/maxims-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.llm_base_url(), "http://localhost:8080/v1beta");
        assert_eq!(config.llm_model(), "gemini-2.5-pro");
        assert_eq!(config.llm_api_key_env(), "MY_KEY");
        assert_eq!(config.llm_timeout()?, Some(Duration::from_secs(2)));
        assert_eq!(
            config.catalog()?.maxims(),
            &[Maxim::from("Embrace fun"), Maxim::from("Pick up trash")]
        );
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/maxims-test.log"));
        Ok(())
    }

    #[test]
    fn duplicate_catalog_entries_are_rejected() -> Result<()> {
        let (_temp, path) =
            temp_config("version = 1\n[catalog]\nmaxims = [\"Embrace fun\", \"Embrace fun\"]\n")?;
        let error = Config::load(&path).expect_err("duplicate maxims should fail");
        let message = format!("{error:#}");
        assert!(message.contains("invalid [catalog]"));
        assert!(message.contains("more than once"));
        Ok(())
    }

    #[test]
    fn empty_catalog_is_rejected() -> Result<()> {
        let (_temp, path) = temp_config("version = 1\n[catalog]\nmaxims = []\n")?;
        let error = Config::load(&path).expect_err("empty catalog should fail");
        assert!(format!("{error:#}").contains("catalog is empty"));
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let (_temp, path) = temp_config("version = 1\n[llm]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn empty_model_is_rejected() -> Result<()> {
        let (_temp, path) = temp_config("version = 1\n[llm]\nmodel = \"  \"\n")?;
        let error = Config::load(&path).expect_err("blank model should fail");
        assert!(error.to_string().contains("llm.model"));
        Ok(())
    }

    #[test]
    fn unknown_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = temp_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn example_config_loads_cleanly() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.llm_model(), "gemini-2.5-flash");
        assert_eq!(config.catalog()?.len(), 24);
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("MAXIMS_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("MAXIMS_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("MAXIMS_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("maxims/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_duration_accepts_supported_units() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("30s")?, Duration::from_secs(30));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5h").is_err());
        Ok(())
    }

    #[test]
    fn oversized_minute_timeout_is_an_error() -> Result<()> {
        let error = parse_duration("307445734561825861m").expect_err("minutes overflow seconds");
        assert!(error.to_string().contains("too large"));

        let (_temp, path) =
            temp_config("version = 1\n[llm]\ntimeout = \"307445734561825861m\"\n")?;
        let error = Config::load(&path).expect_err("oversized timeout should fail to load");
        assert!(error.to_string().contains("too large"));
        Ok(())
    }
}
