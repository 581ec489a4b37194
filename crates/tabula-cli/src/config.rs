// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabula_app::{DEFAULT_DEBOUNCE_DELAY, DEFAULT_PAGE_SIZE, EngineSettings, PAGE_SIZE_OPTIONS};

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "tabula";
const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub table: TableSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub log: LogSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            table: TableSection::default(),
            fetch: FetchSection::default(),
            log: LogSection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSection {
    pub debounce: Option<String>,
    pub page_size: Option<usize>,
    pub page_sizes: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchSection {
    pub users_url: Option<String>,
    pub timeout: Option<String>,
    pub offline: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSection {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("TABULA_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set TABULA_CONFIG_PATH to the config file")
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
                    "config file {} is not versioned. Add `version = 1` and keep values under [table], [fetch], and [log]",
                    path.display()
                )
            })?;
        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
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
        if let Some(debounce) = &self.table.debounce
            && parse_duration(debounce)
                .with_context(|| format!("table.debounce in {}", path.display()))?
                .is_zero()
        {
            bail!(
                "table.debounce in {} must be positive, got {}",
                path.display(),
                debounce
            );
        }

        let page_sizes = self.page_sizes();
        if page_sizes.is_empty() {
            bail!("table.page_sizes in {} must not be empty", path.display());
        }
        if page_sizes.contains(&0) {
            bail!(
                "table.page_sizes in {} must all be positive, got {:?}",
                path.display(),
                page_sizes
            );
        }
        if !page_sizes.contains(&self.page_size()) {
            bail!(
                "table.page_size in {} must be one of {:?}, got {}",
                path.display(),
                page_sizes,
                self.page_size()
            );
        }

        if let Some(timeout) = &self.fetch.timeout
            && parse_duration(timeout)
                .with_context(|| format!("fetch.timeout in {}", path.display()))?
                .is_zero()
        {
            bail!(
                "fetch.timeout in {} must be positive, got {}",
                path.display(),
                timeout
            );
        }

        if let Some(level) = &self.log.level
            && level.parse::<tracing::Level>().is_err()
        {
            bail!(
                "log.level in {} must be one of trace, debug, info, warn, error; got {:?}",
                path.display(),
                level
            );
        }

        Ok(())
    }

    pub fn debounce(&self) -> Result<Duration> {
        match &self.table.debounce {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_DEBOUNCE_DELAY),
        }
    }

    pub fn page_size(&self) -> usize {
        self.table.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn page_sizes(&self) -> Vec<usize> {
        self.table
            .page_sizes
            .clone()
            .unwrap_or_else(|| PAGE_SIZE_OPTIONS.to_vec())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let settings = EngineSettings {
            debounce_delay: self.debounce()?,
            page_size: self.page_size(),
            page_size_options: self.page_sizes(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn users_url(&self) -> &str {
        self.fetch
            .users_url
            .as_deref()
            .unwrap_or(tabula_fetch::DEFAULT_USERS_URL)
    }

    pub fn fetch_timeout(&self) -> Result<Duration> {
        parse_duration(self.fetch.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn offline(&self) -> bool {
        self.fetch.offline.unwrap_or(false)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file in the config")
        })?;
        Ok(data_root.join(APP_NAME).join("tabula.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# tabula config\n# Place this file at: {}\n\nversion = 1\n\n[table]\n# Quiet period before sort, filter and scope input commits.\ndebounce = \"{}ms\"\npage_size = {}\npage_sizes = {:?}\n\n[fetch]\nusers_url = \"{}\"\ntimeout = \"{}\"\n# Serve the bundled users instead of calling users_url.\noffline = false\n\n[log]\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/tabula/tabula.log)\n# file = \"/absolute/path/to/tabula.log\"\n",
            path.display(),
            DEFAULT_DEBOUNCE_DELAY.as_millis(),
            DEFAULT_PAGE_SIZE,
            PAGE_SIZE_OPTIONS,
            tabula_fetch::DEFAULT_USERS_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        let Some(secs) = mins.checked_mul(60) else {
            bail!("duration {raw:?} is too large");
        };
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 1500ms or 5s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

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
        let settings = config.engine_settings()?;
        assert_eq!(settings.debounce_delay, Duration::from_millis(1500));
        assert_eq!(settings.page_size, 5);
        assert_eq!(settings.page_size_options, vec![2, 5, 10, 20, 40]);
        assert!(!config.offline());
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[table]\npage_size = 10\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[table], [fetch], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[table]\ndebounce = \"300ms\"\npage_size = 3\npage_sizes = [3, 6]\n[fetch]\nusers_url = \"http://localhost:9000/users\"\ntimeout = \"2s\"\noffline = true\n[log]\nlevel = \"debug\"\nfile = \"/tmp/tabula-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        let settings = config.engine_settings()?;
        assert_eq!(settings.debounce_delay, Duration::from_millis(300));
        assert_eq!(settings.page_size, 3);
        assert_eq!(settings.page_size_options, vec![3, 6]);
        assert_eq!(config.users_url(), "http://localhost:9000/users");
        assert_eq!(config.fetch_timeout()?, Duration::from_secs(2));
        assert!(config.offline());
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_file()?, PathBuf::from("/tmp/tabula-test.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn page_size_must_be_a_listed_option() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[table]\npage_size = 7\n")?;
        let error = Config::load(&path).expect_err("unlisted page size should fail");
        assert!(error.to_string().contains("table.page_size"));

        let (_temp, path) = write_config("version = 1\n[table]\npage_sizes = []\n")?;
        let error = Config::load(&path).expect_err("empty options should fail");
        assert!(error.to_string().contains("must not be empty"));

        let (_temp, path) =
            write_config("version = 1\n[table]\npage_size = 0\npage_sizes = [0, 5]\n")?;
        let error = Config::load(&path).expect_err("zero option should fail");
        assert!(error.to_string().contains("must all be positive"));
        Ok(())
    }

    #[test]
    fn zero_durations_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[table]\ndebounce = \"0ms\"\n")?;
        let error = Config::load(&path).expect_err("zero debounce should fail");
        assert!(error.to_string().contains("table.debounce"));

        let (_temp, path) = write_config("version = 1\n[fetch]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("fetch.timeout"));
        Ok(())
    }

    #[test]
    fn unknown_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("TABULA_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("TABULA_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_ends_in_app_dir() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("TABULA_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("tabula/config.toml"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("1500ms")?, Duration::from_millis(1500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        let error = parse_duration("soon").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
        Ok(())
    }

    #[test]
    fn oversized_minutes_are_rejected_with_the_key() -> Result<()> {
        let error = parse_duration("18446744073709551615m").expect_err("overflow should fail");
        assert!(error.to_string().contains("too large"));

        let (_temp, path) = write_config(
            r#"version = 1

[table]
debounce = "18446744073709551615m"
"#,
        )?;
        let error = Config::load(&path).expect_err("overflowing debounce should fail");
        let message = format!("{error:#}");
        assert!(message.contains("table.debounce"));
        assert!(message.contains("too large"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.engine_settings()?.page_size, 5);
        assert_eq!(config.users_url(), tabula_fetch::DEFAULT_USERS_URL);
        Ok(())
    }
}
