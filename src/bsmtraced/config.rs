use std::{
    collections::HashMap,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use audit_pipe::AuditPipeDevice;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "/usr/local/etc/bsmtrace.ini";

/// Section holding the audit pipe monitor settings.
pub const PIPE_SECTION: &str = "pipe";

/// bsmtrace configuration, backed by an `INI` file.
#[derive(Debug, Clone, Default)]
pub struct BsmtraceConfig {
    pipe: SectionConfig,
}

impl BsmtraceConfig {
    /// Load the default file. A missing default file means default settings.
    pub fn new() -> Result<Self> {
        let config_file = PathBuf::from(DEFAULT_CONFIG_FILE);
        if !config_file.exists() {
            log::debug!("{DEFAULT_CONFIG_FILE} not found, using default settings");
            return Ok(Self::default());
        }
        Self::from_config_file(&config_file)
    }

    /// Load a custom file, which must exist.
    pub fn with_custom_file(config_file: impl AsRef<Path>) -> Result<Self> {
        let config_file = config_file.as_ref();
        if !config_file.exists() {
            bail!("Configuration file {} not found", config_file.display());
        }
        Self::from_config_file(config_file)
    }

    fn from_config_file(config_file: &Path) -> Result<Self> {
        let conf = ini::Ini::load_from_file(config_file)
            .with_context(|| format!("Error loading configuration from {config_file:?}"))?;

        let mut pipe = SectionConfig::default();
        for (section, prop) in &conf {
            match section {
                Some(PIPE_SECTION) => {
                    for (key, value) in prop.iter() {
                        log::debug!("{PIPE_SECTION}.{key}={value}");
                        pipe.insert(key.to_string(), value.to_string());
                    }
                }
                Some(section) => {
                    log::warn!("Ignoring unknown section [{section}] in {config_file:?}");
                }
                None if prop.iter().next().is_some() => {
                    log::warn!("Ignoring settings outside of any section in {config_file:?}");
                }
                None => {}
            }
        }

        Ok(Self { pipe })
    }

    pub fn pipe_config(&self) -> Result<PipeConfig, ConfigError> {
        PipeConfig::try_from(&self.pipe)
    }
}

/// Key/value settings of a single section.
#[derive(Debug, Clone, Default)]
pub struct SectionConfig {
    inner: HashMap<String, String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{value} is not a valid value for field {field}: {err}")]
    InvalidValue {
        field: String,
        value: String,
        err: String,
    },
}

impl SectionConfig {
    /// Inserts a new configuration value.
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        self.inner.insert(key, value)
    }

    /// Returns an optional typed configuration value.
    pub fn optional<T>(&self, config_name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        self.inner
            .get(config_name)
            .map(|value| parse(value, config_name))
            .transpose()
    }

    /// Returns a typed configuration value, or `default` if it's missing.
    pub fn with_default<T>(&self, config_name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        Ok(self.optional(config_name)?.unwrap_or(default))
    }
}

fn parse<T>(value: &str, config_name: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    T::from_str(value.trim()).map_err(|err| ConfigError::InvalidValue {
        field: config_name.to_string(),
        value: value.to_string(),
        err: err.to_string(),
    })
}

/// Settings of the `[pipe]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeConfig {
    /// Audit pipe device to monitor.
    pub path: PathBuf,
    /// How often the loss counters are checked.
    pub loss_check_interval: Duration,
    /// How often statistics are reported, `None` to only report on demand.
    pub stats_interval: Option<Duration>,
    /// Report statistics one last time on shutdown.
    pub report_on_exit: bool,
    /// Queue limit applied when the pipe is opened.
    pub initial_queue_limit: Option<u32>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(AuditPipeDevice::DEFAULT_PATH),
            loss_check_interval: Duration::from_secs(1),
            stats_interval: None,
            report_on_exit: true,
            initial_queue_limit: None,
        }
    }
}

impl TryFrom<&SectionConfig> for PipeConfig {
    type Error = ConfigError;

    fn try_from(config: &SectionConfig) -> Result<Self, Self::Error> {
        let defaults = PipeConfig::default();

        let loss_check_interval: u64 = config.with_default("loss_check_interval", 1)?;
        if loss_check_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "loss_check_interval".to_string(),
                value: loss_check_interval.to_string(),
                err: "interval must be greater than zero".to_string(),
            });
        }

        let stats_interval: u64 = config.with_default("stats_interval", 0)?;

        Ok(Self {
            path: config.with_default("path", defaults.path)?,
            loss_check_interval: Duration::from_secs(loss_check_interval),
            stats_interval: (stats_interval > 0).then(|| Duration::from_secs(stats_interval)),
            report_on_exit: config.with_default("report_on_exit", defaults.report_on_exit)?,
            initial_queue_limit: config.optional("initial_queue_limit")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn empty_section_gives_defaults() {
        let config = PipeConfig::try_from(&SectionConfig::default()).unwrap();
        assert_eq!(config, PipeConfig::default());
    }

    #[test]
    fn load_pipe_section() {
        let path = write_config(
            "bsmtrace-test-load.ini",
            "[pipe]\n\
             path = /dev/auditpipe2\n\
             loss_check_interval = 5\n\
             stats_interval = 60\n\
             report_on_exit = false\n\
             initial_queue_limit = 512\n\
             \n\
             [other]\n\
             key = value\n",
        );

        let config = BsmtraceConfig::with_custom_file(&path).unwrap();
        assert_eq!(
            config.pipe_config().unwrap(),
            PipeConfig {
                path: PathBuf::from("/dev/auditpipe2"),
                loss_check_interval: Duration::from_secs(5),
                stats_interval: Some(Duration::from_secs(60)),
                report_on_exit: false,
                initial_queue_limit: Some(512),
            }
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_pipe_section_gives_defaults() {
        let path = write_config("bsmtrace-test-no-pipe.ini", "[other]\nloss_check_interval = 0\n");

        let config = BsmtraceConfig::with_custom_file(&path).unwrap();
        assert_eq!(config.pipe_config().unwrap(), PipeConfig::default());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_custom_file_is_an_error() {
        let path = std::env::temp_dir().join("bsmtrace-test-missing.ini");
        assert!(BsmtraceConfig::with_custom_file(&path).is_err());
    }

    #[test]
    fn zero_loss_check_interval_is_invalid() {
        let mut section = SectionConfig::default();
        section.insert("loss_check_interval".to_string(), "0".to_string());
        assert!(matches!(
            PipeConfig::try_from(&section),
            Err(ConfigError::InvalidValue { field, .. }) if field == "loss_check_interval"
        ));
    }

    #[test]
    fn invalid_values_name_the_field() {
        let mut section = SectionConfig::default();
        section.insert("initial_queue_limit".to_string(), "lots".to_string());
        let err = PipeConfig::try_from(&section).unwrap_err();
        assert_eq!(
            err.to_string(),
            "lots is not a valid value for field initial_queue_limit: invalid digit found in string"
        );
    }
}
