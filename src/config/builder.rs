//! Configuration builder
//!
//! This module provides a builder pattern for constructing configuration.

use std::path::{Path, PathBuf};

use log::debug;

use crate::config::error::Result;
use crate::config::types::{ConfigValues, TunnelConfig};

/// A source of configuration values
pub trait ConfigSource {
    /// Human readable name of the source
    fn name(&self) -> &str;

    /// Load the values this source provides
    fn load(&self) -> Result<ConfigValues>;
}

/// Built-in defaults
pub struct DefaultSource;

impl ConfigSource for DefaultSource {
    fn name(&self) -> &str {
        "defaults"
    }

    fn load(&self) -> Result<ConfigValues> {
        Ok(ConfigValues::defaults())
    }
}

/// JSON configuration file
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a file source
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Result<ConfigValues> {
        ConfigValues::from_file(&self.path)
    }
}

/// Environment variables sharing a prefix
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    /// Create an environment source
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn load(&self) -> Result<ConfigValues> {
        ConfigValues::from_env(&self.prefix)
    }
}

/// Values already parsed elsewhere, e.g. command line flags
impl ConfigSource for ConfigValues {
    fn name(&self) -> &str {
        "command line"
    }

    fn load(&self) -> Result<ConfigValues> {
        Ok(self.clone())
    }
}

/// Configuration builder
///
/// Sources are applied in the order they were added, lowest priority first.
#[derive(Default)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Add default source
    pub fn with_defaults(mut self) -> Self {
        self.sources.push(Box::new(DefaultSource));
        self
    }

    /// Add file source
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        debug!("Adding file configuration source: {}", path.display());
        self.sources.push(Box::new(FileSource::new(path)));
        self
    }

    /// Add environment source
    pub fn with_env(mut self, prefix: &str) -> Self {
        debug!("Adding environment configuration source with prefix: {}", prefix);
        self.sources.push(Box::new(EnvSource::new(prefix)));
        self
    }

    /// Add command line values
    pub fn with_cli(mut self, values: ConfigValues) -> Self {
        self.sources.push(Box::new(values));
        self
    }

    /// Merge all layers without resolving them
    pub fn merged(self) -> Result<ConfigValues> {
        let mut values = ConfigValues::default();

        for source in self.sources {
            debug!("Loading configuration from source: {}", source.name());
            values = values.merge(source.load()?);
        }

        Ok(values)
    }

    /// Build the configuration
    pub fn build(self) -> Result<TunnelConfig> {
        let config = TunnelConfig::from_values(self.merged()?)?;

        debug!("Final configuration:");
        config.log();

        Ok(config)
    }
}
