//! YAML run configuration for resolution.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! resolution:
//!   additional_properties: widen
//!   discriminator_property: kind
//!   strict_module_dependencies: false
//! execution:
//!   jobs: 4
//! ```
//!
//! Every section may be omitted; missing values take the defaults of
//! [`ResolveOptions`].

use std::io::{BufReader, BufWriter};
use std::path::Path;

use modelgen_core::{DEFAULT_DISCRIMINATOR_PROPERTY, ResolveOptions, WideningPolicy};
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};

/// Configuration format version written by [`ResolveConfig::default`].
pub const CONFIG_VERSION: &str = "1.0";

/// Settings that change resolution results.
///
/// # Examples
///
/// ```
/// # use modelgen_loader::ResolutionConfig;
/// let r = ResolutionConfig::default();
/// assert_eq!(r.discriminator_property, "kind");
/// assert!(!r.strict_module_dependencies);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// `widen` or `strict`.
    pub additional_properties: WideningPolicy,
    /// Discriminator property of unions that do not name one.
    pub discriminator_property: String,
    /// Treat references to undeclared module dependencies as errors.
    pub strict_module_dependencies: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            additional_properties: WideningPolicy::default(),
            discriminator_property: DEFAULT_DISCRIMINATOR_PROPERTY.to_string(),
            strict_module_dependencies: false,
        }
    }
}

/// Settings that only change how resolution runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker threads; unset or 0 uses every available core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

/// Top-level configuration file.
///
/// # Examples
///
/// ```no_run
/// use modelgen_loader::ResolveConfig;
///
/// let config = ResolveConfig::load("modelgen.yml").unwrap();
/// let options = config.to_options().unwrap();
/// println!("jobs: {:?}", options.jobs);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    pub resolution: ResolutionConfig,
    pub execution: ExecutionConfig,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            resolution: ResolutionConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl ResolveConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::LoaderError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::LoaderError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Converts the file into core [`ResolveOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InvalidConfig`] when the discriminator property
    /// is blank.
    ///
    /// # Examples
    ///
    /// ```
    /// # let yaml = "resolution: { additional_properties: strict }\nexecution: { jobs: 2 }\n";
    /// # let config: modelgen_loader::ResolveConfig = serde_yaml::from_str(yaml).unwrap();
    /// use modelgen_core::WideningPolicy;
    ///
    /// let options = config.to_options().unwrap();
    /// assert_eq!(options.additional_properties, WideningPolicy::Strict);
    /// assert_eq!(options.jobs, Some(2));
    /// assert_eq!(options.default_discriminator_property, "kind");
    /// ```
    pub fn to_options(&self) -> Result<ResolveOptions> {
        let property = self.resolution.discriminator_property.trim();
        if property.is_empty() {
            return Err(LoaderError::InvalidConfig(
                "resolution.discriminator_property must not be empty".into(),
            ));
        }

        let mut options = ResolveOptions::default()
            .with_widening_policy(self.resolution.additional_properties)
            .with_discriminator_property(property)
            .with_strict_module_dependencies(self.resolution.strict_module_dependencies);
        if let Some(jobs) = self.execution.jobs {
            options = options.with_jobs(jobs);
        }
        Ok(options)
    }
}
