//! Configuration Management
//!
//! Settings are layered, later sources win:
//! user config file, project `.imagesrc` file, `IMAGES_*` environment
//! variables, then command line flags (applied by the binary).

use crate::output::OutputMode;
use crate::provider::client::REGION_PLACEHOLDER;
use crate::provider::credentials::Credentials;
use crate::provider::http::DEFAULT_REQUEST_TIMEOUT;
use crate::provider::regions::{default_catalog, split_list};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base name of project config files
pub const PROJECT_CONFIG_NAME: &str = ".imagesrc";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "IMAGES";

/// Hint appended to validation errors
const CHECK_CONFIG: &str = "Please check your configuration";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Regions to operate on, or `all`
    #[serde(default)]
    pub regions: Vec<String>,
    /// Regions removed after `all` expansion
    #[serde(default)]
    pub regions_exclude: Vec<String>,
    /// Overrides the built-in region catalog used by `all`
    #[serde(default)]
    pub catalog: Vec<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Endpoint template with a `{region}` placeholder
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub output: Option<OutputMode>,
}

impl Config {
    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("images").join("config.json"))
    }

    /// Find a project config file in `dir`
    pub fn discover_project_file(dir: &Path) -> Option<PathBuf> {
        [
            PROJECT_CONFIG_NAME.to_string(),
            format!("{}.json", PROJECT_CONFIG_NAME),
            format!("{}.yaml", PROJECT_CONFIG_NAME),
            format!("{}.yml", PROJECT_CONFIG_NAME),
        ]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
    }

    /// Parse a config file. `.json` files are JSON, anything else YAML
    /// (which also accepts plain JSON).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Read `IMAGES_*` overrides through `lookup`
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}_{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let request_timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| invalid_env("REQUEST_TIMEOUT_SECS", &v))?,
            ),
            None => None,
        };
        let output = match var("OUTPUT") {
            Some(v) => Some(v.parse::<OutputMode>().map_err(|_| invalid_env("OUTPUT", &v))?),
            None => None,
        };

        Ok(Self {
            regions: var("REGIONS").map(|v| split_list(&[v])).unwrap_or_default(),
            regions_exclude: var("REGIONS_EXCLUDE")
                .map(|v| split_list(&[v]))
                .unwrap_or_default(),
            catalog: var("CATALOG").map(|v| split_list(&[v])).unwrap_or_default(),
            access_key: var("ACCESS_KEY"),
            secret_key: var("SECRET_KEY"),
            endpoint: var("ENDPOINT"),
            request_timeout_secs,
            output,
        })
    }

    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merge(mut self, other: Config) -> Self {
        if !other.regions.is_empty() {
            self.regions = other.regions;
        }
        if !other.regions_exclude.is_empty() {
            self.regions_exclude = other.regions_exclude;
        }
        if !other.catalog.is_empty() {
            self.catalog = other.catalog;
        }
        self.access_key = other.access_key.or(self.access_key);
        self.secret_key = other.secret_key.or(self.secret_key);
        self.endpoint = other.endpoint.or(self.endpoint);
        self.request_timeout_secs = other.request_timeout_secs.or(self.request_timeout_secs);
        self.output = other.output.or(self.output);
        self
    }

    /// Load every layer except command line flags
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        Self::load_from(
            Self::user_config_path().as_deref(),
            &cwd,
            |name| std::env::var(name).ok(),
        )
    }

    /// Load layers from explicit locations
    pub fn load_from<F>(user_config: Option<&Path>, project_dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = user_config.filter(|p| p.is_file()) {
            config = config.merge(Self::from_file(path)?);
        }

        if let Some(path) = Self::discover_project_file(project_dir) {
            config = config.merge(Self::from_file(&path)?);
        }

        Ok(config.merge(Self::from_env_with(env)?))
    }

    /// Region catalog used to expand `all`
    pub fn catalog(&self) -> Vec<String> {
        if self.catalog.is_empty() {
            default_catalog()
        } else {
            split_list(self.catalog.as_slice())
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::new(
            self.access_key.clone().unwrap_or_default(),
            self.secret_key.clone().unwrap_or_default(),
        )
    }

    pub fn endpoint(&self) -> Result<&str> {
        match self.endpoint.as_deref() {
            Some(endpoint) if endpoint.contains(REGION_PLACEHOLDER) => Ok(endpoint),
            Some(endpoint) => bail!(
                "Endpoint '{}' has no {} placeholder. {}",
                endpoint,
                REGION_PLACEHOLDER,
                CHECK_CONFIG
            ),
            None => bail!("Endpoint is not set. {}", CHECK_CONFIG),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output.unwrap_or_default()
    }

    /// Check everything needed to build region clients
    pub fn validate(&self) -> Result<()> {
        if split_list(self.regions.as_slice()).is_empty() {
            bail!("Regions are not set. {}", CHECK_CONFIG);
        }
        self.credentials()?;
        self.endpoint()?;
        Ok(())
    }
}

fn invalid_env(name: &str, value: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "invalid value for {}_{}: '{}'. {}",
        ENV_PREFIX,
        name,
        value,
        CHECK_CONFIG
    )
}
