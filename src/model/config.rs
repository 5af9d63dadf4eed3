use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallConfig {
    pub target_dir: String,
    pub descriptor_pattern: String,
    pub implementation_pattern: String,
}

/// User overrides. Every key is optional so a config file can change one
/// setting without restating the rest.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    install: UserInstallConfig,
}

#[derive(Debug, Default, Deserialize)]
struct UserInstallConfig {
    target_dir: Option<String>,
    descriptor_pattern: Option<String>,
    implementation_pattern: Option<String>,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user_path = directories::ProjectDirs::from("", "", "geditpylint")
            .map(|dirs| dirs.config_dir().join("config.toml"));
        let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;

        Self::load_from(user_path.as_deref(), &home)
    }

    pub fn load_from(user_path: Option<&Path>, home: &Path) -> Result<Self> {
        let user_str = match user_path {
            Some(path) if path.exists() => {
                tracing::debug!("reading user config {}", path.display());
                Some(
                    fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?,
                )
            }
            _ => None,
        };

        let mut config = Self::from_layers(DEFAULTS, user_str.as_deref())?;
        config.install.target_dir = expand_tilde(&config.install.target_dir, home);
        Ok(config)
    }

    fn from_layers(defaults: &str, user: Option<&str>) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(defaults).context("parsing default config")?;

        if let Some(user) = user {
            let overrides: UserConfig = toml::from_str(user).context("parsing user config")?;
            let install = overrides.install;
            if let Some(target_dir) = install.target_dir {
                config.install.target_dir = target_dir;
            }
            if let Some(pattern) = install.descriptor_pattern {
                config.install.descriptor_pattern = pattern;
            }
            if let Some(pattern) = install.implementation_pattern {
                config.install.implementation_pattern = pattern;
            }
        }

        Ok(config)
    }
}

impl InstallConfig {
    pub fn target_path(&self) -> PathBuf {
        PathBuf::from(&self.target_dir)
    }
}

/// Expand a leading `~` or `~/`. Other `~user` forms are left alone.
fn expand_tilde(path: &str, home: &Path) -> String {
    match path.strip_prefix('~') {
        Some("") => home.to_string_lossy().into_owned(),
        Some(rest) if rest.starts_with('/') => format!("{}{rest}", home.to_string_lossy()),
        _ => path.to_string(),
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
