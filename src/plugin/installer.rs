use std::fmt;
use std::path::{Path, PathBuf};

use crate::model::config::InstallConfig;
use crate::plugin::error::InstallError;
use crate::plugin::source::PluginSources;
use crate::plugin::target::TargetDir;

/// A single filesystem change made while installing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Removed(PathBuf),
    Linked { link: PathBuf, target: PathBuf },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed(link) => write!(f, "removed {}", link.display()),
            Self::Linked { link, target } => {
                write!(f, "linked {} -> {}", link.display(), target.display())
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub removed: Vec<PathBuf>,
    pub linked: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Installer {
    source_dir: PathBuf,
    target_dir: PathBuf,
    descriptor_pattern: String,
    implementation_pattern: String,
}

impl Installer {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        descriptor_pattern: impl Into<String>,
        implementation_pattern: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            descriptor_pattern: descriptor_pattern.into(),
            implementation_pattern: implementation_pattern.into(),
        }
    }

    /// Installer for the plugin in `source_dir`, using the configured target
    /// directory and patterns.
    pub fn from_config(source_dir: impl Into<PathBuf>, config: &InstallConfig) -> Self {
        Self::new(
            source_dir,
            config.target_path(),
            &config.descriptor_pattern,
            &config.implementation_pattern,
        )
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Replace every symlink in the target directory with links to the
    /// plugin's descriptor and implementation files.
    ///
    /// Both the target directory and the sources are resolved, and checked not
    /// to be the same files, before anything is deleted, so those failures
    /// leave the target untouched. After
    /// that the first filesystem error aborts the run with no rollback.
    pub fn install(
        &self,
        mut on_progress: impl FnMut(&Progress),
    ) -> Result<InstallReport, InstallError> {
        let target = TargetDir::resolve(&self.target_dir)?;
        let sources = PluginSources::resolve(
            &self.source_dir,
            &self.descriptor_pattern,
            &self.implementation_pattern,
        )?;
        tracing::info!(
            "installing {} and {} into {}",
            sources.descriptor.path.display(),
            sources.implementation.path.display(),
            target.path().display()
        );
        for source in sources.iter() {
            target.ensure_distinct(source)?;
        }

        let removed =
            target.sweep_symlinks(|link| on_progress(&Progress::Removed(link.to_path_buf())))?;

        let mut linked = Vec::new();
        for source in sources.iter() {
            let link = target.link(source)?;
            on_progress(&Progress::Linked {
                link: link.clone(),
                target: source.path.clone(),
            });
            linked.push(link);
        }

        Ok(InstallReport { removed, linked })
    }
}
