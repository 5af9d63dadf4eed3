use std::fmt;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};

use crate::plugin::error::InstallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Descriptor,
    Implementation,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor => f.write_str("descriptor file"),
            Self::Implementation => f.write_str("implementation file"),
        }
    }
}

/// A plugin file resolved to its canonical, absolute location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub kind: SourceKind,
    pub path: PathBuf,
}

impl SourceFile {
    /// Name the installed link takes in the target directory.
    pub fn link_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSources {
    pub descriptor: SourceFile,
    pub implementation: SourceFile,
}

impl PluginSources {
    pub fn resolve(
        dir: &Path,
        descriptor_pattern: &str,
        implementation_pattern: &str,
    ) -> Result<Self, InstallError> {
        Ok(Self {
            descriptor: resolve_one(dir, SourceKind::Descriptor, descriptor_pattern)?,
            implementation: resolve_one(
                dir,
                SourceKind::Implementation,
                implementation_pattern,
            )?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        [&self.descriptor, &self.implementation].into_iter()
    }
}

/// Glob `dir` (non-recursively) for exactly one file matching `pattern`.
pub fn resolve_one(
    dir: &Path,
    kind: SourceKind,
    pattern: &str,
) -> Result<SourceFile, InstallError> {
    let matcher = build_matcher(dir, kind, pattern)?;
    let mut matches = matching_files(dir, &matcher)?;

    let found = match matches.len() {
        0 => {
            return Err(InstallError::MissingSource {
                kind,
                pattern: pattern.to_string(),
                dir: dir.to_path_buf(),
            });
        }
        1 => matches.remove(0),
        _ => {
            return Err(InstallError::AmbiguousSource {
                kind,
                pattern: pattern.to_string(),
                matches,
            });
        }
    };

    let path = found
        .canonicalize()
        .map_err(|err| InstallError::io(&found, err))?;
    tracing::debug!("resolved {kind} {} -> {}", found.display(), path.display());

    Ok(SourceFile { kind, path })
}

fn build_matcher(
    dir: &Path,
    kind: SourceKind,
    pattern: &str,
) -> Result<Override, InstallError> {
    let invalid = |reason: String| InstallError::InvalidPattern {
        kind,
        pattern: pattern.to_string(),
        reason,
    };

    if pattern.trim().is_empty() || pattern.starts_with('!') || pattern.contains('/') {
        return Err(invalid("expected a file name glob such as `*.py`".to_string()));
    }

    let mut builder = OverrideBuilder::new(dir);
    builder
        .add(pattern)
        .map_err(|err| invalid(err.to_string()))?;
    builder.build().map_err(|err| invalid(err.to_string()))
}

/// Regular files (or links to them) directly inside `dir` whose names match,
/// in file name order. Hidden entries are skipped the way a shell glob skips
/// them.
fn matching_files(dir: &Path, matcher: &Override) -> Result<Vec<PathBuf>, InstallError> {
    let walker = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .standard_filters(false)
        .hidden(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| InstallError::walk(dir, err))?;
        if entry.depth() == 0 {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if matcher.matched(path, false).is_whitelist() {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
