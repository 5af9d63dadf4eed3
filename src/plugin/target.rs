use std::fs;
use std::io;
use std::os::unix::fs::{MetadataExt, symlink};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::plugin::error::InstallError;
use crate::plugin::source::SourceFile;

/// The host's plugin directory, canonicalized and known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDir {
    path: PathBuf,
}

impl TargetDir {
    pub fn resolve(path: &Path) -> Result<Self, InstallError> {
        let resolved = path.canonicalize().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                InstallError::TargetNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                InstallError::io(path, err)
            }
        })?;

        if !resolved.is_dir() {
            return Err(InstallError::TargetNotFound { path: resolved });
        }

        Ok(Self { path: resolved })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every symlink directly inside the directory, dangling or not, in file
    /// name order. Regular files and directories are not listed.
    pub fn symlinks(&self) -> Result<Vec<PathBuf>, InstallError> {
        let walker = WalkBuilder::new(&self.path)
            .max_depth(Some(1))
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut links = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| InstallError::walk(&self.path, err))?;
            if entry.depth() == 0 {
                continue;
            }
            if entry.path_is_symlink() {
                links.push(entry.into_path());
            }
        }

        Ok(links)
    }

    /// Delete every symlink in the directory, calling `on_removed` after each
    /// one. Stops at the first failure; links already removed stay removed.
    pub fn sweep_symlinks(
        &self,
        on_removed: impl FnMut(&Path),
    ) -> Result<Vec<PathBuf>, InstallError> {
        self.sweep_with(|link| fs::remove_file(link), on_removed)
    }

    fn sweep_with(
        &self,
        mut remove: impl FnMut(&Path) -> io::Result<()>,
        mut on_removed: impl FnMut(&Path),
    ) -> Result<Vec<PathBuf>, InstallError> {
        let links = self.symlinks()?;
        for link in &links {
            remove(link).map_err(|err| InstallError::io(link, err))?;
            tracing::info!("removed {}", link.display());
            on_removed(link);
        }
        Ok(links)
    }

    /// Fail if linking `source` would replace `source` itself, which happens
    /// when the plugin files already live in this directory.
    pub fn ensure_distinct(&self, source: &SourceFile) -> Result<(), InstallError> {
        let link_path = self.link_path(source)?;
        if link_path == source.path || same_file(&link_path, &source.path) {
            return Err(InstallError::io(
                &link_path,
                io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is the source file itself", source.kind),
                ),
            ));
        }
        Ok(())
    }

    /// Link `source` into the directory under its own file name, replacing
    /// whatever non-directory entry already has that name.
    pub fn link(&self, source: &SourceFile) -> Result<PathBuf, InstallError> {
        self.link_with(source, |original, link| symlink(original, link))
    }

    fn link_with(
        &self,
        source: &SourceFile,
        make_link: impl FnOnce(&Path, &Path) -> io::Result<()>,
    ) -> Result<PathBuf, InstallError> {
        self.ensure_distinct(source)?;
        let link_path = self.link_path(source)?;

        match fs::symlink_metadata(&link_path) {
            Ok(meta) if meta.is_dir() => {
                return Err(InstallError::io(
                    &link_path,
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "a directory already occupies the link name",
                    ),
                ));
            }
            Ok(_) => {
                tracing::warn!("replacing existing entry {}", link_path.display());
                fs::remove_file(&link_path).map_err(|err| InstallError::io(&link_path, err))?;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(InstallError::io(&link_path, err)),
        }

        make_link(&source.path, &link_path).map_err(|err| InstallError::io(&link_path, err))?;
        tracing::info!(
            "linked {} {} -> {}",
            source.kind,
            link_path.display(),
            source.path.display()
        );

        Ok(link_path)
    }

    fn link_path(&self, source: &SourceFile) -> Result<PathBuf, InstallError> {
        let name = source.link_name().ok_or_else(|| {
            InstallError::io(
                &source.path,
                io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"),
            )
        })?;
        Ok(self.path.join(name))
    }
}

/// Whether `entry` is a non-symlink entry sharing an inode with `source`.
/// A symlink at `entry` is always safe to replace.
fn same_file(entry: &Path, source: &Path) -> bool {
    let (Ok(entry_meta), Ok(source_meta)) = (fs::symlink_metadata(entry), fs::metadata(source))
    else {
        return false;
    };
    !entry_meta.file_type().is_symlink()
        && entry_meta.dev() == source_meta.dev()
        && entry_meta.ino() == source_meta.ino()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::source::SourceKind;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn source(dir: &Path, name: &str) -> SourceFile {
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        SourceFile {
            kind: SourceKind::Implementation,
            path: path.canonicalize().unwrap(),
        }
    }

    #[test]
    fn missing_target_is_target_not_found() {
        let root = TempDir::new().unwrap();

        let err = TargetDir::resolve(&root.path().join("plugins")).unwrap_err();

        assert!(matches!(err, InstallError::TargetNotFound { .. }));
        assert!(!root.path().join("plugins").exists());
    }

    #[test]
    fn file_as_target_is_target_not_found() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("plugins");
        fs::write(&file, "").unwrap();

        let err = TargetDir::resolve(&file).unwrap_err();

        assert!(matches!(err, InstallError::TargetNotFound { .. }));
    }

    #[test]
    fn resolve_strips_symlinks_from_target_path() {
        let root = TempDir::new().unwrap();
        let real = root.path().join("real");
        fs::create_dir(&real).unwrap();
        symlink(&real, root.path().join("alias")).unwrap();

        let target = TargetDir::resolve(&root.path().join("alias")).unwrap();

        assert_eq!(target.path(), real.canonicalize().unwrap());
    }

    #[test]
    fn sweep_removes_only_symlinks() {
        let root = TempDir::new().unwrap();
        let plugins = root.path().join("plugins");
        fs::create_dir(&plugins).unwrap();
        let kept = source(&plugins, "other.plugin");
        fs::create_dir(plugins.join("bundled")).unwrap();
        symlink(&kept.path, plugins.join("b-link")).unwrap();
        symlink(root.path().join("gone"), plugins.join("a-dangling")).unwrap();
        symlink(plugins.join("bundled"), plugins.join(".hidden-dir-link")).unwrap();

        let target = TargetDir::resolve(&plugins).unwrap();
        let mut reported = Vec::new();
        let removed = target
            .sweep_symlinks(|link| reported.push(link.to_path_buf()))
            .unwrap();

        assert_eq!(removed.len(), 3);
        assert_eq!(reported, removed);
        assert!(target.symlinks().unwrap().is_empty());
        assert!(kept.path.is_file());
        assert!(plugins.join("bundled").is_dir());
    }

    #[test]
    fn link_replaces_regular_file_of_same_name() {
        let work = TempDir::new().unwrap();
        let plugins = TempDir::new().unwrap();
        let src = source(work.path(), "geditpylint.py");
        fs::write(plugins.path().join("geditpylint.py"), "stale copy").unwrap();

        let target = TargetDir::resolve(plugins.path()).unwrap();
        let link = target.link(&src).unwrap();

        assert_eq!(fs::read_link(&link).unwrap(), src.path);
    }

    #[test]
    fn link_refuses_to_replace_directory() {
        let work = TempDir::new().unwrap();
        let plugins = TempDir::new().unwrap();
        let src = source(work.path(), "geditpylint.py");
        fs::create_dir(plugins.path().join("geditpylint.py")).unwrap();

        let target = TargetDir::resolve(plugins.path()).unwrap();
        let err = target.link(&src).unwrap_err();

        assert!(matches!(err, InstallError::Filesystem { .. }));
        assert!(plugins.path().join("geditpylint.py").is_dir());
    }

    fn running_as_root() -> bool {
        let scratch = TempDir::new().unwrap();
        fs::metadata(scratch.path()).unwrap().uid() == 0
    }

    #[test]
    fn read_only_target_is_permission_error() {
        if running_as_root() {
            eprintln!("skipping: root bypasses directory permissions");
            return;
        }
        let work = TempDir::new().unwrap();
        let plugins = TempDir::new().unwrap();
        let src = source(work.path(), "geditpylint.py");
        symlink(&src.path, plugins.path().join("stale.py")).unwrap();
        fs::set_permissions(plugins.path(), fs::Permissions::from_mode(0o555)).unwrap();

        let target = TargetDir::resolve(plugins.path()).unwrap();
        let sweep = target.sweep_symlinks(|_| {});
        let link = target.link(&src);

        fs::set_permissions(plugins.path(), fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(sweep, Err(InstallError::Permission { .. })));
        assert!(matches!(link, Err(InstallError::Permission { .. })));
    }

    #[test]
    fn denied_removal_stops_sweep_with_permission_error() {
        let plugins = TempDir::new().unwrap();
        for name in ["a.py", "b.py", "c.py"] {
            symlink("/nonexistent", plugins.path().join(name)).unwrap();
        }

        let target = TargetDir::resolve(plugins.path()).unwrap();
        let mut reported = Vec::new();
        let err = target
            .sweep_with(
                |link| {
                    if link.ends_with("b.py") {
                        Err(io::Error::from(io::ErrorKind::PermissionDenied))
                    } else {
                        fs::remove_file(link)
                    }
                },
                |link| reported.push(link.to_path_buf()),
            )
            .unwrap_err();

        match err {
            InstallError::Permission { path, .. } => assert!(path.ends_with("b.py")),
            other => panic!("expected permission error, got {other:?}"),
        }
        assert_eq!(reported, vec![target.path().join("a.py")]);
        assert_eq!(target.symlinks().unwrap().len(), 2);
    }

    #[test]
    fn denied_link_creation_is_permission_error() {
        let work = TempDir::new().unwrap();
        let plugins = TempDir::new().unwrap();
        let src = source(work.path(), "geditpylint.py");

        let target = TargetDir::resolve(plugins.path()).unwrap();
        let err = target
            .link_with(&src, |_, _| {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            })
            .unwrap_err();

        match err {
            InstallError::Permission { path, .. } => {
                assert_eq!(path, target.path().join("geditpylint.py"));
            }
            other => panic!("expected permission error, got {other:?}"),
        }
    }

    #[test]
    fn link_refuses_to_replace_its_own_source() {
        let plugins = TempDir::new().unwrap();
        let src = source(plugins.path(), "geditpylint.py");
        fs::write(&src.path, "import pylint\n").unwrap();

        let target = TargetDir::resolve(plugins.path()).unwrap();
        let err = target.link(&src).unwrap_err();

        assert!(matches!(err, InstallError::Filesystem { .. }));
        assert!(!src.path.is_symlink());
        assert_eq!(fs::read_to_string(&src.path).unwrap(), "import pylint\n");
    }

    #[test]
    fn link_refuses_hard_link_of_source() {
        let work = TempDir::new().unwrap();
        let plugins = TempDir::new().unwrap();
        let src = source(work.path(), "geditpylint.py");
        fs::hard_link(&src.path, plugins.path().join("geditpylint.py")).unwrap();

        let target = TargetDir::resolve(plugins.path()).unwrap();

        assert!(target.ensure_distinct(&src).is_err());
        assert!(plugins.path().join("geditpylint.py").is_file());
    }
}
