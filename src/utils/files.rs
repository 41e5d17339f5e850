// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Filesystem helpers for build recipes.
//!
//! Staleness checks work on modification times: a target needs rebuilding
//! when any of its sources was modified after it. Source lists are glob
//! patterns, so `src/**/*.rs` covers a whole tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{FileAction, FileError};

/// True when `path` can be stat'ed (broken symlinks do not count)
pub fn exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).is_ok()
}

/// Copy `src` to `dst`, overwriting `dst`.
///
/// With `mode` of `None` the destination gets the source's permissions.
/// A partially written destination is removed when the copy fails.
pub fn copy_file(dst: impl AsRef<Path>, src: impl AsRef<Path>, mode: Option<u32>) -> Result<(), FileError> {
    let (dst, src) = (dst.as_ref(), src.as_ref());
    let mut reader = fs::File::open(src).map_err(|e| FileError::new(FileAction::Open, src, e))?;
    let mut permissions = reader
        .metadata()
        .map_err(|e| FileError::new(FileAction::Stat, src, e))?
        .permissions();
    if let Some(mode) = mode {
        apply_mode(&mut permissions, mode);
    }

    let mut writer = fs::File::create(dst).map_err(|e| FileError::new(FileAction::Create, dst, e))?;
    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .map_err(|e| FileError::new(FileAction::Copy, src, e));
    drop(writer);
    if let Err(error) = copied {
        let _ = fs::remove_file(dst);
        return Err(error);
    }
    fs::set_permissions(dst, permissions).map_err(|e| FileError::new(FileAction::SetPermissions, dst, e))
}

#[cfg(unix)]
pub(crate) fn apply_mode(permissions: &mut fs::Permissions, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(mode & 0o7777);
}

#[cfg(not(unix))]
pub(crate) fn apply_mode(permissions: &mut fs::Permissions, mode: u32) {
    permissions.set_readonly(mode & 0o200 == 0);
}

/// Create a symlink at `path` pointing to `link`, replacing whatever `path` was
pub fn symlink(link: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<(), FileError> {
    let (link, path) = (link.as_ref(), path.as_ref());
    if let Ok(meta) = fs::symlink_metadata(path) {
        let removed = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        removed.map_err(|e| FileError::new(FileAction::Remove, path, e))?;
    }
    create_symlink(link, path).map_err(|e| FileError::new(FileAction::Symlink, path, e))
}

#[cfg(unix)]
fn create_symlink(link: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, path)
}

#[cfg(windows)]
fn create_symlink(link: &Path, path: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(link, path)
}

/// Recursively copy the tree at `src` into `dst`.
///
/// Existing files are overwritten. Symlinks are recreated with the same
/// target; sockets, fifos and devices are skipped with a warning.
pub fn copy_directory(dst: impl AsRef<Path>, src: impl AsRef<Path>) -> Result<(), FileError> {
    let (dst, src) = (dst.as_ref(), src.as_ref());
    let meta = fs::metadata(src).map_err(|e| FileError::new(FileAction::Stat, src, e))?;
    fs::create_dir_all(dst).map_err(|e| FileError::new(FileAction::CreateDir, dst, e))?;
    fs::set_permissions(dst, meta.permissions())
        .map_err(|e| FileError::new(FileAction::SetPermissions, dst, e))?;

    let entries = fs::read_dir(src).map_err(|e| FileError::new(FileAction::ReadDir, src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| FileError::new(FileAction::ReadDir, src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let kind = entry
            .file_type()
            .map_err(|e| FileError::new(FileAction::Stat, &from, e))?;

        if kind.is_dir() {
            copy_directory(&to, &from)?;
        } else if kind.is_file() {
            copy_file(&to, &from, None)?;
        } else if kind.is_symlink() {
            let target = fs::read_link(&from).map_err(|e| FileError::new(FileAction::Stat, &from, e))?;
            symlink(target, &to)?;
        } else {
            tracing::warn!(path = %from.display(), "[pipewright:files] ignoring irregular file type");
        }
    }
    Ok(())
}

/// Newest modification time among every path matched by `patterns`.
///
/// `None` when nothing matches or any pattern is malformed. Matched paths
/// that cannot be stat'ed are ignored.
pub fn latest_timestamp<I, S>(patterns: I) -> Option<SystemTime>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut latest: Option<SystemTime> = None;
    for pattern in patterns {
        let matches = glob::glob(pattern.as_ref()).ok()?;
        for path in matches.flatten() {
            if let Some(modified) = modified(&path) {
                latest = Some(latest.map_or(modified, |current| current.max(modified)));
            }
        }
    }
    latest
}

/// True when some source is newer than `target`.
///
/// A missing target needs an update as soon as any source exists; with no
/// matching sources nothing needs updating.
pub fn target_needs_update<I, S>(target: impl AsRef<Path>, sources: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match (latest_timestamp(sources), modified(target.as_ref())) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(newest), Some(built)) => newest > built,
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Absolute form of `path`, resolved against `base` when relative
pub(crate) fn absolute_from(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &str, age: Duration) {
        fs::write(path, contents).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn pattern(dir: &TempDir, glob: &str) -> String {
        dir.path().join(glob).to_string_lossy().into_owned()
    }

    #[test]
    fn test_target_older_than_source_needs_update() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("out.bin"), "old", Duration::from_secs(60));
        touch(&dir.path().join("a.rs"), "new", Duration::from_secs(1));
        assert!(target_needs_update(dir.path().join("out.bin"), [pattern(&dir, "*.rs")]));
    }

    #[test]
    fn test_target_newer_than_sources_is_fresh() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.rs"), "src", Duration::from_secs(60));
        touch(&dir.path().join("b.rs"), "src", Duration::from_secs(30));
        touch(&dir.path().join("out.bin"), "built", Duration::from_secs(1));
        assert!(!target_needs_update(dir.path().join("out.bin"), [pattern(&dir, "*.rs")]));
    }

    #[test]
    fn test_missing_target_and_missing_sources() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.rs"), "src", Duration::ZERO);
        assert!(target_needs_update(dir.path().join("missing"), [pattern(&dir, "*.rs")]));
        assert!(!target_needs_update(dir.path().join("missing"), [pattern(&dir, "*.none")]));
        assert!(!target_needs_update(dir.path().join("missing"), Vec::<String>::new()));
    }

    #[test]
    fn test_latest_timestamp_picks_newest_match() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("old.txt"), "", Duration::from_secs(120));
        touch(&dir.path().join("new.txt"), "", Duration::from_secs(5));
        let latest = latest_timestamp([pattern(&dir, "*.txt")]).unwrap();
        let newest = fs::metadata(dir.path().join("new.txt")).unwrap().modified().unwrap();
        assert_eq!(latest, newest);
        assert_eq!(latest_timestamp(["[unclosed"]), None);
    }

    #[test]
    fn test_copy_file_overwrites_and_applies_mode() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "fresh").unwrap();
        fs::write(&dst, "stale and longer").unwrap();
        copy_file(&dst, &src, Some(0o600)).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "fresh");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(fs::metadata(&dst).unwrap().permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn test_copy_file_missing_source_reports_open() {
        let dir = TempDir::new().unwrap();
        let err = copy_file(dir.path().join("dst"), dir.path().join("nope"), None).unwrap_err();
        assert_eq!(err.action, FileAction::Open);
        assert!(!exists(dir.path().join("dst")));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_directory_recreates_tree_and_symlinks() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir(src.path().join("nested")).unwrap();
        fs::write(src.path().join("nested/file.txt"), "deep").unwrap();
        fs::write(src.path().join("top.txt"), "top").unwrap();
        std::os::unix::fs::symlink("top.txt", src.path().join("link")).unwrap();

        let out = dst.path().join("copy");
        copy_directory(&out, src.path()).unwrap();
        assert_eq!(fs::read_to_string(out.join("nested/file.txt")).unwrap(), "deep");
        assert_eq!(fs::read_to_string(out.join("top.txt")).unwrap(), "top");
        assert_eq!(fs::read_link(out.join("link")).unwrap(), PathBuf::from("top.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("current");
        fs::write(&path, "placeholder").unwrap();
        symlink("v2", &path).unwrap();
        assert_eq!(fs::read_link(&path).unwrap(), PathBuf::from("v2"));
    }

    #[test]
    fn test_absolute_from_keeps_absolute_paths() {
        let base = Path::new("/work");
        assert_eq!(absolute_from(base, "src/main.rs"), PathBuf::from("/work/src/main.rs"));
        assert_eq!(absolute_from(base, "/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
