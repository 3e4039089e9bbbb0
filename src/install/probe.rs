// src/install/probe.rs

//! Executable search-path lookup.
//!
//! The installer never calls `which` directly; it goes through a
//! [`PathProbe`] so tests can point it at a scratch directory instead of the
//! real `PATH`.

use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Looks up an executable by name.
pub trait PathProbe: Send + Sync + Debug {
    fn find(&self, name: &str) -> Option<PathBuf>;
}

/// Probe backed by the process `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemPath;

impl PathProbe for SystemPath {
    fn find(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

/// Probe restricted to an explicit list of directories.
#[derive(Debug, Clone)]
pub struct SearchPath {
    paths: OsString,
    cwd: PathBuf,
}

impl SearchPath {
    pub fn new<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().map(|d| d.as_ref().to_path_buf()).collect();
        let paths = std::env::join_paths(&dirs)
            .with_context(|| format!("joining search path from {:?}", dirs))?;
        let cwd = dirs.first().cloned().unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { paths, cwd })
    }
}

impl PathProbe for SearchPath {
    fn find(&self, name: &str) -> Option<PathBuf> {
        which::which_in(name, Some(&self.paths), &self.cwd).ok()
    }
}

/// Return the first candidate the probe can resolve, with its full path.
pub fn first_match<S: AsRef<str>>(
    probe: &dyn PathProbe,
    candidates: &[S],
) -> Option<(String, PathBuf)> {
    candidates.iter().find_map(|name| {
        let name = name.as_ref();
        probe.find(name).map(|path| (name.to_string(), path))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn first_match_respects_candidate_order() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(dir.path(), "toolB");
        let a = make_executable(dir.path(), "toolA");

        let probe = SearchPath::new([dir.path()]).unwrap();
        let hit = first_match(&probe, &["toolA", "toolB"]);

        assert_eq!(hit, Some(("toolA".to_string(), a)));
    }

    #[test]
    fn non_executable_files_are_not_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("toolA"), "data").unwrap();

        let probe = SearchPath::new([dir.path()]).unwrap();
        assert!(first_match(&probe, &["toolA"]).is_none());
    }
}
