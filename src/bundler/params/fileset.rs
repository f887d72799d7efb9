use crate::bundler::error::{ErrorExt, Result};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

/// Files addressed relative to a common base directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelativeFileSet {
    base: PathBuf,
    files: BTreeSet<PathBuf>,
}

impl RelativeFileSet {
    /// Creates a set from relative paths.
    pub fn new<I, P>(base: impl Into<PathBuf>, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            base: base.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// Collects every regular file below `base`.
    pub fn from_dir(base: &Path) -> Result<Self> {
        let mut files = BTreeSet::new();
        for entry in walkdir::WalkDir::new(base).follow_links(true) {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.insert(entry.path().strip_prefix(base)?.to_path_buf());
            }
        }
        Ok(Self {
            base: base.to_path_buf(),
            files,
        })
    }

    /// A set holding one file, based at its parent directory.
    pub fn single(file: &Path) -> Result<Self> {
        let name = file.file_name().map(PathBuf::from).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
        });
        let name = name.fs_context("resolving file name", file)?;
        let base = file.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(base, [name]))
    }

    /// Base directory.
    pub fn base_directory(&self) -> &Path {
        &self.base
    }

    /// Paths relative to the base directory.
    pub fn included_files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Absolute (base-joined) paths.
    pub fn resolved_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|f| self.base.join(f))
    }

    /// Whether `relative` is part of the set.
    pub fn contains(&self, relative: &Path) -> bool {
        self.files.contains(relative)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
