//! Local directory file-tree provider.
//!
//! The repository identifier is a directory path. Listing returns one
//! directory level at a time in file-name order, so a walk over a local
//! checkout is deterministic. Paths handed to the ingestor are relative
//! to the repository root and `/`-separated on every platform.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use repo_qa_core::ingest::{FileEntry, FileTreeProvider, TreeEntry};

use crate::config::IngestConfig;

pub struct LocalTree {
    exclude: GlobSet,
}

impl LocalTree {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            exclude: build_globset(&config.exclude_globs)?,
        })
    }

    /// A directory is excluded when anything inside it would be.
    fn is_excluded(&self, relative: &str, is_dir: bool) -> bool {
        if is_dir {
            self.exclude.is_match(relative) || self.exclude.is_match(format!("{}/_", relative))
        } else {
            self.exclude.is_match(relative)
        }
    }
}

#[async_trait]
impl FileTreeProvider for LocalTree {
    async fn list(&self, repo: &str, path: &str) -> Result<Vec<TreeEntry>> {
        let root = Path::new(repo);
        if !root.is_dir() {
            bail!("Repository directory does not exist: {}", root.display());
        }
        let dir = root.join(path);

        let mut entries = Vec::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            let relative = relative_path(root, entry.path());
            let file_type = entry.file_type();

            if self.is_excluded(&relative, file_type.is_dir()) {
                continue;
            }

            if file_type.is_dir() {
                entries.push(TreeEntry::Dir { path: relative });
            } else if file_type.is_file() {
                let size = entry
                    .metadata()
                    .with_context(|| format!("Failed to stat {}", entry.path().display()))?
                    .len();
                entries.push(TreeEntry::File(FileEntry {
                    path: relative,
                    name: entry.file_name().to_string_lossy().to_string(),
                    size,
                }));
            }
        }

        Ok(entries)
    }

    async fn fetch(&self, repo: &str, file: &FileEntry) -> Result<Vec<u8>> {
        let path: PathBuf = Path::new(repo).join(&file.path);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid exclude glob: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}
