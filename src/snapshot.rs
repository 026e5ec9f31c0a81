//! Revision-pinned model snapshot materialization.
//!
//! Downloads a hub repository at a specific revision, resolves the revision
//! to a concrete commit for provenance, copies the selected files out of the
//! hub cache into a project-local directory (real files, no symlinks), and
//! records a lockfile with a SHA-256 digest and byte size for every
//! materialized file.

use glob::Pattern;
use hf_hub::api::sync::{Api, ApiError};
use hf_hub::{Repo, RepoType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid file pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("hub request failed: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("lockfile encoding failed: {0}")]
    Lockfile(#[from] serde_json::Error),
}

/// What to download and where to put it.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    /// Hub repository id, e.g. `org/name`.
    pub repo_id: String,
    /// Tag, branch or commit to pin. Resolved to a commit SHA before any
    /// file is fetched.
    pub revision: String,
    /// Glob patterns selecting files to include; empty means everything.
    pub include: Vec<String>,
    /// Glob patterns removing files from the selection.
    pub exclude: Vec<String>,
    /// Base destination directory; files land under `dest/<org>/<name>/`.
    pub dest: PathBuf,
}

/// One materialized file, as recorded in the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the snapshot directory.
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

/// Provenance record written next to the snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub repo: String,
    pub revision: String,
    pub resolved_commit: String,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub dest: String,
    pub files: Vec<FileRecord>,
}

impl Lockfile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct SnapshotManifest {
    /// Directory the snapshot was materialized into.
    pub dir: PathBuf,
    /// Path of the written lockfile.
    pub lock_path: PathBuf,
    pub lock: Lockfile,
}

/// Split a comma-separated pattern list, trimming whitespace and dropping
/// empty entries.
pub fn parse_patterns(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `name` survives the include/exclude filter. An empty include list
/// includes everything.
pub fn selected(name: &str, include: &[Pattern], exclude: &[Pattern]) -> bool {
    let included = include.is_empty() || include.iter().any(|p| p.matches(name));
    included && !exclude.iter().any(|p| p.matches(name))
}

/// Streamed SHA-256 of a file, hex-encoded.
pub fn sha256_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Materialize a pinned snapshot and write its lockfile.
///
/// The requested revision is first resolved to a commit SHA so the lockfile
/// records exactly what was downloaded even when the revision is a moving
/// branch or tag.
pub fn fetch(api: &Api, request: &SnapshotRequest) -> Result<SnapshotManifest, SnapshotError> {
    let include = compile_patterns(&request.include)?;
    let exclude = compile_patterns(&request.exclude)?;

    let repo = api.repo(Repo::with_revision(
        request.repo_id.clone(),
        RepoType::Model,
        request.revision.clone(),
    ));
    let repo_info = repo.info()?;
    let resolved_commit = repo_info.sha.clone();
    info!(
        "resolved {}@{} -> {}",
        request.repo_id, request.revision, resolved_commit
    );

    // Fetch against the resolved commit, not the moving revision.
    let pinned = api.repo(Repo::with_revision(
        request.repo_id.clone(),
        RepoType::Model,
        resolved_commit.clone(),
    ));

    let dir = request.dest.join(&request.repo_id);
    std::fs::create_dir_all(&dir)?;

    let mut files = Vec::new();
    for sibling in &repo_info.siblings {
        let name = sibling.rfilename.as_str();
        if !selected(name, &include, &exclude) {
            continue;
        }
        info!("fetching {name}");
        let cached = pinned.get(name)?;
        let local = dir.join(name);
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Copy out of the hub cache so the snapshot holds real files.
        let size = std::fs::copy(&cached, &local)?;
        files.push(FileRecord {
            path: name.to_string(),
            sha256: sha256_file(&local)?,
            size,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let lock = Lockfile {
        repo: request.repo_id.clone(),
        revision: request.revision.clone(),
        resolved_commit,
        include_patterns: request.include.clone(),
        exclude_patterns: request.exclude.clone(),
        dest: dir.display().to_string(),
        files,
    };
    let lock_path = lock_path_for(&dir);
    lock.write(&lock_path)?;

    Ok(SnapshotManifest {
        dir,
        lock_path,
        lock,
    })
}

/// Lockfile path for a snapshot directory: `models/org/name` ->
/// `models/org/name.lock.json`.
pub fn lock_path_for(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    dir.with_file_name(format!("{name}.lock.json"))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, SnapshotError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| SnapshotError::Pattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_trimmed_and_empties_dropped() {
        assert_eq!(
            parse_patterns("*.safetensors, *.json ,,"),
            vec!["*.safetensors".to_string(), "*.json".to_string()]
        );
        assert!(parse_patterns("").is_empty());
    }

    #[test]
    fn lock_path_sits_next_to_snapshot_dir() {
        assert_eq!(
            lock_path_for(Path::new("models/org/name")),
            PathBuf::from("models/org/name.lock.json")
        );
    }
}
