//! Workspace IO: build a [`FileTree`] from disk or a JSON snapshot, and
//! write changes back.
//!
//! Directory loading is gitignore-aware (via `ignore`) plus the configured
//! extra patterns. Files that are too large or not valid UTF-8 are skipped
//! with a warning. Write-back is atomic per file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use ignore::{WalkBuilder, overrides::OverrideBuilder};
use tracing::{debug, instrument, warn};

use crate::{
    core::tree::{FileId, FileKind, FileTree, path_segments},
    infra::config::WorkspaceConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError
{
    #[error("I/O error at {path}: {source}")]
    Io
    {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),

    #[error("malformed workspace snapshot {path}: {source}")]
    Snapshot
    {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("workspace snapshot {0} has inconsistent paths")]
    Inconsistent(PathBuf),
}

impl WorkspaceError
{
    fn io(
        path: &Path,
        source: io::Error,
    ) -> Self
    {
        Self::Io { path: path.to_path_buf(), source }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Load every non-ignored file under `root` into a fresh tree
#[instrument(skip(root, cfg), fields(root = %root.display()))]
pub fn load_dir(
    root: &Path,
    cfg: &WorkspaceConfig,
) -> Result<FileTree>
{
    let mut overrides = OverrideBuilder::new(root);
    for pattern in &cfg.ignore_patterns
    {
        // Overrides are whitelists; a leading '!' turns a glob into an ignore.
        overrides.add(&format!("!{pattern}"))?;
    }

    let mut b = WalkBuilder::new(root);
    b.hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .overrides(overrides.build()?)
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut tree = FileTree::new();
    for entry in b.build()
    {
        let entry = match entry
        {
            Ok(e) => e,
            Err(err) =>
            {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.depth() == 0
        {
            continue;
        }

        let abs = entry.path();
        let Some(rel) = relative_slash_path(root, abs)
        else
        {
            continue;
        };
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        if is_dir
        {
            tree.ensure_folder_path(&rel);
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > cfg.max_file_bytes
        {
            warn!(path = %rel, size, "file exceeds max_file_bytes; skipped");
            continue;
        }

        let bytes = fs::read(abs).map_err(|e| WorkspaceError::io(abs, e))?;
        let Ok(text) = String::from_utf8(bytes)
        else
        {
            warn!(path = %rel, "not valid UTF-8; skipped");
            continue;
        };

        let (dir, name) = match rel.rsplit_once('/')
        {
            Some((dir, name)) => (dir, name),
            None => ("", rel.as_str()),
        };
        let parent = tree.ensure_folder_path(dir);
        tree.insert_file(name, parent.as_ref(), text);
    }

    debug!(entities = tree.len(), "workspace loaded");
    Ok(tree)
}

/// `abs` relative to `root`, `/`-separated
fn relative_slash_path(
    root: &Path,
    abs: &Path,
) -> Option<String>
{
    let rel = abs.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

pub fn load_snapshot(path: &Path) -> Result<FileTree>
{
    let raw = fs::read_to_string(path).map_err(|e| WorkspaceError::io(path, e))?;
    let tree: FileTree = serde_json::from_str(&raw)
        .map_err(|source| WorkspaceError::Snapshot { path: path.to_path_buf(), source })?;
    if !tree.is_consistent()
    {
        return Err(WorkspaceError::Inconsistent(path.to_path_buf()));
    }
    Ok(tree)
}

pub fn save_snapshot(
    path: &Path,
    tree: &FileTree,
) -> Result<()>
{
    let json = serde_json::to_string_pretty(tree)
        .map_err(|source| WorkspaceError::Snapshot { path: path.to_path_buf(), source })?;
    write_atomic(path, json.as_bytes()).map_err(|e| WorkspaceError::io(path, e))
}

/// Whether `path` (`/`-rooted, tree style) names anything under `root`,
/// loaded or not
pub fn exists_on_disk(
    root: &Path,
    path: &str,
) -> bool
{
    let mut dest = root.to_path_buf();
    dest.extend(path_segments(path));
    dest != root && fs::symlink_metadata(&dest).is_ok()
}

/// Write the listed entities of `tree` under `root`. Folders are created,
/// files written atomically. Returns the paths written.
pub fn write_back<'a>(
    root: &Path,
    tree: &FileTree,
    ids: impl IntoIterator<Item = &'a FileId>,
) -> Result<Vec<PathBuf>>
{
    let mut written = Vec::new();
    for id in ids
    {
        let Some(entity) = tree.get(id)
        else
        {
            continue;
        };
        let mut dest = root.to_path_buf();
        dest.extend(path_segments(&entity.path));

        match entity.kind
        {
            FileKind::Folder =>
            {
                fs::create_dir_all(&dest).map_err(|e| WorkspaceError::io(&dest, e))?;
            }
            FileKind::File =>
            {
                if let Some(parent) = dest.parent()
                {
                    fs::create_dir_all(parent).map_err(|e| WorkspaceError::io(parent, e))?;
                }
                let content = entity.content.as_deref().unwrap_or_default();
                write_atomic(&dest, content.as_bytes()).map_err(|e| WorkspaceError::io(&dest, e))?;
                debug!(path = %dest.display(), "written");
                written.push(dest);
            }
        }
    }
    Ok(written)
}

/// Replace `path` with `data` via a same-directory temp file
fn write_atomic(
    path: &Path,
    data: &[u8],
) -> io::Result<()>
{
    use std::io::Write;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    // Preserve original permissions
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = match tempfile::NamedTempFile::new_in(dir)
    {
        Ok(t) => t,
        Err(_) => tempfile::NamedTempFile::new()?, // fallback to /tmp
    };

    let mut file = tmp.as_file();
    file.write_all(data)?;
    file.sync_all()?;

    if let Some(perms) = perms
    {
        fs::set_permissions(tmp.path(), perms)?;
    }

    match tmp.persist(path)
    {
        Ok(_) => Ok(()),
        Err(e) =>
        {
            // Different filesystem? Copy instead
            fs::copy(e.file.path(), path)?;
            Ok(())
        }
    }
}
