//! Virtual file tree: the in-memory hierarchy of files and folders
//!
//! Entities live in an insertion-ordered map, so "tree iteration order" is
//! well defined and every first-match tie-break in the resolver is
//! deterministic. Paths are `/`-rooted and always equal the join of the
//! names along the `parent_id` chain.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of a tree node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

/// A node in the virtual file tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntity {
    pub id: FileId,
    /// Leaf name including extension
    pub name: String,
    /// Fully-qualified path from root, e.g. `/src/main.ts`
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Text (or data URI) for files; always `None` for folders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Containing folder; `None` means root
    #[serde(default)]
    pub parent_id: Option<FileId>,
}

impl FileEntity {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

/// Language tag derived from the extension, `plaintext` when there is none
pub fn language_for(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_string(),
        _ => "plaintext".to_string(),
    }
}

/// Join a parent path and a leaf name
fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{}/{}", p.trim_end_matches('/'), name),
        None => format!("/{name}"),
    }
}

/// Split a slash path into its non-empty segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree {
    entries: IndexMap<FileId, FileEntity>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &FileId) -> Option<&FileEntity> {
        self.entries.get(id)
    }

    /// All entities in iteration order
    pub fn iter(&self) -> impl Iterator<Item = &FileEntity> {
        self.entries.values()
    }

    /// File entities only, in iteration order
    pub fn files(&self) -> impl Iterator<Item = &FileEntity> {
        self.entries.values().filter(|e| e.is_file())
    }

    pub fn find_by_path(&self, path: &str) -> Option<&FileEntity> {
        self.entries.values().find(|e| e.path == path)
    }

    fn fresh_id(&self) -> FileId {
        loop {
            let id = FileId(format!("{:016x}", rand::random::<u64>()));
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    fn parent_path(&self, parent: Option<&FileId>) -> Option<String> {
        parent
            .and_then(|p| self.entries.get(p))
            .map(|p| p.path.clone())
    }

    /// Insert a new file under `parent` (root when `None`)
    pub fn insert_file(
        &mut self,
        name: &str,
        parent: Option<&FileId>,
        content: impl Into<String>,
    ) -> FileId {
        let id = self.fresh_id();
        let path = join_path(self.parent_path(parent).as_deref(), name);
        self.entries.insert(
            id.clone(),
            FileEntity {
                id: id.clone(),
                name: name.to_string(),
                path,
                kind: FileKind::File,
                content: Some(content.into()),
                language: Some(language_for(name)),
                parent_id: parent.cloned(),
            },
        );
        id
    }

    /// Insert a new folder under `parent` (root when `None`)
    pub fn insert_folder(&mut self, name: &str, parent: Option<&FileId>) -> FileId {
        let id = self.fresh_id();
        let path = join_path(self.parent_path(parent).as_deref(), name);
        self.entries.insert(
            id.clone(),
            FileEntity {
                id: id.clone(),
                name: name.to_string(),
                path,
                kind: FileKind::Folder,
                content: None,
                language: None,
                parent_id: parent.cloned(),
            },
        );
        id
    }

    /// Walk `path` from the root, creating any missing folders.
    /// Returns the id of the deepest folder, or `None` for the root itself.
    pub fn ensure_folder_path(&mut self, path: &str) -> Option<FileId> {
        let mut parent: Option<FileId> = None;
        let mut current = String::new();
        for seg in path_segments(path) {
            current.push('/');
            current.push_str(seg);
            let existing = self
                .entries
                .values()
                .find(|e| e.kind == FileKind::Folder && e.path == current)
                .map(|e| e.id.clone());
            parent = Some(match existing {
                Some(id) => id,
                None => self.insert_folder(seg, parent.as_ref()),
            });
        }
        parent
    }

    /// Overwrite the content of a file. Returns false for unknown ids and folders.
    pub fn set_content(&mut self, id: &FileId, content: impl Into<String>) -> bool {
        match self.entries.get_mut(id) {
            Some(entity) if entity.is_file() => {
                entity.content = Some(content.into());
                true
            }
            _ => false,
        }
    }

    /// Remove an entity and, for folders, every descendant.
    /// Returns the removed ids.
    pub fn remove(&mut self, id: &FileId) -> Vec<FileId> {
        if !self.entries.contains_key(id) {
            return Vec::new();
        }
        let mut doomed = vec![id.clone()];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i].clone();
            doomed.extend(
                self.entries
                    .values()
                    .filter(|e| e.parent_id.as_ref() == Some(&parent))
                    .map(|e| e.id.clone()),
            );
            i += 1;
        }
        for d in &doomed {
            self.entries.shift_remove(d);
        }
        doomed
    }

    /// Rebuild a path by walking parent links.
    /// `None` if the chain is broken or cyclic.
    pub fn derive_path(&self, id: &FileId) -> Option<String> {
        let mut names = Vec::new();
        let mut cur = self.entries.get(id);
        while let Some(entity) = cur {
            if names.len() > self.entries.len() {
                return None;
            }
            names.push(entity.name.as_str());
            cur = match &entity.parent_id {
                Some(p) => Some(self.entries.get(p)?),
                None => None,
            };
        }
        if names.is_empty() {
            return None;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    /// Check the structural invariants: every path is derivable from the
    /// parent chain (which also rules out cycles) and paths are unique.
    pub fn is_consistent(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.entries.values().all(|e| {
            seen.insert(e.path.as_str()) && self.derive_path(&e.id).as_deref() == Some(&e.path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_parent_chain() {
        let mut tree = FileTree::new();
        let src = tree.insert_folder("src", None);
        let util = tree.insert_folder("util", Some(&src));
        let f = tree.insert_file("helpers.ts", Some(&util), "export {}");

        assert_eq!(tree.get(&f).unwrap().path, "/src/util/helpers.ts");
        assert_eq!(tree.derive_path(&f).as_deref(), Some("/src/util/helpers.ts"));
        assert_eq!(tree.get(&f).unwrap().language.as_deref(), Some("ts"));
        assert!(tree.is_consistent());
    }

    #[test]
    fn ensure_folder_path_reuses_existing_folders() {
        let mut tree = FileTree::new();
        let a = tree.ensure_folder_path("/src/utils").unwrap();
        let b = tree.ensure_folder_path("src/utils/").unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.ensure_folder_path("/"), None);
    }

    #[test]
    fn remove_cascades_to_descendants() {
        let mut tree = FileTree::new();
        let src = tree.insert_folder("src", None);
        let nested = tree.insert_folder("nested", Some(&src));
        tree.insert_file("a.rs", Some(&nested), "");
        tree.insert_file("b.rs", Some(&src), "");
        let keep = tree.insert_file("README.md", None, "");

        let removed = tree.remove(&src);
        assert_eq!(removed.len(), 4);
        assert_eq!(tree.len(), 1);
        assert!(tree.get(&keep).is_some());
    }

    #[test]
    fn set_content_rejects_folders() {
        let mut tree = FileTree::new();
        let dir = tree.insert_folder("src", None);
        let file = tree.insert_file("a.txt", None, "old");
        assert!(!tree.set_content(&dir, "x"));
        assert!(tree.set_content(&file, "new"));
        assert_eq!(tree.get(&file).unwrap().content.as_deref(), Some("new"));
    }

    #[test]
    fn language_defaults_to_plaintext() {
        assert_eq!(language_for("Makefile"), "plaintext");
        assert_eq!(language_for("main.rs"), "rs");
        assert_eq!(language_for("trailing."), "plaintext");
    }

    #[test]
    fn json_uses_workspace_export_shape() {
        let mut tree = FileTree::new();
        tree.insert_file("welcome.md", None, "# hi");
        let json = serde_json::to_value(&tree).unwrap();
        let entry = json.as_object().unwrap().values().next().unwrap();
        assert_eq!(entry["type"], "file");
        assert_eq!(entry["path"], "/welcome.md");
        assert!(entry["parentId"].is_null());

        let back: FileTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }
}
