//! Path resolution: map an assistant-supplied path onto one file in the tree
//!
//! Tiers, first hit wins; within a tier the first file in tree iteration
//! order wins:
//! 1. `path == p`
//! 2. `path == "/" + p`
//! 3. `name == p`
//! 4. `path` ends with `p`; with [`ResolveOptions::segment_suffix`] the
//!    suffix must also start at a `/` boundary, so `b.ts` stops matching
//!    `/a/bb.ts`
//!
//! Only `FileKind::File` entities are eligible.

use crate::core::tree::{FileEntity, FileTree};

/// Which rule produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveTier {
    ExactPath,
    RootedPath,
    Name,
    Suffix,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub entity: &'a FileEntity,
    pub tier: ResolveTier,
    /// Other files that satisfied the same tier (silently passed over)
    pub shadowed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Require tier-4 suffixes to align with a path segment
    pub segment_suffix: bool,
}

/// Clean up common path noise: whitespace, backslashes, leading `./`
pub fn clean_request(raw: &str) -> String {
    let mut p = raw.trim().replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    p
}

fn suffix_matches(path: &str, wanted: &str, segment: bool) -> bool {
    if !segment || wanted.starts_with('/') {
        return path.ends_with(wanted);
    }
    path.strip_suffix(wanted)
        .is_some_and(|head| head.is_empty() || head.ends_with('/'))
}

fn tier_matches(
    entity: &FileEntity,
    wanted: &str,
    tier: ResolveTier,
    opts: ResolveOptions,
) -> bool {
    match tier {
        ResolveTier::ExactPath => entity.path == wanted,
        ResolveTier::RootedPath => entity.path.strip_prefix('/') == Some(wanted),
        ResolveTier::Name => entity.name == wanted,
        ResolveTier::Suffix => suffix_matches(&entity.path, wanted, opts.segment_suffix),
    }
}

const TIERS: [ResolveTier; 4] = [
    ResolveTier::ExactPath,
    ResolveTier::RootedPath,
    ResolveTier::Name,
    ResolveTier::Suffix,
];

/// Resolve `file_path` to a file entity, or `None` when nothing matches.
pub fn resolve<'a>(tree: &'a FileTree, file_path: &str) -> Option<Resolved<'a>> {
    resolve_with(tree, file_path, ResolveOptions::default())
}

pub fn resolve_with<'a>(
    tree: &'a FileTree,
    file_path: &str,
    opts: ResolveOptions,
) -> Option<Resolved<'a>> {
    let wanted = clean_request(file_path);
    if wanted.is_empty() {
        return None;
    }

    for tier in TIERS {
        let mut hits = tree.files().filter(|e| tier_matches(e, &wanted, tier, opts));
        if let Some(entity) = hits.next() {
            let shadowed = hits.count();
            if shadowed > 0 {
                tracing::debug!(
                    path = %wanted,
                    ?tier,
                    shadowed,
                    "ambiguous path; taking first in tree order"
                );
            }
            return Some(Resolved {
                entity,
                tier,
                shadowed,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(paths: &[&str]) -> FileTree {
        let mut tree = FileTree::new();
        for p in paths {
            let (dir, name) = p.rsplit_once('/').unwrap();
            let parent = tree.ensure_folder_path(dir);
            tree.insert_file(name, parent.as_ref(), "");
        }
        tree
    }

    #[test]
    fn exact_and_rooted_paths() {
        let tree = tree_with(&["/src/app.ts"]);
        let r = resolve(&tree, "/src/app.ts").unwrap();
        assert_eq!(r.tier, ResolveTier::ExactPath);
        let r = resolve(&tree, "src/app.ts").unwrap();
        assert_eq!(r.tier, ResolveTier::RootedPath);
        let r = resolve(&tree, "./src/app.ts").unwrap();
        assert_eq!(r.tier, ResolveTier::RootedPath);
    }

    #[test]
    fn root_name_beats_nested_suffix() {
        let tree = tree_with(&["/a/b.ts", "/b.ts"]);
        let r = resolve(&tree, "b.ts").unwrap();
        assert_eq!(r.entity.path, "/b.ts");
        assert_eq!(r.tier, ResolveTier::RootedPath);
    }

    #[test]
    fn name_tier_finds_nested_file() {
        let tree = tree_with(&["/a/b.ts"]);
        let r = resolve(&tree, "b.ts").unwrap();
        assert_eq!(r.entity.path, "/a/b.ts");
        assert_eq!(r.tier, ResolveTier::Name);
    }

    #[test]
    fn suffix_tier_is_a_plain_ends_with() {
        let tree = tree_with(&["/a/bb.ts"]);
        let r = resolve(&tree, "b.ts").unwrap();
        assert_eq!(r.entity.path, "/a/bb.ts");
        assert_eq!(r.tier, ResolveTier::Suffix);

        let tree = tree_with(&["/pkg/xlib/util.ts", "/pkg/src/lib/util.ts"]);
        let r = resolve(&tree, "lib/util.ts").unwrap();
        assert_eq!(r.entity.path, "/pkg/xlib/util.ts");
        assert_eq!(r.shadowed, 1);
    }

    #[test]
    fn segment_suffix_requires_a_boundary() {
        let opts = ResolveOptions { segment_suffix: true };
        let tree = tree_with(&["/pkg/xlib/util.ts", "/pkg/src/lib/util.ts"]);
        let r = resolve_with(&tree, "lib/util.ts", opts).unwrap();
        assert_eq!(r.entity.path, "/pkg/src/lib/util.ts");
        assert_eq!(r.tier, ResolveTier::Suffix);

        let tree = tree_with(&["/a/bb.ts"]);
        assert!(resolve_with(&tree, "b.ts", opts).is_none());
    }

    #[test]
    fn first_in_tree_order_wins_within_a_tier() {
        let tree = tree_with(&["/x/mod.rs", "/y/mod.rs"]);
        let r = resolve(&tree, "mod.rs").unwrap();
        assert_eq!(r.entity.path, "/x/mod.rs");
        assert_eq!(r.shadowed, 1);
    }

    #[test]
    fn folders_are_never_targets() {
        let mut tree = FileTree::new();
        tree.insert_folder("src", None);
        assert!(resolve(&tree, "src").is_none());
        assert!(resolve(&tree, "/src").is_none());
        assert!(resolve(&tree, "   ").is_none());
    }

    #[test]
    fn backslashes_are_normalized() {
        let tree = tree_with(&["/src/main.rs"]);
        assert!(resolve(&tree, "src\\main.rs").is_some());
    }
}
