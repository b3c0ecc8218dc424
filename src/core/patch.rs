//! Dry-run preview: apply actions to a scratch copy and render unified diffs
//!
//! The caller's tree and buffer are never touched. The active document, if
//! any, is mirrored into a scratch [`TextDocument`] so live-buffer routing
//! is previewed exactly as it would run.

use std::collections::HashMap;

use serde::Serialize;
use similar::TextDiff;

use crate::core::{
    apply_engine::{ApplierContext, OccupiedCheck, PatchApplier},
    buffer::TextDocument,
    edit::{AgentAction, ApplyOutcome},
    tree::{FileId, FileTree},
};

/// Lines of context around each hunk
pub const CONTEXT_LINES: usize = 3;

/// Rendered change to one file
#[derive(Debug, Clone, Serialize)]
pub struct FilePatch
{
    pub path: String,
    /// The file did not exist before this action
    pub created: bool,
    pub diff: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionPreview
{
    pub index: usize,
    pub kind: &'static str,
    pub target: String,
    /// `None` when the action was already applied
    pub outcome: Option<ApplyOutcome>,
    pub patch: Option<FilePatch>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreviewSet
{
    pub previews: Vec<ActionPreview>,
}

impl PreviewSet
{
    pub fn failures(&self) -> usize
    {
        self.previews.iter().filter(|p| p.outcome.as_ref().is_some_and(|o| !o.is_success())).count()
    }

    /// All diffs concatenated, in action order
    pub fn unified(&self) -> String
    {
        self.previews.iter().filter_map(|p| p.patch.as_ref()).map(|p| p.diff.as_str()).collect()
    }
}

/// Render a unified diff between two versions of `path`
pub fn unified_diff(
    path: &str,
    old: Option<&str>,
    new: &str,
) -> String
{
    let rel = path.trim_start_matches('/');
    let old_header = if old.is_some() { format!("a/{rel}") } else { "/dev/null".to_string() };
    TextDiff::from_lines(old.unwrap_or(""), new)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&old_header, &format!("b/{rel}"))
        .to_string()
}

/// Preview `actions` against `tree`, optionally with an open document
/// (`active` = its id and current buffer text).
pub fn preview(
    applier: &PatchApplier,
    actions: &[AgentAction],
    tree: &FileTree,
    active: Option<(&FileId, &str)>,
) -> PreviewSet
{
    preview_with(applier, actions, tree, active, None)
}

/// [`preview`], with paths outside the tree reported as taken by `occupied`
pub fn preview_with(
    applier: &PatchApplier,
    actions: &[AgentAction],
    tree: &FileTree,
    active: Option<(&FileId, &str)>,
    occupied: Option<OccupiedCheck<'_>>,
) -> PreviewSet
{
    let mut scratch = tree.clone();
    let mut doc = active.map(|(_, text)| TextDocument::new(text));
    let active_id = active.map(|(id, _)| id.clone());

    // Latest known text per file; falls back to the pristine tree.
    let mut seen: HashMap<FileId, String> = HashMap::new();
    if let (Some(id), Some(d)) = (&active_id, &doc)
    {
        seen.insert(id.clone(), d.text().to_string());
    }

    let mut set = PreviewSet::default();
    for (index, original) in actions.iter().enumerate()
    {
        let mut action = original.clone();
        let kind = action.kind_name();
        let target = action.target().to_string();

        if action.applied
        {
            set.previews.push(ActionPreview { index, kind, target, outcome: None, patch: None });
            continue;
        }

        let outcome = {
            let mut ctx = ApplierContext::new(&mut scratch);
            if let Some(check) = occupied
            {
                ctx = ctx.with_occupied(check);
            }
            if let (Some(id), Some(d)) = (&active_id, doc.as_mut())
            {
                ctx = ctx.with_active(id.clone(), d);
            }
            applier.apply(&mut action, &mut ctx)
        };

        let touched = match &outcome
        {
            ApplyOutcome::Edited { id, path, live, .. } =>
            {
                let after = if *live { doc.as_ref().map(|d| d.text().to_string()) } else { content(&scratch, id) };
                Some((id.clone(), path.clone(), after.unwrap_or_default()))
            }
            ApplyOutcome::Created { id, path, .. } =>
            {
                Some((id.clone(), path.clone(), content(&scratch, id).unwrap_or_default()))
            }
            ApplyOutcome::Failed(_) => None,
        };

        let patch = touched.map(|(id, path, after)| {
            let before = seen.get(&id).cloned().or_else(|| content(tree, &id));
            let diff = unified_diff(&path, before.as_deref(), &after);
            seen.insert(id, after);
            FilePatch { path, created: before.is_none(), diff }
        });

        set.previews.push(ActionPreview { index, kind, target, outcome: Some(outcome), patch });
    }
    set
}

fn content(
    tree: &FileTree,
    id: &FileId,
) -> Option<String>
{
    tree.get(id).and_then(|e| e.content.clone())
}
