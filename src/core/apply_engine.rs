//! Patch applier: resolve, locate, mutate
//!
//! The authoritative text of a target comes from one of two sources, chosen
//! by the caller's context: the live editor buffer when the target is the
//! active document, otherwise the stored snapshot in the tree. Both sit
//! behind [`TextSource`], so the edit path itself never branches on it.
//!
//! Every call resolves to an [`ApplyOutcome`]; on failure nothing changes.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    core::{
        buffer::{EditorBuffer, Position, TextRange},
        edit::{ActionKind, AgentAction, ApplyFailure, ApplyOutcome, FileCreate, FileEdit},
        locate::{LocateOptions, locate},
        normalize::{contains_loosely, has_lone_cr, newline_at, normalize_line_endings},
        resolve::{ResolveOptions, clean_request, resolve_with},
        tree::{FileId, FileKind, FileTree, path_segments},
    },
    infra::line_index::NewlineIndex,
};

/// What to do when a create targets an existing path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CreatePolicy
{
    /// Leave the existing file alone and report a collision
    #[default]
    Reject,
    /// Replace the existing file's content in place
    Overwrite,
    /// Pick the first free `stem-N.ext` name
    Rename,
}

/// Engine switches, passed explicitly (never read from ambient config)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOptions
{
    pub relaxed_match: bool,
    pub create_policy: CreatePolicy,
    /// Honor nested create paths by creating intermediate folders
    pub create_parents: bool,
    /// Suffix resolution only at `/` boundaries
    pub segment_suffix: bool,
}

impl Default for ApplyOptions
{
    fn default() -> Self
    {
        Self {
            relaxed_match: true,
            create_policy: CreatePolicy::Reject,
            create_parents: true,
            segment_suffix: false,
        }
    }
}

/// The open document in the editor, if any
pub struct ActiveDocument<'a>
{
    pub file_id: FileId,
    pub buffer: &'a mut dyn EditorBuffer,
}

/// Tells whether a `/`-rooted path is taken by something the tree does not
/// hold (an ignored or skipped file on disk)
pub type OccupiedCheck<'a> = &'a dyn Fn(&str) -> bool;

/// Everything `apply` may read or mutate
pub struct ApplierContext<'a>
{
    pub tree: &'a mut FileTree,
    pub active: Option<ActiveDocument<'a>>,
    pub occupied: Option<OccupiedCheck<'a>>,
}

impl<'a> ApplierContext<'a>
{
    pub fn new(tree: &'a mut FileTree) -> Self
    {
        Self { tree, active: None, occupied: None }
    }

    pub fn with_occupied(
        mut self,
        check: OccupiedCheck<'a>,
    ) -> Self
    {
        self.occupied = Some(check);
        self
    }

    /// Taken in the tree or, per the occupied check, outside it
    fn is_taken(
        &self,
        path: &str,
    ) -> bool
    {
        self.tree.find_by_path(path).is_some() || self.occupied.is_some_and(|check| check(path))
    }

    pub fn with_active(
        mut self,
        file_id: FileId,
        buffer: &'a mut dyn EditorBuffer,
    ) -> Self
    {
        self.active = Some(ActiveDocument { file_id, buffer });
        self
    }
}

/// Provider of a target's authoritative text
pub trait TextSource
{
    /// Current raw text (original line endings)
    fn current_text(&self) -> String;

    /// Replace `range` of the line-ending-normalized text with `replacement`
    /// (LF newlines). Returns false, leaving everything unchanged, if the
    /// range cannot be mapped back onto the raw text.
    fn splice(
        &mut self,
        normalized: &str,
        range: Range<usize>,
        replacement: &str,
    ) -> bool;

    /// Replace the whole text with `text` as given
    fn replace_all(
        &mut self,
        text: &str,
    ) -> bool;

    fn is_live(&self) -> bool;
}

/// Convert LF newlines to the style of the line holding byte `at` of
/// `original`
fn match_newlines(
    original: &str,
    at: usize,
    text: &str,
) -> String
{
    if newline_at(original, at) == "\r\n" { text.replace('\n', "\r\n") } else { text.to_string() }
}

/// Byte offset of `pos` in `text`
fn byte_of(
    text: &str,
    pos: Position,
) -> Option<usize>
{
    NewlineIndex::build(text).byte_of_position(pos.line, pos.column, text)
}

/// Live editor buffer adapter: edits become ranged replacements
pub struct LiveBuffer<'s, 'a>
{
    buffer: &'s mut (dyn EditorBuffer + 'a),
}

impl TextSource for LiveBuffer<'_, '_>
{
    fn current_text(&self) -> String
    {
        self.buffer.full_text()
    }

    fn splice(
        &mut self,
        normalized: &str,
        range: Range<usize>,
        replacement: &str,
    ) -> bool
    {
        let original = self.buffer.full_text();
        if has_lone_cr(&original)
        {
            // Positions disagree with the normalized text; fall back to a
            // whole-buffer replacement.
            let mut next = normalized.to_string();
            next.replace_range(range, replacement);
            let whole = TextRange::from_offsets(&original, 0, original.len());
            return whole.is_some_and(|r| self.buffer.replace_range(r, &next));
        }
        let Some(target) = TextRange::from_offsets(normalized, range.start, range.end)
        else
        {
            return false;
        };
        let Some(at) = byte_of(&original, target.start)
        else
        {
            return false;
        };
        self.buffer.replace_range(target, &match_newlines(&original, at, replacement))
    }

    fn replace_all(
        &mut self,
        text: &str,
    ) -> bool
    {
        let original = self.buffer.full_text();
        TextRange::from_offsets(&original, 0, original.len())
            .is_some_and(|whole| self.buffer.replace_range(whole, text))
    }

    fn is_live(&self) -> bool
    {
        true
    }
}

/// Stored snapshot adapter: edits rewrite the entity's content
pub struct StoredSnapshot<'s>
{
    tree: &'s mut FileTree,
    id: FileId,
}

impl TextSource for StoredSnapshot<'_>
{
    fn current_text(&self) -> String
    {
        self.tree.get(&self.id).and_then(|e| e.content.clone()).unwrap_or_default()
    }

    fn splice(
        &mut self,
        normalized: &str,
        range: Range<usize>,
        replacement: &str,
    ) -> bool
    {
        let original = self.current_text();
        if has_lone_cr(&original)
        {
            let mut next = normalized.to_string();
            next.replace_range(range, replacement);
            return self.tree.set_content(&self.id, next);
        }

        // Map through (line, column) so CRLF content keeps its newlines.
        let Some(target) = TextRange::from_offsets(normalized, range.start, range.end)
        else
        {
            return false;
        };
        let (Some(start), Some(end)) = (byte_of(&original, target.start), byte_of(&original, target.end))
        else
        {
            return false;
        };

        let mut next = original.clone();
        next.replace_range(start..end, &match_newlines(&original, start, replacement));
        self.tree.set_content(&self.id, next)
    }

    fn replace_all(
        &mut self,
        text: &str,
    ) -> bool
    {
        self.tree.set_content(&self.id, text.to_string())
    }

    fn is_live(&self) -> bool
    {
        false
    }
}

/// Severity of a log-panel entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel
{
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing status line produced by an apply run
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry
{
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry
{
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self
    {
        Self { level, message: message.into(), timestamp: Utc::now() }
    }
}

/// Per-action line of an [`ApplyReport`]
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport
{
    pub index: usize,
    pub kind: &'static str,
    pub target: String,
    /// `None` when skipped because the action was already applied
    pub outcome: Option<ApplyOutcome>,
}

/// Result of applying a batch of actions
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport
{
    pub actions: Vec<ActionReport>,
    pub log: Vec<LogEntry>,
}

impl ApplyReport
{
    pub fn applied(&self) -> usize
    {
        self.actions.iter().filter(|a| a.outcome.as_ref().is_some_and(|o| o.is_success())).count()
    }

    pub fn failed(&self) -> usize
    {
        self.actions.iter().filter(|a| a.outcome.as_ref().is_some_and(|o| !o.is_success())).count()
    }

    pub fn skipped(&self) -> usize
    {
        self.actions.iter().filter(|a| a.outcome.is_none()).count()
    }
}

/// Core patch engine
#[derive(Debug, Clone, Default)]
pub struct PatchApplier
{
    opts: ApplyOptions,
}

impl PatchApplier
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn from_options(opts: ApplyOptions) -> Self
    {
        Self { opts }
    }

    pub fn with_relaxed_match(
        mut self,
        enabled: bool,
    ) -> Self
    {
        self.opts.relaxed_match = enabled;
        self
    }

    pub fn with_create_policy(
        mut self,
        policy: CreatePolicy,
    ) -> Self
    {
        self.opts.create_policy = policy;
        self
    }

    pub fn with_create_parents(
        mut self,
        enabled: bool,
    ) -> Self
    {
        self.opts.create_parents = enabled;
        self
    }

    pub fn with_segment_suffix(
        mut self,
        enabled: bool,
    ) -> Self
    {
        self.opts.segment_suffix = enabled;
        self
    }

    pub fn options(&self) -> ApplyOptions
    {
        self.opts
    }

    /// Apply one action and set its `applied` flag from the outcome.
    ///
    /// Does not check whether the action was applied before; see
    /// [`PatchApplier::apply_pending`] for the guarded batch entry point.
    #[instrument(skip_all, fields(kind = action.kind_name(), target = action.target()))]
    pub fn apply(
        &self,
        action: &mut AgentAction,
        ctx: &mut ApplierContext<'_>,
    ) -> ApplyOutcome
    {
        let outcome = match &action.kind
        {
            ActionKind::Edit(edit) => self.apply_edit(edit, ctx),
            ActionKind::Create(create) => self.apply_create(create, ctx),
        };
        action.applied = outcome.is_success();

        match &outcome
        {
            ApplyOutcome::Failed(f) => warn!(reason = %f, "action not applied"),
            ok => info!(outcome = %ok.message(), "action applied"),
        }
        outcome
    }

    /// Apply every action that is not yet applied, in order. Failures do not
    /// stop the batch and nothing is rolled back.
    pub fn apply_pending(
        &self,
        actions: &mut [AgentAction],
        ctx: &mut ApplierContext<'_>,
    ) -> ApplyReport
    {
        let mut report = ApplyReport::default();
        for (index, action) in actions.iter_mut().enumerate()
        {
            let kind = action.kind_name();
            let target = action.target().to_string();

            if action.applied
            {
                debug!(index, %target, "already applied; skipping");
                report.log.push(LogEntry::new(
                    LogLevel::Info,
                    format!("Skipped {kind} of {target}: already applied"),
                ));
                report.actions.push(ActionReport { index, kind, target, outcome: None });
                continue;
            }

            let outcome = self.apply(action, ctx);
            let level = if outcome.is_success() { LogLevel::Success } else { LogLevel::Error };
            report.log.push(LogEntry::new(level, outcome.message()));
            report.actions.push(ActionReport { index, kind, target, outcome: Some(outcome) });
        }
        report
    }

    fn apply_edit(
        &self,
        edit: &FileEdit,
        ctx: &mut ApplierContext<'_>,
    ) -> ApplyOutcome
    {
        let resolve_opts = ResolveOptions { segment_suffix: self.opts.segment_suffix };
        let Some(resolved) = resolve_with(ctx.tree, &edit.file_path, resolve_opts)
        else
        {
            return ApplyOutcome::Failed(ApplyFailure::TargetNotFound {
                path: edit.file_path.clone(),
            });
        };
        let id = resolved.entity.id.clone();
        let path = resolved.entity.path.clone();
        let name = resolved.entity.name.clone();
        debug!(%path, tier = ?resolved.tier, "resolved target");

        match ctx.active.as_mut()
        {
            Some(doc) if doc.file_id == id =>
            {
                let mut source = LiveBuffer { buffer: &mut *doc.buffer };
                self.edit_with(&mut source, edit, id, path, name)
            }
            _ =>
            {
                let mut source = StoredSnapshot { tree: &mut *ctx.tree, id: id.clone() };
                self.edit_with(&mut source, edit, id, path, name)
            }
        }
    }

    fn edit_with<S: TextSource>(
        &self,
        source: &mut S,
        edit: &FileEdit,
        id: FileId,
        path: String,
        name: String,
    ) -> ApplyOutcome
    {
        let current = source.current_text();
        let text = normalize_line_endings(&current);
        let search = normalize_line_endings(&edit.search);
        let replace = normalize_line_endings(&edit.replace);

        let opts = LocateOptions { relaxed: self.opts.relaxed_match };
        let mismatch = |near_miss| {
            ApplyOutcome::Failed(ApplyFailure::StructuralMismatch {
                path: path.clone(),
                name: name.clone(),
                near_miss,
            })
        };

        let Some(found) = locate(&text, &search, opts)
        else
        {
            return mismatch(contains_loosely(&text, &search));
        };
        debug!(start = found.start, len = found.len, strategy = ?found.strategy, "located");

        if !source.splice(&text, found.range(), &replace)
        {
            return mismatch(false);
        }

        ApplyOutcome::Edited {
            id,
            path: path.clone(),
            name: name.clone(),
            strategy: found.strategy,
            live: source.is_live(),
        }
    }

    fn apply_create(
        &self,
        create: &FileCreate,
        ctx: &mut ApplierContext<'_>,
    ) -> ApplyOutcome
    {
        let cleaned = clean_request(&create.path);
        let segments = path_segments(&cleaned);
        let Some((leaf, dirs)) = segments.split_last().filter(|_| !segments.contains(&".."))
        else
        {
            return ApplyOutcome::Failed(ApplyFailure::InvalidPath { path: create.path.clone() });
        };
        let dirs: &[&str] = if self.opts.create_parents { dirs } else { &[] };

        // Every check happens before the first mutation.
        let mut prefix = String::new();
        for dir in dirs
        {
            prefix.push('/');
            prefix.push_str(dir);
            if ctx.tree.find_by_path(&prefix).is_some_and(|e| e.kind == FileKind::File)
            {
                return ApplyOutcome::Failed(ApplyFailure::PathCollision { path: prefix });
            }
        }

        let dir_path = prefix;
        let full = format!("{dir_path}/{leaf}");
        let mut name = leaf.to_string();
        let mut overwritten = false;

        if ctx.is_taken(&full)
        {
            let existing = ctx.tree.find_by_path(&full).map(|e| (e.id.clone(), e.kind));
            match (self.opts.create_policy, existing)
            {
                (CreatePolicy::Overwrite, Some((id, FileKind::File))) =>
                {
                    if !overwrite(ctx, &id, &create.content)
                    {
                        return ApplyOutcome::Failed(ApplyFailure::PathCollision { path: full });
                    }
                    return ApplyOutcome::Created { id, path: full, overwritten: true };
                }
                (CreatePolicy::Overwrite, None) =>
                {
                    debug!(path = %full, "replacing a file the tree does not hold");
                    overwritten = true;
                }
                (CreatePolicy::Rename, _) =>
                {
                    name = free_name(ctx, &dir_path, leaf);
                    debug!(from = %full, to = %name, "renamed to avoid collision");
                }
                _ => return ApplyOutcome::Failed(ApplyFailure::PathCollision { path: full }),
            }
        }

        let parent = ctx.tree.ensure_folder_path(&dir_path);
        let id = ctx.tree.insert_file(&name, parent.as_ref(), create.content.clone());
        let path = ctx.tree.get(&id).map(|e| e.path.clone()).unwrap_or_default();
        ApplyOutcome::Created { id, path, overwritten }
    }
}

/// Replace a file wholesale. The open document, when it is the target, gets
/// a full-range edit so later edits read the new text.
fn overwrite(
    ctx: &mut ApplierContext<'_>,
    id: &FileId,
    content: &str,
) -> bool
{
    let live = match ctx.active.as_mut()
    {
        Some(doc) if doc.file_id == *id => LiveBuffer { buffer: &mut *doc.buffer }.replace_all(content),
        _ => true,
    };
    live && StoredSnapshot { tree: &mut *ctx.tree, id: id.clone() }.replace_all(content)
}

/// First `stem-N.ext` under `dir_path` that is not taken
fn free_name(
    ctx: &ApplierContext<'_>,
    dir_path: &str,
    leaf: &str,
) -> String
{
    let (stem, ext) = match leaf.rsplit_once('.')
    {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (leaf, String::new()),
    };
    (1..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !ctx.is_taken(&format!("{dir_path}/{candidate}")))
        .unwrap_or_else(|| leaf.to_string())
}
