//! Agent actions and their outcomes, plus the CLI command handlers
//!
//! An action is created once per assistant response and never edited; only
//! its `applied` flag changes, and only after a full successful mutation.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexSet;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::{
    cli::{AppContext, ApplyArgs, ExtractArgs, SnapshotArgs},
    core::{
        apply_engine::{ApplierContext, ApplyOptions, ApplyReport, LogEntry, LogLevel, PatchApplier},
        buffer::TextDocument,
        extract::extract,
        locate::MatchStrategy,
        normalize::generate_cid,
        patch::{PreviewSet, preview_with},
        resolve::{ResolveOptions, resolve_with},
        tree::{FileId, FileTree},
    },
    infra::{
        config::load_config,
        workspace::{
            WorkspaceError, exists_on_disk, load_dir, load_snapshot, save_snapshot, write_back,
        },
    },
};

/// Replace the first occurrence of `search` with `replace` in `file_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEdit {
    pub file_path: String,
    pub search: String,
    pub replace: String,
}

/// Materialize a new file at `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCreate {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ActionKind {
    Edit(FileEdit),
    Create(FileCreate),
}

/// A proposed change with its idempotence guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentAction {
    #[serde(flatten)]
    pub kind: ActionKind,
    pub applied: bool,
}

impl AgentAction {
    pub fn edit(edit: FileEdit) -> Self {
        Self {
            kind: ActionKind::Edit(edit),
            applied: false,
        }
    }

    pub fn create(create: FileCreate) -> Self {
        Self {
            kind: ActionKind::Create(create),
            applied: false,
        }
    }

    /// Path the action points at, as written by the assistant
    pub fn target(&self) -> &str {
        match &self.kind {
            ActionKind::Edit(e) => &e.file_path,
            ActionKind::Create(c) => &c.path,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ActionKind::Edit(_) => "edit",
            ActionKind::Create(_) => "create",
        }
    }
}

/// Why an action could not be applied. State is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyFailure {
    /// No file matches the path under any resolution rule
    #[error("Patch failed: File {path} not found")]
    TargetNotFound { path: String },

    /// Target found, but neither exact nor relaxed search located the block.
    /// `near_miss` is set when the block is present modulo trailing
    /// whitespace but does not align with whole lines.
    #[error("Structural mismatch during patch of {name}")]
    StructuralMismatch {
        path: String,
        name: String,
        near_miss: bool,
    },

    /// A create hit an existing file under the `reject` policy
    #[error("File already exists: {path}")]
    PathCollision { path: String },

    /// A create path with no usable file name
    #[error("Invalid file path: {path:?}")]
    InvalidPath { path: String },
}

/// Result of one `apply` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Edited {
        id: FileId,
        path: String,
        name: String,
        strategy: MatchStrategy,
        /// Edit went to the live editor buffer
        live: bool,
    },
    Created {
        id: FileId,
        path: String,
        /// An existing file's content was replaced in place
        overwritten: bool,
    },
    Failed(ApplyFailure),
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ApplyOutcome::Failed(_))
    }

    /// Message for a log/status panel
    pub fn message(&self) -> String {
        match self {
            ApplyOutcome::Edited {
                name,
                strategy: MatchStrategy::Exact,
                ..
            } => format!("Patch applied to {name}"),
            ApplyOutcome::Edited { name, .. } => format!("Fuzzy patch applied to {name}"),
            ApplyOutcome::Created {
                path,
                overwritten: false,
                ..
            } => format!("File created: {path}"),
            ApplyOutcome::Created { path, .. } => format!("File overwritten: {path}"),
            ApplyOutcome::Failed(f) => f.to_string(),
        }
    }
}

/// Exit-code taxonomy for the command layer
#[derive(thiserror::Error, Debug, Clone)]
pub enum CliError {
    /// Unreadable response, workspace or configuration
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// One or more actions could not be applied
    #[error("{0} action(s) failed to apply")]
    ActionsFailed(usize),

    /// Unexpected engine or IO failure
    #[error("internal error: {0}")]
    Internal(String),
}

/// 0=success, 2=action failed, 3=invalid input, 5=internal
pub fn exit_code_for(e: &CliError) -> i32 {
    match e {
        CliError::ActionsFailed(_) => 2,
        CliError::InvalidInput(_) => 3,
        CliError::Internal(_) => 5,
    }
}

/// Classify an error from a command handler
pub fn classify(e: anyhow::Error) -> CliError {
    if let Some(cli) = e.downcast_ref::<CliError>() {
        return cli.clone();
    }
    match e.downcast_ref::<WorkspaceError>() {
        Some(WorkspaceError::Io { .. }) | None => CliError::Internal(format!("{e:#}")),
        Some(_) => CliError::InvalidInput(format!("{e:#}")),
    }
}

/// Convert a handler result to a process exit
pub fn finish_with_exit(result: Result<()>) -> ! {
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let err = classify(e);
            eprintln!("error: {err}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn get_clipboard_content() -> Result<String> {
    use arboard::Clipboard;
    let mut clipboard = Clipboard::new().context("Failed to access clipboard")?;
    clipboard
        .get_text()
        .context("Failed to get text from clipboard")
}

/// Read the assistant response from a file, stdin (`-` or none) or the clipboard
fn read_response(input: Option<&Path>, from_clipboard: bool) -> Result<String> {
    let read = if from_clipboard {
        get_clipboard_content()
    } else {
        match input {
            Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read response {}", p.display())),
            _ => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read response from stdin")?;
                Ok(buf)
            }
        }
    };
    read.map_err(|e| CliError::InvalidInput(format!("{e:#}")).into())
}

/// Where the workspace came from, and so where it goes back to
enum Workspace {
    Dir(PathBuf),
    Snapshot(PathBuf),
}

impl Workspace {
    fn open(path: &Path, cfg: &crate::infra::config::WorkspaceConfig) -> Result<(Self, FileTree)> {
        if path.is_file() {
            let tree = load_snapshot(path)?;
            Ok((Workspace::Snapshot(path.to_path_buf()), tree))
        } else if path.is_dir() {
            let tree = load_dir(path, cfg)?;
            Ok((Workspace::Dir(path.to_path_buf()), tree))
        } else {
            Err(CliError::InvalidInput(format!(
                "workspace {} is neither a directory nor a snapshot file",
                path.display()
            ))
            .into())
        }
    }
}

fn level_tag(level: LogLevel, no_color: bool) -> String {
    let tag = match level {
        LogLevel::Info => "info",
        LogLevel::Success => "ok",
        LogLevel::Warning => "warn",
        LogLevel::Error => "fail",
    };
    if no_color {
        return format!("[{tag}]");
    }
    match level {
        LogLevel::Info => format!("[{}]", tag.blue()),
        LogLevel::Success => format!("[{}]", tag.green()),
        LogLevel::Warning => format!("[{}]", tag.yellow()),
        LogLevel::Error => format!("[{}]", tag.red()),
    }
}

fn print_log(entries: &[LogEntry], ctx: &AppContext) {
    for entry in entries {
        if ctx.quiet && entry.level != LogLevel::Error {
            continue;
        }
        println!("{} {}", level_tag(entry.level, ctx.no_color), entry.message);
    }
}

fn print_diff(diff: &str, no_color: bool) {
    for line in diff.lines() {
        if no_color {
            println!("{line}");
        } else if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", line.bold());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
}

#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "#")]
    index: usize,
    kind: &'static str,
    target: String,
    detail: String,
}

/// List the actions in an assistant response
pub fn extract_run(args: ExtractArgs, ctx: &AppContext) -> Result<()> {
    let response = read_response(args.input.as_deref(), args.from_clipboard)?;
    let actions = extract(&response);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    if actions.is_empty() {
        if !ctx.quiet {
            println!("No actions found");
        }
        return Ok(());
    }

    let rows: Vec<ActionRow> = actions
        .iter()
        .enumerate()
        .map(|(index, action)| ActionRow {
            index: index + 1,
            kind: action.kind_name(),
            target: action.target().to_string(),
            detail: match &action.kind {
                ActionKind::Edit(e) => format!(
                    "-{} +{} lines",
                    e.search.lines().count(),
                    e.replace.lines().count()
                ),
                ActionKind::Create(c) => format!("{} bytes", c.content.len()),
            },
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

/// Preview or apply the actions of a response against a workspace
pub fn apply_run(args: ApplyArgs, ctx: &AppContext) -> Result<()> {
    let cfg = load_config().map_err(|e| CliError::InvalidInput(format!("{e:#}")))?;

    let mut opts = ApplyOptions::from(&cfg.apply);
    if args.strict {
        opts.relaxed_match = false;
    }
    if let Some(policy) = args.on_collision {
        opts.create_policy = policy;
    }
    if args.flat {
        opts.create_parents = false;
    }
    let applier = PatchApplier::from_options(opts);

    let response = read_response(args.response.as_deref(), args.from_clipboard)?;
    let mut actions = extract(&response);
    tracing::info!(actions = actions.len(), "extracted actions");

    let (workspace, mut tree) = Workspace::open(&args.workspace, &cfg.workspace)?;

    // Ignored, oversized and binary files are on disk but not in the tree
    let on_disk = |path: &str| match &workspace {
        Workspace::Dir(root) => exists_on_disk(root, path),
        Workspace::Snapshot(_) => false,
    };

    let active = match &args.active {
        Some(path) => {
            let resolve_opts = ResolveOptions { segment_suffix: opts.segment_suffix };
            let Some(found) = resolve_with(&tree, path, resolve_opts) else {
                return Err(CliError::InvalidInput(format!("active file {path} not found")).into());
            };
            let text = found.entity.content.clone().unwrap_or_default();
            Some((found.entity.id.clone(), text))
        }
        None => None,
    };

    if actions.is_empty() {
        if !ctx.quiet && !args.json {
            println!("No actions found");
        }
        return Ok(());
    }

    if !args.apply {
        let set = preview_with(
            &applier,
            &actions,
            &tree,
            active.as_ref().map(|(id, text)| (id, text.as_str())),
            Some(&on_disk),
        );
        report_preview(&set, args.json, ctx)?;
        return match set.failures() {
            0 => Ok(()),
            n => Err(CliError::ActionsFailed(n).into()),
        };
    }

    let mut doc = active.as_ref().map(|(_, text)| TextDocument::new(text.clone()));
    let report = {
        let mut actx = ApplierContext::new(&mut tree).with_occupied(&on_disk);
        if let (Some((id, _)), Some(d)) = (&active, doc.as_mut()) {
            actx = actx.with_active(id.clone(), d);
        }
        applier.apply_pending(&mut actions, &mut actx)
    };

    let mut changed = changed_ids(&report);

    // Sync the live document back into the tree
    if let (Some((id, _)), Some(d)) = (&active, &doc) {
        if d.version() > 0 {
            tree.set_content(id, d.text());
            changed.insert(id.clone());
        }
    }

    match &workspace {
        Workspace::Dir(root) if !changed.is_empty() => {
            let written = write_back(root, &tree, &changed)?;
            tracing::info!(files = written.len(), "wrote changes back");
        }
        Workspace::Snapshot(path) if !changed.is_empty() => save_snapshot(path, &tree)?,
        _ => {}
    }
    if let Some(out) = &args.snapshot_out {
        save_snapshot(out, &tree)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_log(&report.log, ctx);
        if !ctx.quiet {
            println!(
                "{} applied, {} failed, {} skipped",
                report.applied(),
                report.failed(),
                report.skipped()
            );
        }
    }

    match report.failed() {
        0 => Ok(()),
        n => Err(CliError::ActionsFailed(n).into()),
    }
}

/// Ids touched by successful outcomes, in first-touch order
fn changed_ids(report: &ApplyReport) -> IndexSet<FileId> {
    report
        .actions
        .iter()
        .filter_map(|a| match a.outcome.as_ref()? {
            ApplyOutcome::Edited { id, live: false, .. } | ApplyOutcome::Created { id, .. } => {
                Some(id.clone())
            }
            _ => None,
        })
        .collect()
}

fn report_preview(set: &PreviewSet, json: bool, ctx: &AppContext) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(set)?);
        return Ok(());
    }
    for item in &set.previews {
        let entry = match &item.outcome {
            None => LogEntry::new(
                LogLevel::Info,
                format!("Skipped {} of {}: already applied", item.kind, item.target),
            ),
            Some(o) if o.is_success() => LogEntry::new(LogLevel::Success, o.message()),
            Some(o) => LogEntry::new(LogLevel::Error, o.message()),
        };
        print_log(std::slice::from_ref(&entry), ctx);
        match &item.patch {
            Some(patch) if !ctx.quiet => print_diff(&patch.diff, ctx.no_color),
            _ => {}
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct FileRow {
    path: String,
    bytes: usize,
    cid: String,
}

/// Export a directory as a JSON workspace snapshot
pub fn snapshot_run(args: SnapshotArgs, ctx: &AppContext) -> Result<()> {
    let cfg = load_config().map_err(|e| CliError::InvalidInput(format!("{e:#}")))?;
    let tree = load_dir(&args.dir, &cfg.workspace)?;

    match &args.output {
        Some(out) => {
            save_snapshot(out, &tree)?;
            if !ctx.quiet {
                let rows: Vec<FileRow> = tree
                    .files()
                    .map(|f| {
                        let content = f.content.as_deref().unwrap_or_default();
                        FileRow {
                            path: f.path.clone(),
                            bytes: content.len(),
                            cid: generate_cid(content),
                        }
                    })
                    .collect();
                println!("{}", Table::new(rows));
                println!("Wrote {} entities to {}", tree.len(), out.display());
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&tree)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_like_the_chat_payload() {
        let action = AgentAction::edit(FileEdit {
            file_path: "src/a.ts".into(),
            search: "x".into(),
            replace: "y".into(),
        });
        let v = serde_json::to_value(&action).unwrap();
        assert_eq!(v["type"], "edit");
        assert_eq!(v["data"]["filePath"], "src/a.ts");
        assert_eq!(v["applied"], false);
    }

    #[test]
    fn outcome_messages() {
        let edited = ApplyOutcome::Edited {
            id: FileId::new("1"),
            path: "/a.ts".into(),
            name: "a.ts".into(),
            strategy: MatchStrategy::Relaxed,
            live: false,
        };
        assert_eq!(edited.message(), "Fuzzy patch applied to a.ts");

        let missing = ApplyOutcome::Failed(ApplyFailure::TargetNotFound {
            path: "nope.ts".into(),
        });
        assert!(!missing.is_success());
        assert_eq!(missing.message(), "Patch failed: File nope.ts not found");
    }
}
