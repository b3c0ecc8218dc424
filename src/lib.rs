//! **devpatch** - apply assistant-proposed edits to a virtual file tree
//!
//! Extracts `<edit>` / `<create>` actions from a chat response and applies
//! them deterministically: layered path resolution, exact-then-relaxed
//! matching, and a single patch applier that writes either to a live editor
//! buffer or to the stored snapshot. Every failure is a value; a failed
//! action leaves the workspace untouched.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Patch engine - extraction, resolution, matching and application
pub mod core {
    /// Line-ending and whitespace normalization, content ids
    pub mod normalize;

    /// Virtual file tree (id-keyed, insertion-ordered)
    pub mod tree;
    pub use tree::{FileEntity, FileId, FileKind, FileTree};

    /// Layered path resolution (exact, rooted, name, suffix)
    pub mod resolve;

    /// Exact-then-relaxed search block location
    pub mod locate;

    /// `<edit>` / `<create>` action extraction from responses
    pub mod extract;

    /// Action and outcome types plus the command handlers
    pub mod edit;
    pub use edit::{AgentAction, ApplyFailure, ApplyOutcome, apply_run, extract_run, snapshot_run};

    /// Live editor buffer interface and in-memory document
    pub mod buffer;

    /// Patch applier with live-buffer and stored-snapshot text sources
    pub mod apply_engine;
    pub use apply_engine::{ApplierContext, ApplyOptions, CreatePolicy, PatchApplier};

    /// Unified-diff previews over a scratch copy
    pub mod patch;
}

/// Infrastructure - configuration, workspace IO, logging
pub mod infra {
    /// Layered configuration (file + env) with TOML save
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// CRLF/LF-robust line indexing for offset <-> (line, column)
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// Directory and snapshot loading, atomic write-back
    pub mod workspace;

    /// tracing-subscriber setup
    pub mod logging;
}

// Re-exports for the CLI and library consumers
pub use cli::{AppContext, Cli, Commands};
pub use self::core::{
    AgentAction, ApplierContext, ApplyOptions, ApplyOutcome, FileTree, PatchApplier, apply_run,
    extract_run, snapshot_run,
};
pub use self::infra::{Config, load_config};
