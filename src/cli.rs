use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::apply_engine::CreatePolicy;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub verbose: bool,  // global --verbose
}

#[derive(Parser)]
#[command(name = "dpatch")]
#[command(about = "Apply assistant-proposed search/replace edits and file creations to a workspace")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Debug-level diagnostics on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the actions contained in an assistant response
    Extract(ExtractArgs),

    /// Preview (default) or apply the actions of a response to a workspace
    Apply(ApplyArgs),

    /// Export a directory as a JSON workspace snapshot
    Snapshot(SnapshotArgs),

    /// Initialize configuration file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Response file; `-` or omitted reads stdin
    pub input: Option<PathBuf>,

    /// Read the response from the clipboard
    #[arg(long, conflicts_with = "input")]
    pub from_clipboard: bool,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Workspace directory or JSON snapshot
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Response file; `-` or omitted reads stdin
    #[arg(short, long)]
    pub response: Option<PathBuf>,

    /// Read the response from the clipboard
    #[arg(long, conflicts_with = "response")]
    pub from_clipboard: bool,

    /// Treat this workspace path as the open editor document
    #[arg(long)]
    pub active: Option<String>,

    /// Mutate and write back (default: preview only)
    #[arg(long)]
    pub apply: bool,

    /// Emit a JSON report instead of text
    #[arg(long)]
    pub json: bool,

    /// Also write the resulting tree as a JSON snapshot
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,

    /// Disable the whitespace-insensitive fallback match
    #[arg(long)]
    pub strict: bool,

    /// Override the configured create collision policy
    #[arg(long, value_enum)]
    pub on_collision: Option<CreatePolicy>,

    /// Place nested creates at the workspace root (ignore folders)
    #[arg(long)]
    pub flat: bool,
}

#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// Directory to export
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Output file; prints to stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_defaults_to_preview() {
        let cli = Cli::parse_from(["dpatch", "apply", "-r", "resp.txt"]);
        let Commands::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(!args.apply);
        assert_eq!(args.workspace, PathBuf::from("."));
        assert!(args.on_collision.is_none());
    }
}
