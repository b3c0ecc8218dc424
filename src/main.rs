use clap::Parser;
use devpatch::cli::{AppContext, Cli, Commands};
use devpatch::core::edit::finish_with_exit;
use devpatch::infra::logging::init_tracing;

fn main() {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        verbose: cli.verbose,
    };
    init_tracing(ctx.verbose, ctx.no_color);

    let result = match cli.command {
        Commands::Extract(args) => devpatch::extract_run(args, &ctx),
        Commands::Apply(args) => devpatch::apply_run(args, &ctx),
        Commands::Snapshot(args) => devpatch::snapshot_run(args, &ctx),
        Commands::Init(args) => devpatch::infra::config::init(args, &ctx),
        Commands::Completions(args) => devpatch::completion::run(args, &ctx),
    };
    finish_with_exit(result)
}
