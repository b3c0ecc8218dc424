use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{AppContext, InitArgs},
    core::{
        apply_engine::{ApplyOptions, CreatePolicy},
        edit::CliError,
    },
};

/// File names probed in priority order; the first one found wins
pub const CONFIG_FILES: [&str; 4] = ["devpatch.toml", "devpatch.yaml", "devpatch.json", ".devpatch.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Patch engine settings
    pub apply: ApplyConfig,

    /// Workspace loading settings
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig
{
    /// Fall back to whitespace-insensitive line matching
    pub relaxed_match: bool,
    /// What a create does when its path is taken
    pub create_policy: CreatePolicy,
    /// Create intermediate folders for nested create paths
    pub create_parents: bool,
    /// Suffix path resolution only at `/` boundaries
    pub segment_suffix: bool,
}

impl Default for ApplyConfig
{
    fn default() -> Self
    {
        let opts = ApplyOptions::default();
        Self {
            relaxed_match: opts.relaxed_match,
            create_policy: opts.create_policy,
            create_parents: opts.create_parents,
            segment_suffix: opts.segment_suffix,
        }
    }
}

impl From<&ApplyConfig> for ApplyOptions
{
    fn from(cfg: &ApplyConfig) -> Self
    {
        Self {
            relaxed_match: cfg.relaxed_match,
            create_policy: cfg.create_policy,
            create_parents: cfg.create_parents,
            segment_suffix: cfg.segment_suffix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig
{
    /// Ignore patterns (in addition to .gitignore)
    pub ignore_patterns: Vec<String>,

    /// Files larger than this are left out of the tree
    pub max_file_bytes: u64,
}

impl Default for WorkspaceConfig
{
    fn default() -> Self
    {
        Self {
            ignore_patterns: vec![
                "target/".to_string(),
                "node_modules/".to_string(),
                "dist/".to_string(),
                "build/".to_string(),
                ".git/".to_string(),
                "*.pyc".to_string(),
                "__pycache__/".to_string(),
                ".DS_Store".to_string(),
            ],
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Load configuration from the current directory and `DEVPATCH_*` env vars
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            tracing::debug!(path = %path.display(), "loading config file");
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // DEVPATCH_APPLY__RELAXED_MATCH=false
    builder = builder.add_source(
        config::Environment::with_prefix("DEVPATCH").prefix_separator("_").separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Write `config` as pretty TOML
pub fn save_config(
    path: &Path,
    config: &Config,
) -> Result<()>
{
    let toml_string = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, toml_string)
        .with_context(|| format!("Failed to write config file {}", path.display()))
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path: PathBuf = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        return Err(CliError::InvalidInput(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        ))
        .into());
    }

    save_config(&config_path, &Config::default())?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_file()
    {
        let dir = TempDir::new().unwrap();
        let cfg = load_config_from(dir.path()).unwrap();
        assert!(cfg.apply.relaxed_match);
        assert_eq!(cfg.apply.create_policy, CreatePolicy::Reject);
        assert_eq!(cfg.workspace.max_file_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn partial_file_overrides_only_what_it_names()
    {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("devpatch.toml"),
            "[apply]\ncreate_policy = \"rename\"\nrelaxed_match = false\n",
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        let opts = ApplyOptions::from(&cfg.apply);
        assert_eq!(opts.create_policy, CreatePolicy::Rename);
        assert!(!opts.relaxed_match);
        assert!(opts.create_parents);
        assert!(!opts.segment_suffix);
        assert_eq!(cfg.workspace, WorkspaceConfig::default());
    }

    #[test]
    fn saved_config_loads_back()
    {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.apply.create_policy = CreatePolicy::Overwrite;
        cfg.workspace.ignore_patterns = vec!["*.log".into()];
        save_config(&dir.path().join("devpatch.toml"), &cfg).unwrap();

        assert_eq!(load_config_from(dir.path()).unwrap(), cfg);
    }
}
