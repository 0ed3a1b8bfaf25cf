//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bender - build-version resolution and scaffold assembly for static assets
///
/// Resolves which built version of each static project to serve and
/// assembles the script/stylesheet include HTML for a page.
#[derive(Parser, Debug)]
#[command(name = "bender")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BENDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local bender.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the build version served for a project
    Resolve(ResolveArgs),

    /// Assemble scaffold HTML for one or more bundle paths
    Scaffold(ScaffoldArgs),

    /// Print the resolved version for every declared dependency
    Snapshot(SnapshotArgs),

    /// Drop cached versions and scaffolds after a deploy
    Invalidate(InvalidateArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Project to resolve
    pub project: String,

    /// Force a build version (PROJECT=VERSION, repeatable)
    #[arg(short, long, value_parser = parse_forced_version)]
    pub force: Vec<(String, String)>,
}

/// Arguments for the scaffold command
#[derive(Parser, Debug)]
pub struct ScaffoldArgs {
    /// Bundle paths (<project>/static[-<version>]/<path>)
    #[arg(required = true)]
    pub bundles: Vec<String>,

    /// Force a build version (PROJECT=VERSION, repeatable)
    #[arg(short, long, value_parser = parse_forced_version)]
    pub force: Vec<(String, String)>,

    /// Serve expanded (unminified) debug bundles
    #[arg(long)]
    pub debug: bool,

    /// Emit link tags even past the old-IE stylesheet limit
    #[arg(long)]
    pub force_normal_include: bool,

    /// Emit the @import stylesheet variant for old IE
    #[arg(long, conflicts_with = "force_normal_include")]
    pub ie: bool,

    /// Output format
    #[arg(long, default_value = "html")]
    pub format: OutputFormat,
}

/// Arguments for the snapshot command
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// Print full URL prefixes instead of bare versions
    #[arg(long)]
    pub urls: bool,

    /// Snapshot the debug (expanded) variant directories
    #[arg(long)]
    pub debug: bool,
}

/// Arguments for the invalidate command
#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    /// Project that was deployed
    pub project: String,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the scaffold command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// The include HTML itself
    Html,
    /// The scaffold as JSON
    Json,
}

/// Parse a forced version in PROJECT=VERSION format
fn parse_forced_version(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid PROJECT=VERSION format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
