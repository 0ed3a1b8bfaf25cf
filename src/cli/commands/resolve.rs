//! Resolve command - print the build version served for a project

use crate::assets::{BenderAssets, BenderContext};
use crate::cli::args::ResolveArgs;
use crate::config::Config;
use crate::error::BenderResult;

/// Execute the resolve command
pub fn execute(args: ResolveArgs, config: &Config) -> BenderResult<()> {
    let context = BenderContext::new(config.clone());
    let params = super::query_params(&args.force, false);
    let assets = BenderAssets::new(&context, &[], &params, false)?;

    let version = assets.resolver().resolve(&args.project)?;
    println!("{version}");
    Ok(())
}
