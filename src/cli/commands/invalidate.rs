//! Invalidate command - drop cache entries affected by a deploy

use crate::assets::BenderContext;
use crate::cli::args::InvalidateArgs;
use crate::config::Config;
use crate::error::BenderResult;
use console::style;

/// Execute the invalidate command
pub fn execute(args: InvalidateArgs, config: &Config) -> BenderResult<()> {
    let context = BenderContext::new(config.clone());
    context.invalidate_cache_for_deploy(&args.project);

    println!(
        "{} Invalidated cached versions and scaffolds for {}",
        style("✓").green(),
        style(&args.project).bold()
    );
    Ok(())
}
