//! Snapshot command - resolved versions for every declared dependency

use crate::assets::{BenderAssets, BenderContext};
use crate::cli::args::SnapshotArgs;
use crate::config::Config;
use crate::error::BenderResult;
use std::collections::BTreeMap;

/// Execute the snapshot command
pub fn execute(args: SnapshotArgs, config: &Config) -> BenderResult<()> {
    let context = BenderContext::new(config.clone());
    let params = super::query_params(&[], args.debug);
    let assets = BenderAssets::new(&context, &[], &params, false)?;

    let versions = if args.urls {
        assets.all_dependency_url_prefixes()?
    } else if args.debug {
        assets.all_dependency_versions()?
    } else {
        assets.dependency_version_snapshot()?
    };

    // Sorted output so snapshots diff cleanly
    let sorted: BTreeMap<String, String> = versions.into_iter().collect();
    println!("{}", serde_json::to_string_pretty(&sorted)?);
    Ok(())
}
