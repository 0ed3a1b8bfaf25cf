//! Scaffold command - assemble include HTML for bundle paths

use crate::assets::{BenderAssets, BenderContext};
use crate::cli::args::{OutputFormat, ScaffoldArgs};
use crate::config::Config;
use crate::error::BenderResult;

/// Execute the scaffold command
pub fn execute(args: ScaffoldArgs, config: &Config) -> BenderResult<()> {
    let context = BenderContext::new(config.clone());
    let params = super::query_params(&args.force, args.debug);
    let assets = BenderAssets::new(&context, &args.bundles, &params, args.force_normal_include)?;

    let scaffold = assets.generate_scaffold()?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&scaffold)?),
        OutputFormat::Html => {
            let head_css = if args.ie {
                scaffold.header_forced_import_css_html_for_ie()
            } else {
                scaffold.header_css_html()
            };
            for section in [head_css, scaffold.header_js_html(), scaffold.footer_js_html()] {
                if !section.is_empty() {
                    println!("{section}");
                }
            }
        }
    }
    Ok(())
}
