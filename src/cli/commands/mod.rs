//! CLI command implementations

pub mod config;
pub mod invalidate;
pub mod resolve;
pub mod scaffold;
pub mod snapshot;

pub use config::execute as config;
pub use invalidate::execute as invalidate;
pub use resolve::execute as resolve;
pub use scaffold::execute as scaffold;
pub use snapshot::execute as snapshot;

use crate::assets::{DEBUG_PARAM, FORCE_PARAM_PREFIX};

/// Translate CLI flags into the query parameters the request API reads
pub(crate) fn query_params(forced: &[(String, String)], debug: bool) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = forced
        .iter()
        .map(|(project, version)| (format!("{FORCE_PARAM_PREFIX}{project}"), version.clone()))
        .collect();
    if debug {
        params.push((DEBUG_PARAM.to_string(), "true".to_string()));
    }
    params
}
