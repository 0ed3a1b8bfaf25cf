//! Request-facing API
//!
//! [`BenderContext`] holds the process-wide shared state (config, caches,
//! manifests, HTTP client). [`BenderAssets`] is built once per request from a
//! context plus the request's bundle paths and query parameters, and exposes
//! scaffold assembly, asset URL building, dependency snapshots and deploy
//! invalidation.

use crate::cache::{Cache, CacheKey, MemoryCache, NoopCache};
use crate::config::{Config, Environment};
use crate::error::{BenderError, BenderResult};
use crate::fetcher::{
    split_bundle_path, BundleFetcher, LocalDaemonFetcher, StoreFetcher, DEFAULT_TIMEOUTS,
};
use crate::http::{RetryFetcher, UreqTransport};
use crate::manifest::ManifestStore;
use crate::resolver::{version_bucket, VersionResolver};
use crate::scaffold::{find_extension, Scaffold, PRECOMPILED_EXTENSIONS};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Query parameter prefix for forcing a project's build version
pub const FORCE_PARAM_PREFIX: &str = "forceBuildFor-";

/// Query parameter that switches a request to expanded debug bundles
pub const DEBUG_PARAM: &str = "hsDebug";

/// Durable-cache bucket for assembled scaffolds
pub const SCAFFOLD_BUCKET: &str = "bundle_scaffolds";

/// Scaffold bucket salted like the version bucket
pub fn scaffold_bucket(salt: &str) -> String {
    if salt.is_empty() {
        SCAFFOLD_BUCKET.to_string()
    } else {
        format!("{}_{}", SCAFFOLD_BUCKET, salt)
    }
}

/// Pull forced build versions out of query parameters.
/// `forceBuildFor-navbar=static-1.2` forces navbar to static-1.2.
pub fn forced_versions_from_params(params: &[(String, String)]) -> HashMap<String, String> {
    params
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(FORCE_PARAM_PREFIX)
                .filter(|project| !project.is_empty() && !value.is_empty())
                .map(|project| (project.to_string(), value.clone()))
        })
        .collect()
}

fn debug_param_set(params: &[(String, String)]) -> bool {
    params
        .iter()
        .any(|(name, value)| name == DEBUG_PARAM && matches!(value.as_str(), "true" | "1"))
}

/// Process-wide shared state, built once and handed to every request
pub struct BenderContext {
    config: Arc<Config>,
    version_cache: Arc<dyn Cache>,
    scaffold_cache: Arc<dyn Cache>,
    manifests: Arc<ManifestStore>,
    http: Arc<RetryFetcher>,
}

impl BenderContext {
    pub fn new(config: Config) -> Self {
        let http = Arc::new(RetryFetcher::new(Box::new(UreqTransport::new())));
        Self::with_http(config, http)
    }

    /// Build a context around an existing fetch layer (tests script this)
    pub fn with_http(config: Config, http: Arc<RetryFetcher>) -> Self {
        let config = Arc::new(config);
        let (version_cache, scaffold_cache): (Arc<dyn Cache>, Arc<dyn Cache>) =
            if config.cache.enabled {
                (Arc::new(MemoryCache::new()), Arc::new(MemoryCache::new()))
            } else {
                (Arc::new(NoopCache), Arc::new(NoopCache))
            };
        let manifests = Arc::new(ManifestStore::new(
            config.project.dir.clone(),
            config.missing_manifest_is_error(),
        ));
        Self {
            config,
            version_cache,
            scaffold_cache,
            manifests,
            http,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Drop every cached version and scaffold affected by a deploy of
    /// `project`: versions resolved for it, versions resolved by it as the
    /// host, and all assembled scaffolds (any of them may embed it).
    pub fn invalidate_cache_for_deploy(&self, project: &str) {
        let salt = self.config.build_salt();
        let bucket = version_bucket(&salt);

        self.version_cache
            .invalidate(&CacheKey::new(&bucket).with("project", project));
        self.version_cache
            .invalidate(&CacheKey::new(&bucket).with("host_project", project));
        self.scaffold_cache
            .invalidate(&CacheKey::new(scaffold_bucket(&salt)));
    }
}

/// Per-request asset API
pub struct BenderAssets {
    config: Arc<Config>,
    scaffold_cache: Arc<dyn Cache>,
    http: Arc<RetryFetcher>,
    resolver: Arc<VersionResolver>,
    store: StoreFetcher,
    daemon: Option<LocalDaemonFetcher>,
    host_project: String,
    bundle_paths: Vec<String>,
    force_normal_include: bool,
    is_debug: bool,

    /// Full local mode; false with a daemon present means local_project_mode
    local: bool,

    /// Forced versions make the assembled scaffold unrepresentative, and an
    /// active daemon serves output that changes as assets recompile; either
    /// way the scaffold must not be served from or written to the cache
    skip_scaffold_cache: bool,
}

impl BenderAssets {
    pub fn new(
        context: &BenderContext,
        bundle_paths: &[String],
        query_params: &[(String, String)],
        force_normal_include: bool,
    ) -> BenderResult<Self> {
        let config = Arc::clone(&context.config);
        let host_project = config
            .host_project_name()
            .ok_or(BenderError::MissingHostProject)?
            .to_string();

        let forced = forced_versions_from_params(query_params);
        if !forced.is_empty() {
            debug!(count = forced.len(), "request carries forced build versions");
        }

        let local = config
            .modes
            .local_mode
            .unwrap_or(config.project.env == Environment::Local);
        let is_debug = debug_param_set(query_params)
            || config.modes.debug_mode.unwrap_or(local);

        let resolver = Arc::new(VersionResolver::new(
            Arc::clone(&config),
            Arc::clone(&context.version_cache),
            Arc::clone(&context.manifests),
            Arc::clone(&context.http),
            host_project.clone(),
        ));

        let store = StoreFetcher::new(
            Arc::clone(&config),
            Arc::clone(&context.http),
            Arc::clone(&resolver),
            is_debug,
            &forced,
        )?;

        let daemon = (local || config.modes.local_project_mode).then(|| {
            LocalDaemonFetcher::new(
                Arc::clone(&config),
                Arc::clone(&context.http),
                host_project.clone(),
                is_debug,
                &forced,
            )
        });

        let bundle_paths: Vec<String> = config
            .scaffold
            .default_bundles
            .iter()
            .chain(bundle_paths)
            .map(|p| p.trim_start_matches('/').to_string())
            .collect();

        let daemon_active = daemon.is_some();
        let assets = Self {
            config,
            scaffold_cache: Arc::clone(&context.scaffold_cache),
            http: Arc::clone(&context.http),
            resolver,
            store,
            daemon,
            host_project,
            bundle_paths,
            force_normal_include,
            is_debug,
            local,
            skip_scaffold_cache: !forced.is_empty() || daemon_active,
        };
        assets.validate_bundle_paths()?;
        Ok(assets)
    }

    /// Every bundle path must parse and end in a servable extension before we
    /// spend any network round trips on it.
    fn validate_bundle_paths(&self) -> BenderResult<()> {
        for path in &self.bundle_paths {
            let parts = split_bundle_path(path)?;
            let extension = find_extension(&parts.subpath, false)
                .ok_or_else(|| BenderError::MissingExtension(path.clone()))?;
            self.check_precompiled(&extension, path)?;
        }
        Ok(())
    }

    /// Precompiled extensions work against the local daemon but never against
    /// built assets. Strict environments fail; prod pages keep rendering.
    fn check_precompiled(&self, extension: &str, path: &str) -> BenderResult<()> {
        if !PRECOMPILED_EXTENSIONS.contains(&extension) {
            return Ok(());
        }
        let err = BenderError::PrecompiledExtension {
            extension: extension.to_string(),
            path: path.to_string(),
        };
        if self.config.is_strict() {
            return Err(err);
        }
        error!(%err, "serving a precompiled extension against built assets");
        Ok(())
    }

    pub fn is_debug(&self) -> bool {
        self.is_debug
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    /// Assemble (or recall from cache) the scaffold for this request's
    /// bundle paths
    pub fn generate_scaffold(&self) -> BenderResult<Scaffold> {
        let key = self.scaffold_key();

        if !self.skip_scaffold_cache {
            if let Some(cached) = self.scaffold_cache.get(&key) {
                match serde_json::from_str::<Scaffold>(&cached) {
                    Ok(scaffold) => return Ok(scaffold),
                    Err(err) => warn!(%err, "discarding undecodable cached scaffold"),
                }
            }
        }

        let mut scaffold = Scaffold::new(self.force_normal_include);
        for path in &self.bundle_paths {
            match self.fetch_bundle_html(path) {
                Ok(Some(html)) => scaffold.add_html_by_file_name(path, &html),
                Ok(None) => error!(path, "bundle unavailable from any fetch source"),
                Err(err) if err.is_fetch_failure() => {
                    error!(path, %err, "skipping bundle after fetch failure");
                }
                Err(err) => return Err(err),
            }
        }

        if !self.skip_scaffold_cache {
            self.scaffold_cache
                .set(&key, serde_json::to_string(&scaffold)?, None);
        }
        Ok(scaffold)
    }

    fn fetch_bundle_html(&self, path: &str) -> BenderResult<Option<String>> {
        if let Some(daemon) = self.daemon_for(path)? {
            if let Some(html) = daemon.fetch_include_html(path)? {
                return Ok(Some(html));
            }
        }
        self.store.fetch_include_html(path)
    }

    /// The daemon is consulted for everything in local mode, and only for the
    /// host project's own bundles in local_project_mode. Paths pinned to a
    /// hardcoded version always go to the store; the daemon only serves live
    /// builds.
    fn daemon_for(&self, path: &str) -> BenderResult<Option<&LocalDaemonFetcher>> {
        let Some(daemon) = self.daemon.as_ref() else {
            return Ok(None);
        };
        let parts = split_bundle_path(path)?;
        if parts.hardcoded_version.is_some() {
            return Ok(None);
        }
        if !self.local && parts.project != self.host_project {
            return Ok(None);
        }
        Ok(Some(daemon))
    }

    /// Cache key for the assembled scaffold. The fingerprint covers every
    /// input that changes the output HTML, including whether a daemon is in
    /// play and the node identity since a freshly deployed node may resolve
    /// ahead of its peers.
    fn scaffold_key(&self) -> CacheKey {
        let mut hasher = Sha256::new();
        for path in &self.bundle_paths {
            hasher.update(path.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(self.host_project.as_bytes());
        hasher.update([
            self.is_debug as u8,
            self.force_normal_include as u8,
            self.daemon.is_some() as u8,
        ]);
        hasher.update(self.config.host_identity().as_bytes());
        hasher.update(self.config.build_salt().as_bytes());

        CacheKey::new(scaffold_bucket(&self.config.build_salt()))
            .with("fingerprint", hex::encode(hasher.finalize()))
    }

    /// Absolute URL for a single static asset
    pub fn get_bender_asset_url(&self, asset_path: &str) -> BenderResult<String> {
        let parts = split_bundle_path(asset_path)?;

        let extension = find_extension(asset_path, true)
            .ok_or_else(|| BenderError::MissingExtension(asset_path.to_string()))?;
        self.check_precompiled(&extension, asset_path)?;

        if let Some(version) = parts.hardcoded_version {
            return Ok(format!(
                "https://{}/{}/{}/{}",
                self.config.domains.cdn, parts.project, version, parts.subpath
            ));
        }

        if let Some(daemon) = self.daemon_for(asset_path)? {
            return daemon.get_asset_url(&parts.project, &parts.subpath);
        }
        self.store.get_asset_url(&parts.project, &parts.subpath)
    }

    /// Fetch the raw contents of a single static asset (configuration JSON,
    /// templates) through the same routing as asset URLs
    pub fn get_bender_asset_contents(&self, asset_path: &str) -> BenderResult<String> {
        let parts = split_bundle_path(asset_path)?;
        let extension = find_extension(asset_path, true)
            .ok_or_else(|| BenderError::MissingExtension(asset_path.to_string()))?;
        self.check_precompiled(&extension, asset_path)?;

        if let Some(version) = parts.hardcoded_version {
            let url = format!(
                "https://{}/{}/{}/{}",
                self.config.domains.cdn, parts.project, version, parts.subpath
            );
            return self.http.fetch(&url, DEFAULT_TIMEOUTS);
        }

        if let Some(daemon) = self.daemon_for(asset_path)? {
            return daemon.fetch_asset_contents(&parts.project, &parts.subpath);
        }
        self.store.fetch_asset_contents(&parts.project, &parts.subpath)
    }

    /// Resolved version for every declared dependency plus the host project
    pub fn dependency_version_snapshot(&self) -> BenderResult<HashMap<String, String>> {
        let mut versions = HashMap::new();
        for project in self.dependency_projects()? {
            let version = self.resolver.resolve(&project)?;
            versions.insert(project, version);
        }
        Ok(versions)
    }

    /// Like [`Self::dependency_version_snapshot`], with the `-debug` variant
    /// directory when serving expanded bundles. The daemon serves expanded
    /// output itself, so no suffix applies there.
    pub fn all_dependency_versions(&self) -> BenderResult<HashMap<String, String>> {
        let mut versions = self.dependency_version_snapshot()?;
        if self.is_debug && self.daemon.is_none() {
            for version in versions.values_mut() {
                version.push_str("-debug");
            }
        }
        Ok(versions)
    }

    /// Full URL prefix (domain + project + version) for every dependency
    pub fn all_dependency_url_prefixes(&self) -> BenderResult<HashMap<String, String>> {
        let domain = self.active_fetcher().prefixed_domain();
        let prefixes = self
            .all_dependency_versions()?
            .into_iter()
            .map(|(project, version)| {
                let prefix = format!("{}/{}/{}", domain, project, version);
                (project, prefix)
            })
            .collect();
        Ok(prefixes)
    }

    fn active_fetcher(&self) -> &dyn BundleFetcher {
        match &self.daemon {
            Some(daemon) => daemon,
            None => &self.store,
        }
    }

    fn dependency_projects(&self) -> BenderResult<Vec<String>> {
        let conf = self.resolver.static_conf()?;
        let mut projects: Vec<String> = conf.deps.keys().cloned().collect();
        if !projects.contains(&self.host_project) {
            projects.push(self.host_project.clone());
        }
        projects.sort();
        Ok(projects)
    }
}
