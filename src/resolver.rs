//! Build-version resolution
//!
//! Resolves the build version to serve for a project, consulting in strict
//! precedence order:
//!
//! 1. Forced overrides (seeded into the per-request memo at construction)
//! 2. The per-request memo
//! 3. The host project's own baked-in version (prebuilt manifest, then the
//!    `BENDER_FORCED_BUILD_VERSION_<PROJECT>` environment variable)
//! 4. The durable cache
//! 5. The origin: maximum of the pointer, prebuilt-snapshot and
//!    frozen-at-deploy candidates

use crate::cache::{Cache, CacheKey};
use crate::config::{Config, Environment};
use crate::error::{BenderError, BenderResult};
use crate::http::RetryFetcher;
use crate::manifest::{ManifestStore, StaticConf};
use crate::version::{is_specific_build, max_build, pointer_file_name, BuildName, DEFAULT_POINTER};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Environment variable consulted for the host project when the prebuilt
/// manifest carries no build number
pub const FORCED_VERSION_ENV_PREFIX: &str = "BENDER_FORCED_BUILD_VERSION_";

/// Durable-cache bucket for resolved versions
pub const VERSION_BUCKET: &str = "static_build_name_for";

/// Retry timeout ladder (seconds) for pointer fetches
const POINTER_TIMEOUTS: &[u64] = &[1, 2, 5];

/// Bucket name salted with the running build, so entries written by an old
/// build are never served to a new one.
pub fn version_bucket(salt: &str) -> String {
    if salt.is_empty() {
        VERSION_BUCKET.to_string()
    } else {
        format!("{}_{}", VERSION_BUCKET, salt)
    }
}

/// Per-request version resolver. The memo is scoped to this instance and
/// discarded with it; the cache and manifest store are shared process state.
pub struct VersionResolver {
    config: Arc<Config>,
    cache: Arc<dyn Cache>,
    manifests: Arc<ManifestStore>,
    http: Arc<RetryFetcher>,
    host_project: String,
    memo: Mutex<HashMap<String, String>>,
}

impl VersionResolver {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<dyn Cache>,
        manifests: Arc<ManifestStore>,
        http: Arc<RetryFetcher>,
        host_project: impl Into<String>,
    ) -> Self {
        Self {
            config,
            cache,
            manifests,
            http,
            host_project: host_project.into(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn host_project(&self) -> &str {
        &self.host_project
    }

    /// The declared dependency manifest this resolver works from
    pub fn static_conf(&self) -> BenderResult<StaticConf> {
        self.manifests.static_conf()
    }

    /// Seed the per-request memo from forced overrides. A value that already
    /// looks like a specific build is used directly; anything else is treated
    /// as a pointer and resolved over the network now.
    pub fn seed_forced(&self, forced: &HashMap<String, String>) -> BenderResult<()> {
        for (project, value) in forced {
            let version = if is_specific_build(value) {
                value.clone()
            } else {
                self.fetch_pointer(value, project)?
            };
            self.memoize(project, &version);
        }
        Ok(())
    }

    pub fn memoize(&self, project: &str, version: &str) {
        self.memo
            .lock()
            .unwrap()
            .insert(project.to_string(), version.to_string());
    }

    pub fn memoized(&self, project: &str) -> Option<String> {
        self.memo.lock().unwrap().get(project).cloned()
    }

    /// Resolve the build version for `project`
    pub fn resolve(&self, project: &str) -> BenderResult<String> {
        // Forced overrides live in the memo, so this also gives them the
        // highest precedence for every project including the host.
        if let Some(version) = self.memoized(project) {
            return Ok(version);
        }

        // The host project always prefers the version it was packaged with,
        // so markup and code stay linked to the exact assets they were built
        // against.
        if project == self.host_project {
            if let Some(version) = self.host_project_version()? {
                self.memoize(project, &version);
                return Ok(version);
            }
        }

        let key = self.version_key(project);
        if let Some(version) = self.cache.get(&key) {
            self.memoize(project, &version);
            return Ok(version);
        }

        if self.config.cache.log_misses {
            debug!(
                project,
                host_project = %self.host_project,
                "build version cache miss"
            );
        }

        let version = self.resolve_uncached(project)?;
        self.cache.set(&key, version.clone(), None);
        self.memoize(project, &version);
        Ok(version)
    }

    fn version_key(&self, project: &str) -> CacheKey {
        CacheKey::new(version_bucket(&self.config.build_salt()))
            .with("project", project)
            .with("host_project", &self.host_project)
    }

    /// The version baked into this package at build time, if any
    fn host_project_version(&self) -> BenderResult<Option<String>> {
        let prebuilt = self.manifests.prebuilt()?;
        if let Some(build) = prebuilt.build.filter(|b| !b.is_empty()) {
            return Ok(Some(format!("static-{}", build)));
        }

        let env_var = format!(
            "{}{}",
            FORCED_VERSION_ENV_PREFIX,
            self.host_project.to_uppercase()
        );
        Ok(std::env::var(env_var).ok().filter(|v| !v.is_empty()))
    }

    /// Resolve against the origin: maximum of up to three candidates
    fn resolve_uncached(&self, project: &str) -> BenderResult<String> {
        let declared = self.declared_version(project)?;

        // A manifest that pins a specific build short-circuits everything
        if is_specific_build(&declared) {
            return Ok(declared);
        }

        let pointer = match self.fetch_pointer(&declared, project) {
            Ok(version) => self.parse_candidate(project, &version, "pointer"),
            Err(err @ BenderError::DoublePointer { .. }) => return Err(err),
            Err(err) => {
                error!(project, %err, "pointer fetch failed, relying on snapshots");
                None
            }
        };

        let prebuilt = self
            .prebuilt_candidate(project)?
            .and_then(|v| self.parse_candidate(project, &v, "prebuilt snapshot"));

        let frozen = self
            .manifests
            .frozen()?
            .get(project)
            .filter(|v| !v.is_empty())
            .and_then(|v| self.parse_candidate(project, v, "deploy snapshot"));

        let version = max_build([pointer.clone(), prebuilt.clone(), frozen.clone()])
            .ok_or_else(|| BenderError::VersionNotFound(project.to_string()))?;

        if self.config.cache.log_store_fetches {
            info!(
                project,
                version = %version,
                pointer = pointer.as_ref().map(|b| b.as_str()).unwrap_or("-"),
                prebuilt = prebuilt.as_ref().map(|b| b.as_str()).unwrap_or("-"),
                frozen = frozen.as_ref().map(|b| b.as_str()).unwrap_or("-"),
                "fetched static version"
            );
        }

        Ok(version.as_str().to_string())
    }

    /// The pointer-or-version this project is declared at in static_conf.json
    fn declared_version(&self, project: &str) -> BenderResult<String> {
        let conf = self.manifests.static_conf()?;
        match conf.deps.get(project) {
            Some(value) if !value.is_empty() => Ok(value.clone()),
            _ => {
                error!(
                    project,
                    "dependency missing from static_conf.json; your manifest must list \
                     every static dependency the project references"
                );
                Ok(DEFAULT_POINTER.to_string())
            }
        }
    }

    fn prebuilt_candidate(&self, project: &str) -> BenderResult<Option<String>> {
        let prebuilt = self.manifests.prebuilt()?;
        if project == self.host_project {
            Ok(prebuilt
                .build
                .filter(|b| !b.is_empty())
                .map(|b| format!("static-{}", b)))
        } else {
            Ok(prebuilt.deps.get(project).filter(|v| !v.is_empty()).cloned())
        }
    }

    fn parse_candidate(&self, project: &str, value: &str, source: &str) -> Option<BuildName> {
        let parsed = BuildName::parse(value);
        if parsed.is_none() {
            warn!(project, value, source, "skipping unparseable build candidate");
        }
        parsed
    }

    /// Download a version pointer from the store and return the specific
    /// build it names. Empty bodies and pointer-to-pointer indirection are
    /// errors.
    pub fn fetch_pointer(&self, pointer: &str, project: &str) -> BenderResult<String> {
        let url = self.pointer_url(pointer, project);
        let body = self.http.fetch(&url, POINTER_TIMEOUTS)?;
        let version = body.trim();

        if version.is_empty() {
            return Err(BenderError::EmptyPointer(url));
        }
        if !is_specific_build(version) {
            return Err(BenderError::DoublePointer {
                project: project.to_string(),
                value: version.to_string(),
            });
        }

        Ok(version.to_string())
    }

    /// Pointer files are fetched from the store domain directly (never the
    /// CDN, whose caching could serve a stale pointer). Non-prod reads the
    /// `-qa` variant.
    fn pointer_url(&self, pointer: &str, project: &str) -> String {
        let mut url = format!(
            "http://{}/{}/{}",
            self.config.domains.store,
            project,
            pointer_file_name(pointer)
        );
        if self.config.project.env != Environment::Prod {
            url.push_str("-qa");
        }
        url
    }
}
