//! Bundle fetch strategies
//!
//! Two interchangeable ways of turning a bundle path into include HTML: the
//! local development daemon, and the durable artifact store (fronted by the
//! CDN). Both rewrite fetched `src=`/`href=` attributes onto the serving
//! domain and accept forced per-project versions at construction.

use crate::config::Config;
use crate::error::{BenderError, BenderResult};
use crate::http::RetryFetcher;
use crate::resolver::VersionResolver;
use crate::version::is_specific_build;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

/// Retry timeout ladder (seconds) for most fetches
pub const DEFAULT_TIMEOUTS: &[u64] = &[1, 2, 5];

/// The daemon may be compiling a bundle on first request, so its ladder
/// escalates much further.
const DAEMON_BUNDLE_TIMEOUTS: &[u64] = &[1, 5, 25];

/// A bundle path split by the `<project>/static[-<version>]/<subpath>` grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePathParts {
    pub project: String,
    pub hardcoded_version: Option<String>,
    pub subpath: String,
}

fn bundle_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/?([^/]+)/(static(?:-\d+\.\d+)?)/(.+)$").expect("valid regex"))
}

fn src_or_href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"((?:src|href)=['"])([^'"]+)"#).expect("valid regex"))
}

fn project_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:/|^)([^/]+)/static/").expect("valid regex"))
}

/// Split a bundle path into its parts. An embedded `static-<major>.<minor>`
/// segment is a hardcoded version that bypasses resolution for this bundle.
pub fn split_bundle_path(bundle_path: &str) -> BenderResult<BundlePathParts> {
    let captures = bundle_path_regex()
        .captures(bundle_path)
        .ok_or_else(|| BenderError::MalformedBundlePath(bundle_path.to_string()))?;

    let static_segment = &captures[2];
    Ok(BundlePathParts {
        project: captures[1].to_string(),
        hardcoded_version: static_segment
            .starts_with("static-")
            .then(|| static_segment.to_string()),
        subpath: captures[3].to_string(),
    })
}

/// Extract the project name from a `.../<project>/static/...` path or URL
pub fn extract_project_name_from_path(path_or_url: &str) -> Option<String> {
    project_name_regex()
        .captures(path_or_url)
        .map(|captures| captures[1].to_string())
}

/// Prefix every `src=` / `href=` attribute value with the serving domain,
/// preserving the original quoting style. The rest of the attribute is left
/// alone.
pub fn append_static_domain_to_links(html: &str, domain: &str) -> String {
    src_or_href_regex()
        .replace_all(html, |caps: &regex::Captures<'_>| {
            format!("{}//{}{}", &caps[1], domain, &caps[2])
        })
        .into_owned()
}

/// Make a domain protocol-relative unless it already carries a scheme
pub fn prefixed_domain(domain: &str) -> String {
    if domain.is_empty()
        || domain.starts_with("//")
        || domain.starts_with("http:")
        || domain.starts_with("https:")
    {
        domain.to_string()
    } else {
        format!("//{}", domain)
    }
}

/// A strategy for fetching bundle include HTML and building asset URLs
pub trait BundleFetcher {
    /// Fetch the include HTML for a bundle path. `Ok(None)` means this
    /// fetcher doesn't have the bundle and the caller may fall through to
    /// another strategy.
    fn fetch_include_html(&self, bundle_path: &str) -> BenderResult<Option<String>>;

    /// Absolute URL for a single asset of a project
    fn get_asset_url(&self, project: &str, asset_path: &str) -> BenderResult<String>;

    /// Fetch the raw contents of a single asset
    fn fetch_asset_contents(&self, project: &str, asset_path: &str) -> BenderResult<String>;

    /// The domain this fetcher serves assets from
    fn domain(&self) -> String;

    fn prefixed_domain(&self) -> String {
        prefixed_domain(&self.domain())
    }
}

/// Fetches bundles from the local development daemon.
///
/// Failures are soft: the daemon not knowing a bundle returns `None` so the
/// caller can fall through to the store.
pub struct LocalDaemonFetcher {
    config: Arc<Config>,
    http: Arc<RetryFetcher>,
    host_project: String,
    is_debug: bool,
    memo: Mutex<HashMap<String, String>>,
}

impl LocalDaemonFetcher {
    pub fn new(
        config: Arc<Config>,
        http: Arc<RetryFetcher>,
        host_project: impl Into<String>,
        is_debug: bool,
        forced_versions: &HashMap<String, String>,
    ) -> Self {
        let memo: HashMap<String, String> = forced_versions
            .iter()
            .filter(|(_, value)| is_specific_build(value))
            .map(|(project, value)| (project.clone(), value.clone()))
            .collect();

        // Pointers are left to the daemon, which always serves its latest
        // local build anyway
        Self {
            config,
            http,
            host_project: host_project.into(),
            is_debug,
            memo: Mutex::new(memo),
        }
    }

    /// Ask the daemon which build it serves for a project, memoized per
    /// request
    fn build_version(&self, project: &str) -> BenderResult<String> {
        if let Some(version) = self.memo.lock().unwrap().get(project) {
            return Ok(version.clone());
        }

        let url = format!(
            "http://{}/builds/{}?from={}",
            self.domain(),
            project,
            self.host_project
        );
        let version = self.http.fetch(&url, DEFAULT_TIMEOUTS)?.trim().to_string();
        self.memo
            .lock()
            .unwrap()
            .insert(project.to_string(), version.clone());
        Ok(version)
    }
}

impl BundleFetcher for LocalDaemonFetcher {
    fn fetch_include_html(&self, bundle_path: &str) -> BenderResult<Option<String>> {
        let url = format!(
            "http://{}/bundle{}/{}.html?from={}",
            self.domain(),
            if self.is_debug { "-expanded" } else { "" },
            bundle_path,
            self.host_project
        );

        match self.http.fetch(&url, DAEMON_BUNDLE_TIMEOUTS) {
            Ok(html) => Ok(Some(append_static_domain_to_links(&html, &self.domain()))),
            Err(err) => {
                debug!(bundle_path, %err, "bundle not served by local daemon");
                Ok(None)
            }
        }
    }

    fn get_asset_url(&self, project: &str, asset_path: &str) -> BenderResult<String> {
        match self.build_version(project) {
            Ok(version) => Ok(format!(
                "http://{}/{}/{}/{}",
                self.domain(),
                project,
                version,
                asset_path
            )),
            Err(err) => {
                // The daemon can still serve unversioned paths
                warn!(project, %err, "daemon version lookup failed, using unversioned url");
                Ok(format!(
                    "http://{}/{}/static/{}",
                    self.domain(),
                    project,
                    asset_path
                ))
            }
        }
    }

    fn fetch_asset_contents(&self, project: &str, asset_path: &str) -> BenderResult<String> {
        let url = self.get_asset_url(project, asset_path)?;
        self.http.fetch(&url, DEFAULT_TIMEOUTS)
    }

    fn domain(&self) -> String {
        self.config.domains.daemon.clone()
    }
}

/// Fetches built bundles from the artifact store via the CDN, resolving
/// versions through the full resolver chain.
pub struct StoreFetcher {
    config: Arc<Config>,
    http: Arc<RetryFetcher>,
    resolver: Arc<VersionResolver>,
    is_debug: bool,
}

impl StoreFetcher {
    /// Forced versions are applied to the resolver's per-request memo now;
    /// forced pointers are resolved over the network immediately.
    pub fn new(
        config: Arc<Config>,
        http: Arc<RetryFetcher>,
        resolver: Arc<VersionResolver>,
        is_debug: bool,
        forced_versions: &HashMap<String, String>,
    ) -> BenderResult<Self> {
        resolver.seed_forced(forced_versions)?;
        Ok(Self {
            config,
            http,
            resolver,
            is_debug,
        })
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }
}

impl BundleFetcher for StoreFetcher {
    fn fetch_include_html(&self, bundle_path: &str) -> BenderResult<Option<String>> {
        let parts = split_bundle_path(bundle_path)?;

        let build_version = match parts.hardcoded_version {
            Some(version) => version,
            None => self.resolver.resolve(&parts.project)?,
        };

        let url = format!(
            "http://{}/{}/{}/{}.bundle{}.html",
            self.domain(),
            parts.project,
            build_version,
            parts.subpath,
            if self.is_debug { "-expanded" } else { "" }
        );

        if self.config.cache.log_store_fetches {
            info!(bundle_path, url, "fetching bundle html");
        }

        let html = self.http.fetch(&url, DEFAULT_TIMEOUTS)?;
        Ok(Some(append_static_domain_to_links(&html, &self.domain())))
    }

    fn get_asset_url(&self, project: &str, asset_path: &str) -> BenderResult<String> {
        let build_version = self.resolver.resolve(project)?;
        Ok(format!(
            "https://{}/{}/{}/{}",
            self.domain(),
            project,
            build_version,
            asset_path
        ))
    }

    fn fetch_asset_contents(&self, project: &str, asset_path: &str) -> BenderResult<String> {
        let url = self.get_asset_url(project, asset_path)?;
        self.http.fetch(&url, DEFAULT_TIMEOUTS)
    }

    fn domain(&self) -> String {
        self.config.domains.cdn.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::http::testing::{Script, ScriptedTransport};
    use crate::http::{HttpResponse, Transport};
    use crate::manifest::ManifestStore;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fwd(Arc<ScriptedTransport>);
    impl Transport for Fwd {
        fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, String> {
            self.0.get(url, timeout)
        }
    }

    fn test_config(temp: &TempDir) -> Arc<Config> {
        let mut config = Config::default();
        config.project.name = Some("app".to_string());
        config.project.dir = temp.path().to_path_buf();
        config.project.build_salt = Some(String::new());
        config.domains.cdn = "cdn.test".to_string();
        config.domains.store = "store.test".to_string();
        config.domains.daemon = "localhost:3333".to_string();
        Arc::new(config)
    }

    fn store_fetcher(
        script: Vec<Script>,
        forced: &HashMap<String, String>,
    ) -> (StoreFetcher, Arc<ScriptedTransport>, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let transport = Arc::new(ScriptedTransport::new(script));
        let http = Arc::new(RetryFetcher::new(Box::new(Fwd(Arc::clone(&transport)))));
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let manifests = Arc::new(ManifestStore::new(temp.path(), false));
        let resolver = Arc::new(VersionResolver::new(
            Arc::clone(&config),
            cache,
            manifests,
            Arc::clone(&http),
            "app",
        ));
        let fetcher =
            StoreFetcher::new(Arc::clone(&config), http, resolver, false, forced).unwrap();
        (fetcher, transport, temp)
    }

    // ---- bundle path grammar ----

    #[test]
    fn split_plain_bundle_path() {
        let parts = split_bundle_path("proj/static/js/app.js").unwrap();
        assert_eq!(parts.project, "proj");
        assert_eq!(parts.hardcoded_version, None);
        assert_eq!(parts.subpath, "js/app.js");
    }

    #[test]
    fn split_hardcoded_version() {
        let parts = split_bundle_path("proj/static-3.1/js/app.js").unwrap();
        assert_eq!(parts.project, "proj");
        assert_eq!(parts.hardcoded_version.as_deref(), Some("static-3.1"));
        assert_eq!(parts.subpath, "js/app.js");
    }

    #[test]
    fn split_tolerates_leading_slash() {
        let parts = split_bundle_path("/proj/static/css/app.css").unwrap();
        assert_eq!(parts.project, "proj");
    }

    #[test]
    fn split_rejects_malformed_paths() {
        assert!(matches!(
            split_bundle_path("not-a-bundle"),
            Err(BenderError::MalformedBundlePath(_))
        ));
        assert!(split_bundle_path("proj/assets/js/app.js").is_err());
        assert!(split_bundle_path("proj/static/").is_err());
    }

    #[test]
    fn extract_project_name() {
        assert_eq!(
            extract_project_name_from_path("style_guide/static/js/a.js").as_deref(),
            Some("style_guide")
        );
        assert_eq!(
            extract_project_name_from_path("http://cdn/x/style_guide/static/js/a.js").as_deref(),
            Some("style_guide")
        );
        assert_eq!(extract_project_name_from_path("no/match/here"), None);
    }

    // ---- domain rewriting ----

    #[test]
    fn rewrite_prefixes_src_and_href() {
        let html = r#"<script src="/p/static-1.1/js/a.js"></script>
<link href="/p/static-1.1/css/a.css" rel="stylesheet">"#;
        let rewritten = append_static_domain_to_links(html, "cdn.test");
        assert!(rewritten.contains(r#"src="//cdn.test/p/static-1.1/js/a.js""#));
        assert!(rewritten.contains(r#"href="//cdn.test/p/static-1.1/css/a.css""#));
    }

    #[test]
    fn rewrite_preserves_single_quote_style() {
        let rewritten =
            append_static_domain_to_links("<script src='/p/static/js/a.js'></script>", "cdn.test");
        assert_eq!(
            rewritten,
            "<script src='//cdn.test/p/static/js/a.js'></script>"
        );
    }

    #[test]
    fn rewrite_leaves_other_attributes_alone() {
        let html = r#"<link href="/a.css" media="screen" rel="stylesheet">"#;
        let rewritten = append_static_domain_to_links(html, "cdn.test");
        assert!(rewritten.contains(r#"media="screen""#));
        assert!(rewritten.contains(r#"rel="stylesheet""#));
    }

    #[test]
    fn prefixed_domain_variants() {
        assert_eq!(prefixed_domain("cdn.test"), "//cdn.test");
        assert_eq!(prefixed_domain("//cdn.test"), "//cdn.test");
        assert_eq!(prefixed_domain("https://cdn.test"), "https://cdn.test");
        assert_eq!(prefixed_domain(""), "");
    }

    // ---- store fetcher ----

    #[test]
    fn store_fetch_uses_resolved_version_in_url() {
        let forced = HashMap::from([("proj".to_string(), "static-2.4".to_string())]);
        let (fetcher, transport, _temp) =
            store_fetcher(vec![Script::Ok("<script src=\"/x.js\"></script>")], &forced);

        let html = fetcher
            .fetch_include_html("proj/static/js/app.js")
            .unwrap()
            .unwrap();

        let urls = transport.urls_seen.lock().unwrap();
        assert_eq!(urls[0], "http://cdn.test/proj/static-2.4/js/app.js.bundle.html");
        assert!(html.contains("//cdn.test/x.js"));
    }

    #[test]
    fn store_fetch_hardcoded_version_skips_resolution() {
        let (fetcher, transport, _temp) =
            store_fetcher(vec![Script::Ok("<b></b>")], &HashMap::new());

        fetcher
            .fetch_include_html("proj/static-3.1/js/app.js")
            .unwrap()
            .unwrap();

        let urls = transport.urls_seen.lock().unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0], "http://cdn.test/proj/static-3.1/js/app.js.bundle.html");
    }

    #[test]
    fn store_fetch_failure_is_an_error() {
        let forced = HashMap::from([("proj".to_string(), "static-2.4".to_string())]);
        let (fetcher, _transport, _temp) = store_fetcher(
            vec![Script::Status(404), Script::Status(404), Script::Status(404)],
            &forced,
        );

        let result = fetcher.fetch_include_html("proj/static/js/app.js");
        assert!(matches!(result, Err(BenderError::NotFound { .. })));
    }

    #[test]
    fn store_asset_url() {
        let forced = HashMap::from([("proj".to_string(), "static-2.4".to_string())]);
        let (fetcher, _transport, _temp) = store_fetcher(vec![], &forced);

        let url = fetcher.get_asset_url("proj", "img/logo.png").unwrap();
        assert_eq!(url, "https://cdn.test/proj/static-2.4/img/logo.png");
    }

    #[test]
    fn store_asset_contents_fetches_resolved_url() {
        let forced = HashMap::from([("proj".to_string(), "static-2.4".to_string())]);
        let (fetcher, transport, _temp) = store_fetcher(vec![Script::Ok("{\"a\": 1}")], &forced);

        let body = fetcher.fetch_asset_contents("proj", "js/data.json").unwrap();
        assert_eq!(body, "{\"a\": 1}");

        let urls = transport.urls_seen.lock().unwrap();
        assert_eq!(urls[0], "https://cdn.test/proj/static-2.4/js/data.json");
    }

    #[test]
    fn debug_mode_fetches_expanded_bundle() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let transport = Arc::new(ScriptedTransport::new(vec![Script::Ok("<b></b>")]));
        let http = Arc::new(RetryFetcher::new(Box::new(Fwd(Arc::clone(&transport)))));
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let manifests = Arc::new(ManifestStore::new(temp.path(), false));
        let resolver = Arc::new(VersionResolver::new(
            Arc::clone(&config),
            cache,
            manifests,
            Arc::clone(&http),
            "app",
        ));
        let forced = HashMap::from([("proj".to_string(), "static-2.4".to_string())]);
        let fetcher = StoreFetcher::new(Arc::clone(&config), http, resolver, true, &forced).unwrap();

        fetcher.fetch_include_html("proj/static/js/app.js").unwrap();
        let urls = transport.urls_seen.lock().unwrap();
        assert!(urls[0].ends_with("app.js.bundle-expanded.html"));
    }

    // ---- daemon fetcher ----

    fn daemon_fetcher(
        script: Vec<Script>,
        forced: &HashMap<String, String>,
    ) -> (LocalDaemonFetcher, Arc<ScriptedTransport>, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let transport = Arc::new(ScriptedTransport::new(script));
        let http = Arc::new(RetryFetcher::new(Box::new(Fwd(Arc::clone(&transport)))));
        let fetcher = LocalDaemonFetcher::new(config, http, "app", false, forced);
        (fetcher, transport, temp)
    }

    #[test]
    fn daemon_fetch_builds_url_and_rewrites() {
        let (fetcher, transport, _temp) = daemon_fetcher(
            vec![Script::Ok("<script src=\"/p/static/js/a.js\"></script>")],
            &HashMap::new(),
        );

        let html = fetcher
            .fetch_include_html("proj/static/js/app.js")
            .unwrap()
            .unwrap();

        let urls = transport.urls_seen.lock().unwrap();
        assert_eq!(
            urls[0],
            "http://localhost:3333/bundle/proj/static/js/app.js.html?from=app"
        );
        assert!(html.contains("//localhost:3333/p/static/js/a.js"));
    }

    #[test]
    fn daemon_miss_returns_none_not_error() {
        let (fetcher, transport, _temp) = daemon_fetcher(
            vec![Script::Broken, Script::Broken, Script::Broken],
            &HashMap::new(),
        );

        let result = fetcher.fetch_include_html("proj/static/js/app.js").unwrap();
        assert!(result.is_none());
        assert_eq!(transport.attempts(), 3);
    }

    #[test]
    fn daemon_asset_url_uses_daemon_build() {
        let (fetcher, transport, _temp) =
            daemon_fetcher(vec![Script::Ok("static-0.1\n")], &HashMap::new());

        let url = fetcher.get_asset_url("proj", "js/a.js").unwrap();
        assert_eq!(url, "http://localhost:3333/proj/static-0.1/js/a.js");

        let urls = transport.urls_seen.lock().unwrap();
        assert_eq!(urls[0], "http://localhost:3333/builds/proj?from=app");

        // Memoized: a second asset url makes no further request
        fetcher.get_asset_url("proj", "js/b.js").unwrap();
        assert_eq!(transport.attempts(), 1);
    }

    #[test]
    fn daemon_asset_url_falls_back_unversioned() {
        let (fetcher, _transport, _temp) = daemon_fetcher(
            vec![Script::Broken, Script::Broken, Script::Broken],
            &HashMap::new(),
        );

        let url = fetcher.get_asset_url("proj", "js/a.js").unwrap();
        assert_eq!(url, "http://localhost:3333/proj/static/js/a.js");
    }

    #[test]
    fn daemon_asset_contents_uses_daemon_build() {
        let (fetcher, transport, _temp) = daemon_fetcher(
            vec![Script::Ok("static-0.1"), Script::Ok("contents")],
            &HashMap::new(),
        );

        let body = fetcher.fetch_asset_contents("proj", "js/a.js").unwrap();
        assert_eq!(body, "contents");

        let urls = transport.urls_seen.lock().unwrap();
        assert_eq!(urls[1], "http://localhost:3333/proj/static-0.1/js/a.js");
    }

    #[test]
    fn daemon_seeds_forced_specific_builds() {
        let forced = HashMap::from([("proj".to_string(), "static-7.7".to_string())]);
        let (fetcher, transport, _temp) = daemon_fetcher(vec![], &forced);

        let url = fetcher.get_asset_url("proj", "js/a.js").unwrap();
        assert_eq!(url, "http://localhost:3333/proj/static-7.7/js/a.js");
        assert_eq!(transport.attempts(), 0);
    }
}
