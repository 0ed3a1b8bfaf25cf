//! On-disk JSON dependency manifests
//!
//! Three manifests live under the project's `static/` directory:
//!
//! - `static_conf.json`: declared dependencies, project name to pointer or
//!   specific version
//! - `prebuilt_recursive_static_conf.json`: snapshot recorded at
//!   package/build time (`build` for the host project, `deps` for the rest)
//! - `frozen_at_deploy_version_snapshot.json`: version floor captured at the
//!   most recent production deploy
//!
//! Files are parsed once per distinct path and cached for the process
//! lifetime; entries are only ever added, never mutated, so concurrent
//! readers are safe.

use crate::error::{BenderError, BenderResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

const STATIC_CONF: &str = "static_conf.json";
const PREBUILT_CONF: &str = "prebuilt_recursive_static_conf.json";
const FROZEN_SNAPSHOT: &str = "frozen_at_deploy_version_snapshot.json";

/// Parsed `static_conf.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticConf {
    #[serde(default)]
    pub deps: HashMap<String, String>,
}

/// Parsed `prebuilt_recursive_static_conf.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrebuiltConf {
    /// The host project's own build number, without the `static-` prefix
    #[serde(default)]
    pub build: Option<String>,

    #[serde(default)]
    pub deps: HashMap<String, String>,
}

/// Parsed `frozen_at_deploy_version_snapshot.json`: project → specific version
pub type FrozenSnapshot = HashMap<String, String>;

/// Loads and memoizes the JSON manifests for one project directory
pub struct ManifestStore {
    project_dir: PathBuf,

    /// Whether a missing prebuilt manifest is an error (QA) or just empty
    strict_missing: bool,

    files: Mutex<HashMap<PathBuf, Arc<serde_json::Value>>>,
}

impl ManifestStore {
    pub fn new(project_dir: impl Into<PathBuf>, strict_missing: bool) -> Self {
        Self {
            project_dir: project_dir.into(),
            strict_missing,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// The dependency manifest. Checked in `static/` and, for projects laid
    /// out one level down, `../static/`. Missing in both places is an empty
    /// manifest, never an error.
    pub fn static_conf(&self) -> BenderResult<StaticConf> {
        let local = self.project_dir.join("static").join(STATIC_CONF);
        let parent = self.project_dir.join("..").join("static").join(STATIC_CONF);

        let path = if local.is_file() {
            local
        } else if parent.is_file() {
            parent
        } else {
            debug!("No {} found under {}", STATIC_CONF, self.project_dir.display());
            return Ok(StaticConf::default());
        };

        self.typed(&path)
    }

    /// The build-time snapshot. Missing is an error in strict environments.
    pub fn prebuilt(&self) -> BenderResult<PrebuiltConf> {
        let path = self.project_dir.join("static").join(PREBUILT_CONF);

        if !path.is_file() {
            if self.strict_missing {
                return Err(BenderError::ManifestMissing(path));
            }
            return Ok(PrebuiltConf::default());
        }

        self.typed(&path)
    }

    /// The deploy-time version floor. Missing is always just empty.
    pub fn frozen(&self) -> BenderResult<FrozenSnapshot> {
        let path = self.project_dir.join("static").join(FROZEN_SNAPSHOT);

        if !path.is_file() {
            return Ok(FrozenSnapshot::default());
        }

        self.typed(&path)
    }

    fn typed<T: serde::de::DeserializeOwned>(&self, path: &Path) -> BenderResult<T> {
        let value = self.load_cached(path)?;
        serde_json::from_value((*value).clone()).map_err(|e| BenderError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a JSON file, memoizing by path
    fn load_cached(&self, path: &Path) -> BenderResult<Arc<serde_json::Value>> {
        if let Some(value) = self.files.lock().unwrap().get(path) {
            return Ok(Arc::clone(value));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| BenderError::io(format!("reading manifest {}", path.display()), e))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| BenderError::ManifestInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let value = Arc::new(value);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Arc::clone(&value));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, name: &str, content: &str) {
        let static_dir = dir.join("static");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join(name), content).unwrap();
    }

    #[test]
    fn static_conf_parses_deps() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            STATIC_CONF,
            r#"{"deps": {"style_guide": "current", "navbar": "static-2.4"}}"#,
        );

        let store = ManifestStore::new(temp.path(), false);
        let conf = store.static_conf().unwrap();
        assert_eq!(conf.deps.get("style_guide").unwrap(), "current");
        assert_eq!(conf.deps.get("navbar").unwrap(), "static-2.4");
    }

    #[test]
    fn static_conf_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::new(temp.path(), true);
        assert!(store.static_conf().unwrap().deps.is_empty());
    }

    #[test]
    fn static_conf_found_in_parent_dir() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), STATIC_CONF, r#"{"deps": {"x": "current"}}"#);
        let nested = temp.path().join("module");
        std::fs::create_dir_all(&nested).unwrap();

        let store = ManifestStore::new(&nested, false);
        assert_eq!(store.static_conf().unwrap().deps.len(), 1);
    }

    #[test]
    fn prebuilt_parses_build_and_deps() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            PREBUILT_CONF,
            r#"{"build": "1.52", "deps": {"navbar": "static-2.4"}}"#,
        );

        let store = ManifestStore::new(temp.path(), false);
        let conf = store.prebuilt().unwrap();
        assert_eq!(conf.build.as_deref(), Some("1.52"));
        assert_eq!(conf.deps.get("navbar").unwrap(), "static-2.4");
    }

    #[test]
    fn prebuilt_missing_strict_errors() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::new(temp.path(), true);
        assert!(matches!(
            store.prebuilt(),
            Err(BenderError::ManifestMissing(_))
        ));
    }

    #[test]
    fn prebuilt_missing_lenient_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::new(temp.path(), false);
        let conf = store.prebuilt().unwrap();
        assert!(conf.build.is_none());
        assert!(conf.deps.is_empty());
    }

    #[test]
    fn frozen_missing_is_empty_even_when_strict() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::new(temp.path(), true);
        assert!(store.frozen().unwrap().is_empty());
    }

    #[test]
    fn frozen_parses_flat_map() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), FROZEN_SNAPSHOT, r#"{"navbar": "static-2.1"}"#);

        let store = ManifestStore::new(temp.path(), false);
        assert_eq!(store.frozen().unwrap().get("navbar").unwrap(), "static-2.1");
    }

    #[test]
    fn invalid_json_errors() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), STATIC_CONF, "{not json");

        let store = ManifestStore::new(temp.path(), false);
        assert!(matches!(
            store.static_conf(),
            Err(BenderError::ManifestInvalid { .. })
        ));
    }

    #[test]
    fn files_are_read_once() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), STATIC_CONF, r#"{"deps": {"x": "current"}}"#);

        let store = ManifestStore::new(temp.path(), false);
        store.static_conf().unwrap();

        // Overwrite on disk; the cached parse must win
        write_manifest(temp.path(), STATIC_CONF, r#"{"deps": {}}"#);
        assert_eq!(store.static_conf().unwrap().deps.len(), 1);
    }
}
