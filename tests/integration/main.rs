//! Integration tests for the bender CLI

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn bender() -> Command {
        let mut cmd = cargo_bin_cmd!("bender");
        // Keep host state out of the tests
        cmd.env_remove("BENDER_CONFIG")
            .env_remove("BUILD_NUM")
            .env("HOSTNAME", "test-host");
        cmd
    }

    /// A project directory with a local bender.toml and manifests, so
    /// commands resolve entirely offline
    fn project_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("bender.toml"),
            r#"
[project]
name = "app"
env = "prod"

[domains]
cdn = "cdn.example.net"
store = "store.example.net"
"#,
        )
        .unwrap();

        let static_dir = temp.path().join("static");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(
            static_dir.join("static_conf.json"),
            r#"{"deps": {"navbar": "static-2.4"}}"#,
        )
        .unwrap();
        std::fs::write(
            static_dir.join("prebuilt_recursive_static_conf.json"),
            r#"{"build": "1.52"}"#,
        )
        .unwrap();
        temp
    }

    #[test]
    fn help_displays() {
        bender()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("scaffold assembly"));
    }

    #[test]
    fn version_displays() {
        bender()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bender"));
    }

    #[test]
    fn config_path() {
        bender()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[project]"))
            .stdout(predicate::str::contains("cdn.example.net"));
    }

    #[test]
    fn resolve_requires_a_host_project() {
        let temp = TempDir::new().unwrap();
        bender()
            .current_dir(temp.path())
            .args(["-c", "/nonexistent/bender-config.toml", "resolve", "navbar"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Host project name is not configured"));
    }

    #[test]
    fn resolve_pinned_dependency() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["resolve", "navbar"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-2.4"));
    }

    #[test]
    fn resolve_host_project_uses_prebuilt_version() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["resolve", "app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-1.52"));
    }

    #[test]
    fn resolve_forced_version_needs_no_manifests() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("bender.toml"),
            "[project]\nname = \"app\"\nenv = \"prod\"\n",
        )
        .unwrap();

        bender()
            .current_dir(temp.path())
            .args(["resolve", "other", "-f", "other=static-9.9"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-9.9"));
    }

    #[test]
    fn scaffold_rejects_malformed_bundle_path() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["scaffold", "not-a-bundle-path"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Malformed bundle path"));
    }

    #[test]
    fn scaffold_rejects_missing_extension() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["scaffold", "app/static/js/app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing extension"));
    }

    #[test]
    fn snapshot_prints_dependency_versions() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .arg("snapshot")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"navbar\": \"static-2.4\""))
            .stdout(predicate::str::contains("\"app\": \"static-1.52\""));
    }

    #[test]
    fn snapshot_debug_appends_variant_suffix() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["snapshot", "--debug"])
            .assert()
            .success()
            .stdout(predicate::str::contains("static-2.4-debug"));
    }

    #[test]
    fn snapshot_urls_include_the_cdn_domain() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["snapshot", "--urls"])
            .assert()
            .success()
            .stdout(predicate::str::contains("//cdn.example.net/navbar/static-2.4"));
    }

    #[test]
    fn invalidate_reports_success() {
        let temp = project_dir();
        bender()
            .current_dir(temp.path())
            .args(["invalidate", "navbar"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Invalidated"));
    }
}
