use std::fs;
use std::path::Path;

use telemetry_dashboard::config::{self, Endpoint};
use telemetry_dashboard::model::Group;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn extends_and_imports_merge_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "base.toml",
        r#"
[api]
base_url = "http://base.local/api"
timeout_ms = 5000

[refresh]
interval_ms = 10000
"#,
    );
    write(
        dir.path(),
        "cameras.toml",
        r#"
[cameras]
prefix = "cam"
entities = ["C1", "C2"]
"#,
    );
    write(
        dir.path(),
        "site.toml",
        r#"
extends = "base.toml"

[refresh]
auto = false

[groups]
imports = ["cameras.toml"]
"#,
    );

    let cfg = config::load(&dir.path().join("site.toml"))
        .unwrap()
        .dashboard()
        .unwrap();
    assert_eq!(cfg.api.base_url, "http://base.local/api");
    assert_eq!(cfg.api.timeout_ms, 5000);
    assert_eq!(cfg.refresh.interval_ms, 10000);
    assert!(!cfg.refresh.auto);
    assert_eq!(cfg.groups.cameras.entities, vec!["C1", "C2"]);
    assert_eq!(cfg.groups.environmental.prefix, "monitor_ambiental");

    let sources = cfg.sources();
    assert_eq!(sources.default_entity(Group::Cameras), "C1");
    assert_eq!(
        sources.endpoint(Group::Cameras, "C2"),
        Endpoint::Entity {
            actual: "cam_C2/actual".into(),
            history: "cam_C2/historico".into(),
        }
    );
}

#[test]
fn own_values_override_imported_ones() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "shared.toml",
        "[refresh]\ninterval_ms = 5000\nauto = false\n",
    );
    write(
        dir.path(),
        "main.toml",
        "imports = [\"shared.toml\"]\n\n[refresh]\ninterval_ms = 15000\n",
    );
    let cfg = config::load(&dir.path().join("main.toml"))
        .unwrap()
        .dashboard()
        .unwrap();
    assert_eq!(cfg.refresh.interval_ms, 15000);
    assert!(!cfg.refresh.auto);
}

#[test]
fn extends_cycle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.toml", "extends = \"b.toml\"\n");
    write(dir.path(), "b.toml", "extends = \"a.toml\"\n");
    let err = config::load(&dir.path().join("a.toml")).unwrap_err();
    assert!(err.to_string().contains("cycle"), "{err}");
}

#[test]
fn invalid_values_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "dup.toml",
        "[groups.energy]\nprefix = \"e\"\nentities = [\"E1\", \"E1\"]\n",
    );
    let err = config::load(&dir.path().join("dup.toml"))
        .unwrap()
        .dashboard()
        .unwrap_err();
    assert!(err.to_string().contains("twice"), "{err}");

    write(dir.path(), "zero.toml", "[refresh]\ninterval_ms = 0\n");
    assert!(
        config::load(&dir.path().join("zero.toml"))
            .unwrap()
            .dashboard()
            .is_err()
    );
}

#[test]
fn environment_overrides_win_over_the_file() {
    let mut cfg = config::load_or_default(None).unwrap().dashboard().unwrap();
    cfg.apply_env_overrides(|k| match k {
        "MONITOR_API_BASE_URL" => Some("http://override/api".into()),
        "MONITOR_AUTO_REFRESH" => Some("off".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.api.base_url, "http://override/api");
    assert!(!cfg.refresh.auto);
    assert_eq!(cfg.refresh.interval_ms, 30_000);

    let err = cfg
        .apply_env_overrides(|k| (k == "MONITOR_REFRESH_MS").then(|| "soon".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("MONITOR_REFRESH_MS"));
}
