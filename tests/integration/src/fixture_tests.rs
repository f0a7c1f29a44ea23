//! Golden-file tests using test-fixtures/
//!
//! Loads the sample platform manifest and value files, and compares
//! rendered values with the expected output.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use addon_core::{ConfigCompositor, ExecutionMode, ManifestResolver, ResolvedDeployment};
use addon_test_utils::{Behavior, RecordingDeployer};
use pretty_assertions::assert_eq;
use serde_json::Value;

/// Path to the test-fixtures directory (relative to the workspace root).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // tests/integration -> ../../test-fixtures
    manifest_dir.join("../../test-fixtures")
}

fn resolve_platform(with_prod_values: bool) -> ResolvedDeployment {
    let mut resolver = ManifestResolver::new(fixtures_dir().join("manifests/platform.toml"));
    if with_prod_values {
        resolver = resolver.with_values_file(fixtures_dir().join("values/prod.yaml"));
    }
    resolver
        .resolve()
        .unwrap_or_else(|e| panic!("Failed to resolve platform fixture: {e}"))
}

fn load_expected(name: &str) -> Value {
    let path = fixtures_dir().join("expected").join(name);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read expected output at {}: {}", path.display(), e));
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_platform_fixture_resolves() {
    let resolved = resolve_platform(false);
    assert_eq!(resolved.options.mode, ExecutionMode::Concurrent);
    assert_eq!(resolved.options.retry.max_attempts, 2);
    assert_eq!(resolved.registry.names(), vec!["backstage-db", "hosted-zone"]);
    assert_eq!(resolved.addons.len(), 4);
}

#[test]
fn test_platform_plan() {
    let plan = resolve_platform(false).scheduler().plan().unwrap();
    assert_eq!(
        plan.waves(),
        vec![
            vec!["ebs-csi-driver", "secrets-store"],
            vec!["backstage"],
            vec!["web"]
        ]
    );
}

#[test]
fn test_web_values_match_golden_file() {
    let resolved = resolve_platform(true);
    let web = resolved.addon("web").unwrap();
    let flat = ConfigCompositor::new(&resolved.registry)
        .compose_addon(web)
        .unwrap();

    assert_eq!(Value::Object(flat), load_expected("web.json"));
}

#[test]
fn test_prod_values_override_typed_options() {
    let resolved = resolve_platform(true);
    let flat = ConfigCompositor::new(&resolved.registry)
        .compose_addon(resolved.addon("backstage").unwrap())
        .unwrap();

    assert_eq!(flat["backstage.image.tag"], "1.21");
    assert_eq!(flat["backstage.replicas"], 2);
    assert_eq!(flat["ingress.className"], "alb");
    assert_eq!(
        flat["backstage.appConfig.backend.database.connection.host"],
        "backstage.cluster-abc.us-east-1.rds.amazonaws.com"
    );
}

#[tokio::test(start_paused = true)]
async fn test_platform_deploy_retries_flaky_portal() {
    let resolved = resolve_platform(true);
    let deployer =
        Arc::new(RecordingDeployer::new().with_behavior("backstage", Behavior::FailTimes(1)));

    let report = resolved
        .scheduler()
        .run(&resolved.registry, deployer.clone())
        .await
        .unwrap();

    assert!(report.is_success(), "failed: {:?}", report.failed());
    assert_eq!(report.outcome("backstage").unwrap().attempts, 2);

    let order = deployer.deploy_order();
    let mut drivers = order[..2].to_vec();
    drivers.sort();
    assert_eq!(drivers, vec!["ebs-csi-driver", "secrets-store"]);
    assert_eq!(order[2..], ["backstage", "web"]);
}
