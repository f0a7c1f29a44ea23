//! End-to-end test for composition and scheduling together
//!
//! Exercises the complete flow: typed views and generic descriptors ->
//! resource lookup -> layered composition -> dependency-ordered deploy.

use std::collections::BTreeMap;
use std::sync::Arc;

use addon_core::addons::backstage::{
    BackstageAddOn, BackstageOptions, IngressOptions, PostgresOptions, ServiceAccountOptions,
    database_resource,
};
use addon_core::descriptor::{ComputedValues, ValueBinding};
use addon_core::{AddOnState, DependencyScheduler, ExecutionMode, FailureReason, compose};
use addon_resources::{InMemoryRegistry, ResourceHandle};
use addon_test_utils::{Behavior, RecordingDeployer, addon, addon_with_values};
use addon_values::{ConfigPath, flatten, set_path};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new()
        .with(database_resource("backstage-db", "db.internal", 5432, "backstage", "portal").unwrap())
        .with(ResourceHandle::with_attributes(
            "hosted-zone",
            "route53-zone",
            json!({"name": "svc.example.com"}),
        ))
}

fn backstage() -> BackstageAddOn {
    let mut annotations = BTreeMap::new();
    annotations.insert(
        "eks.amazonaws.com/role-arn".to_string(),
        "arn:aws:iam::123456789012:role/backstage".to_string(),
    );
    BackstageAddOn::new(BackstageOptions {
        base_url: "https://portal.example.com".into(),
        service_account: ServiceAccountOptions {
            name: Some("backstage".into()),
            annotations,
        },
        ingress: Some(IngressOptions::default()),
        postgres: PostgresOptions::External {
            resource: "backstage-db".into(),
            password_secret: "backstage-db-password".into(),
        },
        ..Default::default()
    })
}

#[test]
fn test_three_layer_composition() {
    let flat = compose(
        &json!({"image": {"tag": "latest"}, "ingress": {"enabled": false}}),
        &json!({"ingress": {"host": "svc.example.com"}}),
        &json!({"image": {"tag": "v2"}}),
    )
    .unwrap();

    assert_eq!(
        Value::Object(flat),
        json!({"image.tag": "v2", "ingress.enabled": false, "ingress.host": "svc.example.com"})
    );
}

#[test]
fn test_set_path_then_flatten() {
    let mut tree = json!({});
    set_path(&mut tree, &"a.b.c".parse::<ConfigPath>().unwrap(), json!(5)).unwrap();
    assert_eq!(Value::Object(flatten(&tree).unwrap()), json!({"a.b.c": 5}));
}

#[test]
fn test_dotted_and_underscored_keys_stay_distinct() {
    let flat = flatten(&json!({"x.y": 1, "x_y": 2})).unwrap();
    assert_eq!(flat.len(), 2);
    assert_eq!(flat[r"x\.y"], json!(1));
    assert_eq!(flat["x_y"], json!(2));
}

#[tokio::test]
async fn test_platform_deploys_in_dependency_order() {
    let web = addon_with_values(
        "web",
        &["backstage"],
        json!({"image": {"tag": "latest"}, "ingress": {"enabled": false}}),
        json!({"image": {"tag": "v2"}}),
    )
    .with_computed(ComputedValues::new().with_binding(ValueBinding::required(
        "ingress.host".parse().unwrap(),
        "hosted-zone",
        "name",
    )));

    let scheduler = DependencyScheduler::new(vec![
        web,
        backstage().descriptor().unwrap(),
        addon("secrets-store", &[]),
        addon("ebs-csi-driver", &[]),
    ])
    .with_mode(ExecutionMode::Concurrent);
    let deployer = Arc::new(RecordingDeployer::new());

    let report = scheduler.run(&registry(), deployer.clone()).await.unwrap();

    assert!(report.is_success(), "failed: {:?}", report.failed());
    for (before, after) in [
        ("ebs-csi-driver", "backstage"),
        ("secrets-store", "backstage"),
        ("backstage", "web"),
    ] {
        let done = report.event_index(before, AddOnState::Completed).unwrap();
        let started = report.event_index(after, AddOnState::Running).unwrap();
        assert!(done < started, "{before} must complete before {after} runs");
    }

    let calls = deployer.calls();
    let portal = &calls.iter().find(|c| c.addon == "backstage").unwrap().values;
    assert_eq!(
        portal[r"serviceAccount.annotations.eks\.amazonaws\.com/role-arn"],
        json!("arn:aws:iam::123456789012:role/backstage")
    );
    assert_eq!(
        portal["backstage.appConfig.backend.database.connection.user"],
        json!("portal")
    );
    assert_eq!(portal["ingress.host"], json!("portal.example.com"));
}

#[tokio::test]
async fn test_failed_driver_blocks_portal_and_its_dependents() {
    let scheduler = DependencyScheduler::new(vec![
        addon("web", &["backstage"]),
        backstage().descriptor().unwrap(),
        addon("secrets-store", &[]),
        addon("ebs-csi-driver", &[]),
        addon("monitoring", &[]),
    ]);
    let deployer = Arc::new(
        RecordingDeployer::new()
            .with_behavior("ebs-csi-driver", Behavior::Fail("CSI driver crashloop".into())),
    );

    let report = scheduler.run(&registry(), deployer.clone()).await.unwrap();

    assert_eq!(report.failed(), vec!["web", "backstage", "ebs-csi-driver"]);
    assert_eq!(report.completed(), vec!["secrets-store", "monitoring"]);
    assert_eq!(
        report.outcome("web").unwrap().failure,
        Some(FailureReason::PrerequisiteFailed {
            prerequisite: "ebs-csi-driver".into()
        })
    );
    assert!(!deployer.was_deployed("backstage"));
}
