//! Field-group checks against the manifests shipped under deploy/kubernetes

use kv_vault_probe::defaults::{REDIS_MANIFEST, VAULT_MANIFEST};
use kv_vault_probe::manifest::{self, CheckGroup, Manifest};
use std::path::PathBuf;

fn load(relative: &str) -> Manifest {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("deploy/kubernetes")
        .join(relative);
    Manifest::load(path).unwrap()
}

#[test]
fn test_redis_manifest_satisfies_all_checks() {
    let outcomes = manifest::validate(&load(REDIS_MANIFEST), &manifest::redis_expectations());

    let groups: Vec<CheckGroup> = outcomes.iter().map(|o| o.group).collect();
    assert_eq!(
        groups,
        vec![CheckGroup::Version, CheckGroup::Ports, CheckGroup::Volumes, CheckGroup::Security]
    );
    for outcome in &outcomes {
        assert!(outcome.passed(), "{} failed: {:?}", outcome.name(), outcome.result);
    }
}

#[test]
fn test_vault_manifest_satisfies_all_checks() {
    let outcomes = manifest::validate(&load(VAULT_MANIFEST), &manifest::vault_expectations());

    assert_eq!(outcomes.len(), 5);
    for outcome in &outcomes {
        assert!(outcome.passed(), "{} failed: {:?}", outcome.name(), outcome.result);
    }
}

#[test]
fn test_vault_manifest_accessors() {
    let vault = load(VAULT_MANIFEST);

    assert!(vault.image().unwrap().ends_with("vault:1.15.2"));
    assert_eq!(vault.container_ports().unwrap(), vec![8200, 8201]);

    let ctx = vault.security_context().unwrap();
    assert_eq!(ctx.run_as_non_root, Some(true));
    assert_eq!(ctx.run_as_user, Some(1000));

    let addr = &vault.env().unwrap()["VAULT_ADDR"];
    assert!(addr == "https://127.0.0.1:8200" || addr == "http://127.0.0.1:8200");
}

#[test]
fn test_redis_manifest_accessors() {
    let redis = load(REDIS_MANIFEST);

    assert_eq!(redis.image().unwrap(), "redis:7.2.4");
    assert_eq!(redis.container_ports().unwrap().first(), Some(&6379));
    assert!(redis.volume_names().unwrap().contains(&"redis-data".to_string()));
    assert_ne!(redis.security_context().unwrap().run_as_root, Some(true));
}

#[test]
fn test_expectations_are_not_interchangeable() {
    let outcomes = manifest::validate(&load(REDIS_MANIFEST), &manifest::vault_expectations());
    assert!(outcomes.iter().any(|o| !o.passed()));
}
