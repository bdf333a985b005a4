use crate::client::FileStorage;
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::traits::ResourceClient;
use shared_types::{
    FieldResolver, Metadata, Permission, ResolverMap, ResourceRef, Role, Route, Schema,
    TemplateResolver, TypeResolver, Upstream, VirtualService,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn create_test_storage() -> (FileStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    // Long interval: tests drive scans explicitly through `resync()`.
    let config = StorageConfig::local(temp_dir.path()).with_resync_interval(Duration::from_secs(3600));
    let storage = FileStorage::from_config(config).await.unwrap();
    storage.v1().register().await.unwrap();
    (storage, temp_dir)
}

fn test_upstream(name: &str) -> Upstream {
    let mut upstream = Upstream::new(name, "static");
    upstream.spec = serde_json::json!({"hosts": [{"addr": "10.0.0.1", "port": 8080}]});
    upstream
}

fn test_virtual_service(name: &str) -> VirtualService {
    let mut vs = VirtualService::new(name);
    vs.domains = vec![format!("{name}.example.com")];
    vs.routes = vec![Route {
        prefix: "/".to_string(),
        upstream: ResourceRef::new("default", "svc1"),
        function: None,
    }];
    vs
}

fn test_role(name: &str) -> Role {
    let mut role = Role::new(name);
    role.permissions = vec![Permission {
        kind: "schemas".to_string(),
        verbs: vec!["get".to_string(), "list".to_string()],
        resource_names: Vec::new(),
    }];
    role
}

#[tokio::test]
async fn test_create_returns_stored_copy() {
    let (storage, _dir) = create_test_storage().await;
    let mut schema = Schema::new("starwars", "type Query { hero: String }");

    let created = storage.v1().schemas().create(&schema).await.unwrap();
    assert_eq!(created.metadata.resource_version, "1");
    assert!(!created.metadata.uid.is_empty());
    assert!(created.metadata.creation_timestamp.is_some());

    schema.metadata = created.metadata.clone();
    assert_eq!(schema, created);
}

#[tokio::test]
async fn test_create_ignores_caller_version() {
    let (storage, _dir) = create_test_storage().await;
    let mut upstream = test_upstream("svc1");
    upstream.metadata.resource_version = "99".to_string();
    upstream.metadata.uid = "caller-made".to_string();

    let created = storage.v1().upstreams().create(&upstream).await.unwrap();
    assert_eq!(created.metadata.resource_version, "1");
    assert_ne!(created.metadata.uid, "caller-made");
}

#[tokio::test]
async fn test_create_twice_already_exists() {
    let (storage, _dir) = create_test_storage().await;
    let upstream = test_upstream("svc1");

    storage.v1().upstreams().create(&upstream).await.unwrap();
    let err = storage.v1().upstreams().create(&upstream).await.unwrap_err();
    assert!(err.is_already_exists(), "{err}");
}

#[tokio::test]
async fn test_same_name_in_other_namespace_or_kind() {
    let (storage, _dir) = create_test_storage().await;

    let upstream = test_upstream("shared");
    storage.v1().upstreams().create(&upstream).await.unwrap();

    let mut other_ns = test_upstream("shared");
    other_ns.metadata.namespace = "prod".to_string();
    storage.v1().upstreams().create(&other_ns).await.unwrap();

    storage.v1().roles().create(&test_role("shared")).await.unwrap();

    let prod = storage.v1().upstreams().get_in("prod", "shared").await.unwrap();
    assert_eq!(prod.metadata.namespace, "prod");
}

#[tokio::test]
async fn test_empty_namespace_defaults() {
    let (storage, dir) = create_test_storage().await;
    let mut upstream = test_upstream("svc1");
    upstream.metadata.namespace.clear();

    let created = storage.v1().upstreams().create(&upstream).await.unwrap();
    assert_eq!(created.metadata.namespace, "default");
    assert!(dir.path().join("upstreams/default/svc1.json").is_file());
}

#[tokio::test]
async fn test_get_nonexistent() {
    let (storage, _dir) = create_test_storage().await;

    let err = storage.v1().upstreams().get("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("upstreams/default/missing"));
}

#[tokio::test]
async fn test_invalid_names_rejected() {
    let (storage, _dir) = create_test_storage().await;

    let err = storage
        .v1()
        .upstreams()
        .create(&test_upstream("../etc"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));

    let err = storage.v1().upstreams().get("a/b").await.unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
}

// Create, create, update the second with its own version, read both back.
#[tokio::test]
async fn test_create_two_and_update() {
    let (storage, _dir) = create_test_storage().await;
    let upstreams = storage.v1().upstreams();

    let upstream1 = upstreams.create(&test_upstream("svc1")).await.unwrap();
    let mut upstream2 = upstreams.create(&test_upstream("svc2")).await.unwrap();

    upstream2.spec = serde_json::json!({"hosts": [{"addr": "10.0.0.2", "port": 9090}]});
    let updated2 = upstreams.update(&upstream2).await.unwrap();
    assert_eq!(updated2.metadata.resource_version, "2");

    let got1 = upstreams.get("svc1").await.unwrap();
    assert_eq!(got1, upstream1);

    let got2 = upstreams.get("svc2").await.unwrap();
    assert_eq!(got2, updated2);
    assert_eq!(got2.spec["hosts"][0]["port"], 9090);
}

#[tokio::test]
async fn test_create_two_and_update_virtual_services() {
    let (storage, _dir) = create_test_storage().await;
    let services = storage.v1().virtual_services();

    let mut vs1 = services.create(&test_virtual_service("v1")).await.unwrap();
    let vs2 = services.create(&test_virtual_service("v2")).await.unwrap();

    vs1.domains.push("alias.example.com".to_string());
    let updated = services.update(&vs1).await.unwrap();

    assert_eq!(services.get("v1").await.unwrap(), updated);
    assert_eq!(services.get("v2").await.unwrap(), vs2);
}

#[tokio::test]
async fn test_create_two_and_update_roles() {
    let (storage, _dir) = create_test_storage().await;
    let roles = storage.v1().roles();

    let role1 = roles.create(&test_role("v1")).await.unwrap();
    roles.create(&test_role("v2")).await.unwrap();

    let updated = roles.update(&role1).await.unwrap();
    assert_eq!(updated.metadata.resource_version, "2");
    assert_eq!(updated.permissions, role1.permissions);
    assert_eq!(roles.get("v1").await.unwrap(), updated);
}

// Update without a version conflicts; with the created version it succeeds.
#[tokio::test]
async fn test_update_requires_version() {
    let (storage, _dir) = create_test_storage().await;
    let upstreams = storage.v1().upstreams();

    let mut upstream = Upstream::new("u", "a");
    let created = upstreams.create(&upstream).await.unwrap();

    upstream.upstream_type = "b".to_string();
    let err = upstreams.update(&upstream).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");
    assert_eq!(upstreams.get("u").await.unwrap().upstream_type, "a");

    upstream.metadata = created.metadata.clone();
    let updated = upstreams.update(&upstream).await.unwrap();
    upstream.metadata = updated.metadata.clone();
    assert_eq!(updated, upstream);

    let got = upstreams.get("u").await.unwrap();
    assert_eq!(got.upstream_type, "b");
}

#[tokio::test]
async fn test_update_stale_version_leaves_resource_unchanged() {
    let (storage, _dir) = create_test_storage().await;
    let upstreams = storage.v1().upstreams();

    let v1 = upstreams.create(&test_upstream("svc1")).await.unwrap();
    let mut fresh = v1.clone();
    fresh.upstream_type = "aws".to_string();
    let v2 = upstreams.update(&fresh).await.unwrap();

    let mut stale = v1.clone();
    stale.upstream_type = "gcp".to_string();
    let err = upstreams.update(&stale).await.unwrap_err();
    match err {
        StorageError::VersionConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, "1");
            assert_eq!(actual, "2");
        }
        other => panic!("expected version conflict, got {other}"),
    }

    assert_eq!(upstreams.get("svc1").await.unwrap(), v2);
}

#[tokio::test]
async fn test_versions_strictly_advance() {
    let (storage, _dir) = create_test_storage().await;
    let roles = storage.v1().roles();

    let mut current = roles.create(&test_role("admin")).await.unwrap();
    let mut seen = vec![current.metadata.resource_version.clone()];
    for _ in 0..5 {
        current = roles.update(&current).await.unwrap();
        assert!(!seen.contains(&current.metadata.resource_version));
        seen.push(current.metadata.resource_version.clone());
    }
    assert_eq!(seen, vec!["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn test_update_missing_resource() {
    let (storage, _dir) = create_test_storage().await;
    let mut upstream = test_upstream("ghost");
    upstream.metadata.resource_version = "1".to_string();

    let err = storage.v1().upstreams().update(&upstream).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_update_across_recreation_conflicts() {
    let (storage, _dir) = create_test_storage().await;
    let upstreams = storage.v1().upstreams();

    let old = upstreams.create(&test_upstream("svc1")).await.unwrap();
    upstreams.delete("svc1").await.unwrap();
    let recreated = upstreams.create(&test_upstream("svc1")).await.unwrap();

    // Same version number, different lineage.
    assert_eq!(old.metadata.resource_version, recreated.metadata.resource_version);
    let err = upstreams.update(&old).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_concurrent_updates_one_winner() {
    let (storage, _dir) = create_test_storage().await;
    let storage = Arc::new(storage);
    let created = storage
        .v1()
        .upstreams()
        .create(&test_upstream("contended"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let storage = Arc::clone(&storage);
        let mut attempt = created.clone();
        attempt.upstream_type = format!("writer-{i}");
        handles.push(tokio::spawn(async move {
            storage.v1().upstreams().update(&attempt).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(updated) => {
                winners += 1;
                assert_eq!(updated.metadata.resource_version, "2");
            }
            Err(err) => assert!(err.is_conflict(), "{err}"),
        }
    }
    assert_eq!(winners, 1);

    let stored = storage.v1().upstreams().get("contended").await.unwrap();
    assert_eq!(stored.metadata.resource_version, "2");
}

#[tokio::test]
async fn test_concurrent_creates_one_winner() {
    let (storage, _dir) = create_test_storage().await;
    let storage = Arc::new(storage);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage.v1().roles().create(&test_role("racer")).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert!(err.is_already_exists(), "{err}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_delete() {
    let (storage, dir) = create_test_storage().await;
    let upstreams = storage.v1().upstreams();

    upstreams.create(&test_upstream("svc1")).await.unwrap();
    upstreams.delete("svc1").await.unwrap();

    assert!(upstreams.get("svc1").await.unwrap_err().is_not_found());
    assert!(!dir.path().join("upstreams/default/svc1.json").exists());

    let err = upstreams.delete("svc1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_recreate_after_delete_starts_fresh() {
    let (storage, _dir) = create_test_storage().await;
    let roles = storage.v1().roles();

    let first = roles.create(&test_role("ops")).await.unwrap();
    let first = roles.update(&first).await.unwrap();
    assert_eq!(first.metadata.resource_version, "2");

    roles.delete("ops").await.unwrap();
    let again = roles.create(&test_role("ops")).await.unwrap();
    assert_eq!(again.metadata.resource_version, "1");
    assert_ne!(again.metadata.uid, first.metadata.uid);
}

#[tokio::test]
async fn test_list_sorted_across_namespaces() {
    let (storage, _dir) = create_test_storage().await;
    let upstreams = storage.v1().upstreams();

    for (namespace, name) in [("prod", "b"), ("default", "c"), ("default", "b"), ("prod", "a")] {
        let mut upstream = test_upstream(name);
        upstream.metadata.namespace = namespace.to_string();
        upstreams.create(&upstream).await.unwrap();
    }

    let listed: Vec<String> = upstreams
        .list()
        .await
        .unwrap()
        .iter()
        .map(|u| format!("{}/{}", u.metadata.namespace, u.metadata.name))
        .collect();
    assert_eq!(listed, vec!["prod/a", "default/b", "prod/b", "default/c"]);

    let prod = upstreams.list_in("prod").await.unwrap();
    assert_eq!(prod.len(), 2);
    assert!(prod.iter().all(|u| u.metadata.namespace == "prod"));

    assert!(upstreams.list_in("staging").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_empty_kind() {
    let (storage, _dir) = create_test_storage().await;
    assert!(storage.v1().schemas().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resolver_map_round_trip() {
    let (storage, _dir) = create_test_storage().await;

    let mut fields = BTreeMap::new();
    fields.insert(
        "hero".to_string(),
        FieldResolver::Template(TemplateResolver {
            request_template: Some(r#"{"id": {{ marshal (index .Args "id") }}}"#.to_string()),
            response_template: Some("{{ marshal (index . \"name\") }}".to_string()),
            upstream: ResourceRef::new("default", "starwars"),
            function: "GetCharacter".to_string(),
        }),
    );
    let mut types = BTreeMap::new();
    types.insert("Query".to_string(), TypeResolver { fields });
    let map = ResolverMap {
        metadata: Metadata::new("starwars-resolvers"),
        types,
    };

    let created = storage.v1().resolver_maps().create(&map).await.unwrap();
    let got = storage
        .v1()
        .resolver_maps()
        .get("starwars-resolvers")
        .await
        .unwrap();
    assert_eq!(got, created);
    assert_eq!(got.types, map.types);
}

#[tokio::test]
async fn test_on_disk_document_is_inspectable() {
    let (storage, dir) = create_test_storage().await;
    storage
        .v1()
        .upstreams()
        .create(&test_upstream("svc1"))
        .await
        .unwrap();

    let raw = std::fs::read(dir.path().join("upstreams/default/svc1.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(doc["metadata"]["name"], "svc1");
    assert_eq!(doc["metadata"]["namespace"], "default");
    assert_eq!(doc["metadata"]["resourceVersion"], "1");
    assert_eq!(doc["type"], "static");
}

#[tokio::test]
async fn test_construction_fails_on_unusable_location() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("occupied");
    std::fs::write(&file, b"not a directory").unwrap();

    let result = FileStorage::from_config(StorageConfig::local(&file)).await;
    let err = result.err().unwrap();
    assert!(err.is_backing_medium(), "{err}");
}

#[tokio::test]
async fn test_construction_rejects_zero_interval() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig::local(temp_dir.path()).with_resync_interval(Duration::ZERO);

    let result = FileStorage::from_config(config).await;
    assert!(matches!(result, Err(StorageError::Validation(_))));
}
