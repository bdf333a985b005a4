use anyhow::Result;
use shared_types::{Kind, ResourceRef, Route, Schema, Upstream, VirtualService};
use storage_backend::{FileStorage, ResourceClient, ResourceEvent, StorageConfig};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let config = StorageConfig::from_env()?;
    println!("Using storage config: {:?}", config);

    let storage = FileStorage::from_config(config).await?;
    storage.v1().register().await?;

    let mut events = storage.watch();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event {
                ResourceEvent::Added(r) => info!("added {} @ {}", r.key, r.metadata.resource_version),
                ResourceEvent::Updated { current, .. } => {
                    info!("updated {} @ {}", current.key, current.metadata.resource_version)
                }
                ResourceEvent::Removed(r) => info!("removed {}", r.key),
            }
        }
    });

    // Create an upstream
    let mut upstream = Upstream::new("starwars", "static");
    upstream.spec = serde_json::json!({"hosts": [{"addr": "swapi.example.com", "port": 443}]});
    let upstream = match storage.v1().upstreams().create(&upstream).await {
        Ok(created) => created,
        Err(e) if e.is_already_exists() => storage.v1().upstreams().get("starwars").await?,
        Err(e) => return Err(e.into()),
    };
    println!(
        "\nUpstream {} at version {}",
        upstream.metadata.name, upstream.metadata.resource_version
    );

    // Update it; the version from the read above is required
    let mut changed = upstream.clone();
    changed.spec["hosts"][0]["port"] = serde_json::json!(8443);
    let updated = storage.v1().upstreams().update(&changed).await?;
    println!("Updated to version {}", updated.metadata.resource_version);

    // A stale copy is rejected
    if let Err(e) = storage.v1().upstreams().update(&upstream).await {
        println!("Stale update rejected: {}", e);
    }

    // Route a virtual service to it and attach a schema
    let mut vs = VirtualService::new("starwars-gateway");
    vs.domains = vec!["*".to_string()];
    vs.routes = vec![Route {
        prefix: "/graphql".to_string(),
        upstream: ResourceRef::new("default", "starwars"),
        function: None,
    }];
    storage.v1().virtual_services().create(&vs).await.ok();

    let schema = Schema::new("starwars", "type Query { hero: String }");
    storage.v1().schemas().create(&schema).await.ok();

    println!("\nKinds managed:");
    for kind in storage.v1().kinds() {
        println!("  - {}", kind);
    }

    println!("\nUpstreams:");
    for upstream in storage.v1().upstreams().list().await? {
        println!(
            "  - {}/{} ({})",
            upstream.metadata.namespace, upstream.metadata.name, upstream.upstream_type
        );
    }

    // Let the resync loop report what happened
    let changes = storage.resync().await;
    println!("\nResync observed {} changes", changes.len());

    let cache = storage.cache().await;
    println!("Cached upstreams: {}", cache.list(Kind::Upstream).len());

    Ok(())
}
