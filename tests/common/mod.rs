//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use staging_dispatch::builders::build_stagers;
use staging_dispatch::config::StagingConfig;
use staging_dispatch::core::{Application, Buildpack, InMemoryAuditSink, StagingTaskId};
use staging_dispatch::dispatch::{Stagers, StagingCollaborators};
use staging_dispatch::infra::{
    InMemoryBuildpackCatalog, InMemoryMessageBus, InMemoryRunners, InMemoryStagerPool,
    StagerAdvertisement, StagingUrlGenerator,
};
use staging_dispatch::runtime::TokioSpawner;

pub const WAIT: Duration = Duration::from_secs(2);

pub struct Harness {
    pub bus: Arc<InMemoryMessageBus>,
    pub runners: InMemoryRunners,
    pub pool: Arc<InMemoryStagerPool>,
    pub audit: InMemoryAuditSink,
    pub stagers: Stagers,
}

/// Must be called from inside a tokio runtime.
pub fn harness(buildpacks: &[&str]) -> Harness {
    staging_dispatch::util::init_tracing();
    let bus = Arc::new(InMemoryMessageBus::new());
    let runners = InMemoryRunners::new();
    let pool = Arc::new(InMemoryStagerPool::default());
    let audit = InMemoryAuditSink::new(1000);

    let collaborators = StagingCollaborators {
        bus: bus.clone(),
        stager_pool: pool.clone(),
        catalog: Arc::new(InMemoryBuildpackCatalog::from_names(buildpacks)),
        urls: Arc::new(StagingUrlGenerator::new("http://cc.internal:9022/")),
        runners: Arc::new(runners.clone()),
    };
    let stagers = build_stagers(
        collaborators,
        Arc::new(TokioSpawner::current()),
        Some(Box::new(audit.clone())),
    )
    .expect("bus is open");

    Harness {
        bus,
        runners,
        pool,
        audit,
        stagers,
    }
}

pub fn diego_config() -> StagingConfig {
    StagingConfig {
        diego_docker: true,
        ..StagingConfig::default()
    }
}

pub fn ruby_app(guid: &str) -> Application {
    Application::new(guid, "my-app")
        .with_package_hash("abc123")
        .with_buildpack(Buildpack::Named("ruby".into()))
        .with_diego(true)
}

pub fn docker_app(guid: &str) -> Application {
    Application::new(guid, "my-image-app")
        .with_package_hash("abc123")
        .with_docker_image("app:latest")
        .with_diego(true)
}

pub fn advertise(pool: &InMemoryStagerPool, id: &str, memory_mb: u32) {
    pool.process_advertise(StagerAdvertisement {
        id: id.to_string(),
        stacks: vec!["cflinuxfs2".to_string()],
        available_memory_mb: memory_mb,
        available_disk_mb: 16384,
    });
}

pub fn traditional_success(app_guid: &str, task_id: StagingTaskId) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "app_id": app_guid,
        "task_id": task_id,
        "buildpack_key": "ruby-key",
        "detected_buildpack": "Ruby",
        "execution_metadata": "{\"cmd\":[\"bundle\"]}",
        "detected_start_command": {"web": "bundle exec rackup"},
    }))
    .unwrap()
}

pub fn traditional_failure(app_guid: &str, task_id: StagingTaskId) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "app_id": app_guid,
        "task_id": task_id,
        "error": {"id": "StagingError", "message": "compile failed"},
    }))
    .unwrap()
}

pub fn docker_success(app_guid: &str, task_id: StagingTaskId) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "app_id": app_guid,
        "task_id": task_id,
        "execution_metadata": "{\"cmd\":[\"/start\"]}",
        "detected_start_command": {"web": "/start"},
    }))
    .unwrap()
}
