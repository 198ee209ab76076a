//! Legacy pool placement, dispatch and completion.

mod common;

use staging_dispatch::completion::CompletionHandler;
use staging_dispatch::config::{FabricMode, StagingConfig};
use staging_dispatch::core::{
    topics, AttemptState, Backend, DispatchError, FailureKind, MessageBus, Resolution,
    StagingTaskId,
};
use staging_dispatch::dispatch::{LegacyStagingRequest, Stager};

use common::{advertise, diego_config, harness, ruby_app, WAIT};

fn legacy_success(app_guid: &str, task_id: StagingTaskId) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "app_id": app_guid,
        "task_id": task_id,
        "stager_id": "stager-a",
        "buildpack_key": "ruby-key",
        "detected_buildpack": "Ruby",
        "detected_start_command": "bundle exec rackup",
    }))
    .unwrap()
}

#[tokio::test]
async fn test_request_addressed_to_selected_stager() {
    let h = harness(&["ruby", "node"]);
    advertise(&h.pool, "stager-a", 2048);
    advertise(&h.pool, "stager-b", 8192);

    let stager = h
        .stagers
        .stager_for_app(&ruby_app("app-1").with_diego(false), &diego_config());
    assert!(matches!(stager, Stager::LegacyPool(_)));

    let ticket = stager.stage().await.unwrap();
    assert_eq!(ticket.backend, Backend::LegacyPool);

    let sent = h.bus.published(&topics::dea_staging_start("stager-b"));
    assert_eq!(sent.len(), 1);
    assert!(h.bus.published(&topics::dea_staging_start("stager-a")).is_empty());

    let request: LegacyStagingRequest = serde_json::from_slice(&sent[0].payload).unwrap();
    assert_eq!(request.app_id, "app-1");
    assert_eq!(request.task_id, ticket.task_id);
    assert_eq!(request.reply_to, topics::DEA_STAGING_FINISHED);
    assert_eq!(request.buildpack.as_deref(), Some("ruby-key"));
    assert_eq!(request.memory_mb, 1024);
    assert_eq!(request.disk_mb, 4096);
    assert_eq!(request.timeout, 900);
    assert_eq!(
        request.download_uri,
        "http://cc.internal:9022/staging/apps/app-1"
    );

    // Memory promised to the build is held until the next advertisement.
    assert_eq!(h.pool.available_memory_mb("stager-b"), Some(8192 - 1024));
}

#[tokio::test]
async fn test_fabric_disabled_routes_everything_to_pool() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "stager-a", 4096);
    let config = StagingConfig {
        diego_staging: FabricMode::Disabled,
        ..diego_config()
    };

    let ticket = h
        .stagers
        .stager_for_app(&ruby_app("app-2"), &config)
        .stage()
        .await
        .unwrap();
    assert_eq!(ticket.backend, Backend::LegacyPool);
    assert!(h.bus.published(topics::DIEGO_STAGING_START).is_empty());
}

#[tokio::test]
async fn test_no_stager_available() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "tiny", 512);

    let err = h
        .stagers
        .stager_for_app(&ruby_app("app-3").with_diego(false), &diego_config())
        .stage()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::NoStagerAvailable { memory_mb: 1024, .. }
    ));
    assert!(h.bus.all_published().is_empty());
    assert_eq!(h.stagers.attempts().state("app-3"), None);
}

#[tokio::test]
async fn test_legacy_completion_starts_runner() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "stager-a", 4096);
    let ticket = h
        .stagers
        .stager_for_app(&ruby_app("app-4").with_diego(false), &diego_config())
        .stage()
        .await
        .unwrap();

    h.bus
        .publish(
            topics::DEA_STAGING_FINISHED,
            legacy_success("app-4", ticket.task_id),
        )
        .await
        .unwrap();
    assert!(h.runners.wait_for(1, WAIT).await);

    let started = h.runners.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].backend, Backend::LegacyPool);
    assert_eq!(
        started[0].detected_start_command.as_deref(),
        Some("bundle exec rackup")
    );
    assert_eq!(h.stagers.attempts().state("app-4"), Some(AttemptState::Succeeded));
}

#[tokio::test]
async fn test_legacy_error_string_reported() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "stager-a", 4096);
    let ticket = h
        .stagers
        .stager_for_app(&ruby_app("app-5").with_diego(false), &diego_config())
        .stage()
        .await
        .unwrap();

    let payload = serde_json::to_vec(&serde_json::json!({
        "app_id": "app-5",
        "task_id": ticket.task_id,
        "error": "buildpack compilation step failed",
    }))
    .unwrap();
    let resolution = h.stagers.handlers().legacy.staging_complete(&payload);
    assert_eq!(resolution, Some(Resolution::Applied));

    let failures = h.runners.failures(Some(FailureKind::BackendReported));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "buildpack compilation step failed");
    assert!(failures[0].error_id.is_none());
}

#[tokio::test]
async fn test_modern_completion_for_legacy_attempt_is_discarded() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "stager-a", 4096);
    let ticket = h
        .stagers
        .stager_for_app(&ruby_app("app-6").with_diego(false), &diego_config())
        .stage()
        .await
        .unwrap();

    let resolution = h
        .stagers
        .handlers()
        .traditional
        .staging_complete(&common::traditional_success("app-6", ticket.task_id));
    assert!(matches!(resolution, Some(Resolution::Discarded(_))));
    assert_eq!(h.runners.total(), 0);
    assert_eq!(h.stagers.attempts().state("app-6"), Some(AttemptState::Dispatched));
}

#[tokio::test]
async fn test_concurrent_stages_do_not_overbook_stager() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "stager-a", 1536);
    let config = diego_config();
    let first = h
        .stagers
        .stager_for_app(&ruby_app("app-7").with_diego(false), &config);
    let second = h
        .stagers
        .stager_for_app(&ruby_app("app-8").with_diego(false), &config);

    let (a, b) = tokio::join!(first.stage(), second.stage());

    let placed = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(placed, 1);
    assert!(matches!(
        a.err().or(b.err()),
        Some(DispatchError::NoStagerAvailable { .. })
    ));
    assert_eq!(h.pool.available_memory_mb("stager-a"), Some(512));
}

#[tokio::test]
async fn test_failed_publish_releases_reserved_memory() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "stager-a", 4096);
    h.bus.close();

    let err = h
        .stagers
        .stager_for_app(&ruby_app("app-9").with_diego(false), &diego_config())
        .stage()
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Publish(_)));
    assert_eq!(h.pool.available_memory_mb("stager-a"), Some(4096));
    assert_eq!(h.stagers.attempts().outstanding(), 0);
}

#[tokio::test]
async fn test_refused_restage_releases_reserved_memory() {
    let h = harness(&["ruby"]);
    advertise(&h.pool, "stager-a", 4096);
    let app = ruby_app("app-10").with_diego(false);

    h.stagers.stager_for_app(&app, &diego_config()).stage().await.unwrap();
    let err = h
        .stagers
        .stager_for_app(&app, &diego_config())
        .stage()
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::AttemptInFlight(_)));
    assert_eq!(h.pool.available_memory_mb("stager-a"), Some(4096 - 1024));
}
