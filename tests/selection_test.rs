//! Backend selection and dispatcher construction.

mod common;

use std::time::Duration;

use rand::Rng;
use staging_dispatch::config::{FabricMode, StagingConfig};
use staging_dispatch::core::{select_backend, topics, Application, Backend, Buildpack};
use staging_dispatch::dispatch::Stager;

use common::{diego_config, docker_app, harness, ruby_app};

fn random_app(rng: &mut impl Rng, i: usize) -> Application {
    let mut app = Application::new(format!("app-{i}"), "app").with_diego(rng.random_bool(0.5));
    if rng.random_bool(0.5) {
        app = app.with_docker_image("app:latest");
    }
    if rng.random_bool(0.5) {
        app = app.with_package_hash("abc");
    }
    if rng.random_bool(0.3) {
        app = app.with_buildpack(Buildpack::Custom("https://example.com/bp.git".into()));
    }
    app
}

fn random_config(rng: &mut impl Rng) -> StagingConfig {
    StagingConfig {
        diego_staging: if rng.random_bool(0.5) {
            FabricMode::Enabled
        } else {
            FabricMode::Disabled
        },
        diego_docker: rng.random_bool(0.5),
        ..StagingConfig::default()
    }
}

#[test]
fn test_selection_is_pure() {
    let mut rng = rand::rng();
    for i in 0..500 {
        let app = random_app(&mut rng, i);
        let cfg = random_config(&mut rng);
        let first = select_backend(&app, &cfg);
        assert_eq!(select_backend(&app.clone(), &cfg.clone()), first);
    }
}

#[test]
fn test_kill_switch_always_selects_legacy_pool() {
    let mut rng = rand::rng();
    for i in 0..500 {
        let app = random_app(&mut rng, i).with_diego(true);
        let cfg = StagingConfig {
            diego_staging: FabricMode::Disabled,
            ..random_config(&mut rng)
        };
        assert_eq!(select_backend(&app, &cfg), Backend::LegacyPool);
    }
}

#[test]
fn test_image_reference_never_selects_buildpack_flavor() {
    let mut rng = rand::rng();
    for i in 0..500 {
        let app = random_app(&mut rng, i).with_docker_image("app:latest");
        let backend = select_backend(&app, &random_config(&mut rng));
        assert_ne!(backend, Backend::ModernBuildpack);
    }
}

#[tokio::test]
async fn test_pinned_buildpack_app_gets_traditional_dispatcher() {
    let h = harness(&["ruby"]);
    let stager = h.stagers.stager_for_app(&ruby_app("a1"), &diego_config());

    assert_eq!(stager.backend(), Backend::ModernBuildpack);
    let Stager::Diego(diego) = stager else {
        panic!("expected a modern-fabric dispatcher");
    };
    assert_eq!(diego.messenger().completion_topic(), topics::DIEGO_STAGING_FINISHED);
    assert_eq!(diego.messenger().start_topic(), topics::DIEGO_STAGING_START);
    assert_eq!(diego.completion_handler().backend(), Backend::ModernBuildpack);
    assert_eq!(diego.messenger().protocol().backend(), Backend::ModernBuildpack);
}

#[tokio::test]
async fn test_image_app_gets_docker_dispatcher() {
    let h = harness(&["ruby"]);
    let stager = h.stagers.stager_for_app(&docker_app("a1"), &diego_config());

    let Stager::Diego(diego) = stager else {
        panic!("expected a modern-fabric dispatcher");
    };
    assert_eq!(diego.messenger().backend(), Backend::ModernImage);
    assert_eq!(
        diego.messenger().completion_topic(),
        topics::DIEGO_DOCKER_STAGING_FINISHED
    );
    assert_eq!(diego.completion_handler().backend(), Backend::ModernImage);
}

#[tokio::test]
async fn test_disabled_fabric_gets_legacy_dispatcher() {
    let h = harness(&["ruby"]);
    let cfg = StagingConfig {
        diego_staging: FabricMode::Disabled,
        ..diego_config()
    };

    let stager = h.stagers.stager_for_app(&docker_app("a1"), &cfg);
    assert!(matches!(stager, Stager::LegacyPool(_)));
    assert_eq!(stager.backend(), Backend::LegacyPool);
}

#[tokio::test]
async fn test_timeout_fixed_at_construction() {
    let h = harness(&["ruby"]);
    let mut cfg = StagingConfig {
        timeout_in_seconds: 120,
        ..diego_config()
    };
    let stager = h.stagers.stager_for_app(&ruby_app("a1"), &cfg);

    cfg.timeout_in_seconds = 5;
    assert_eq!(stager.timeout(), Duration::from_secs(120));
    assert_eq!(
        h.stagers.stager_for_app(&ruby_app("a1"), &cfg).timeout(),
        Duration::from_secs(5)
    );
}

#[tokio::test]
async fn test_dispatcher_keeps_its_own_copy_of_app() {
    let h = harness(&["ruby"]);
    let app = ruby_app("a1");
    let stager = h.stagers.stager_for_app(&app, &diego_config());
    assert_eq!(stager.app(), &app);
}
