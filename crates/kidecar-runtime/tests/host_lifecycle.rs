//! Lifecycle tests for the sidecar host

use kidecar_config::{PluginDescriptor, SidecarConfig};
use kidecar_plugin_api::testing::{test_capabilities, MockConfig, MockPlugin};
use kidecar_runtime::{HostError, PluginState, SidecarHost};
use kidecar_store::PodIdentity;
use serde_json::json;
use std::time::Duration;

fn config(plugins: Vec<PluginDescriptor>) -> SidecarConfig {
    let mut config = SidecarConfig {
        plugins,
        ..Default::default()
    };
    config.host.stop_timeout = Duration::from_secs(1);
    config
}

fn host(plugins: Vec<PluginDescriptor>) -> SidecarHost {
    let (caps, _cluster) = test_capabilities(PodIdentity::new("default", "web-0"));
    SidecarHost::new(config(plugins), caps)
}

fn descriptor(name: &str) -> PluginDescriptor {
    PluginDescriptor::new(name, json!({"label": name}))
}

#[tokio::test]
async fn test_registers_exactly_configured_plugins() {
    let host = host(vec![descriptor("alpha"), descriptor("beta")]);

    for name in ["alpha", "beta", "gamma"] {
        host.register(MockPlugin::new(name)).await.unwrap();
    }

    assert_eq!(host.plugin_names(), vec!["alpha", "beta"]);
    assert_eq!(host.plugin_state("alpha"), Some(PluginState::Bound));
}

#[tokio::test]
async fn test_unregistered_plugin_is_never_started() {
    let host = host(vec![descriptor("alpha"), descriptor("ghost")]);
    let alpha = MockPlugin::new("alpha");
    host.register(alpha.clone()).await.unwrap();

    assert_eq!(host.start_all(), 1);
    assert_eq!(host.plugin_state("ghost"), None);

    host.shutdown().await;
    assert_eq!(alpha.start_call_count(), 1);
}

#[tokio::test]
async fn test_config_is_bound_before_init() {
    let host = host(vec![descriptor("alpha")]);
    let alpha = MockPlugin::new("alpha");
    host.register(alpha.clone()).await.unwrap();

    assert_eq!(
        alpha.init_configs(),
        vec![MockConfig {
            label: Some("alpha".to_string())
        }]
    );
}

#[tokio::test]
async fn test_bind_and_init_failures_are_distinguished() {
    let host = host(vec![
        PluginDescriptor::new("alpha", json!({"label": 42})),
        descriptor("beta"),
    ]);

    let err = host.register(MockPlugin::new("alpha")).await.unwrap_err();
    assert!(matches!(err, HostError::ConfigBind { ref plugin, .. } if plugin == "alpha"));

    let err = host
        .register(MockPlugin::new("beta").failing_init("missing endpoints"))
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::PluginInit { ref plugin, .. } if plugin == "beta"));

    assert!(host.plugin_names().is_empty());
}

#[tokio::test]
async fn test_same_name_replaces_entry() {
    let host = host(vec![descriptor("alpha")]);
    let first = MockPlugin::new("alpha");
    let second = MockPlugin::new("alpha");

    host.register(first.clone()).await.unwrap();
    host.register(second.clone()).await.unwrap();
    assert_eq!(host.plugin_names().len(), 1);

    host.start_all();
    tokio::task::yield_now().await;
    host.shutdown().await;

    assert_eq!(first.start_call_count(), 0);
    assert_eq!(second.start_call_count(), 1);
}

#[tokio::test]
async fn test_start_returns_first_plugin_error() {
    let host = host(vec![descriptor("steady"), descriptor("flaky")]);
    let steady = MockPlugin::new("steady");
    host.register(steady.clone()).await.unwrap();
    host.register(MockPlugin::new("flaky").failing_start(Duration::from_millis(50), "probe crashed"))
        .await
        .unwrap();

    let err = host.start().await.unwrap_err();
    assert!(matches!(err, HostError::PluginFailed { ref plugin, .. } if plugin == "flaky"));
    assert_eq!(err.plugin(), Some("flaky"));

    host.shutdown().await;
    assert!(!steady.is_running());
    assert!(host.plugin_state("flaky").unwrap().is_failed());
}

#[tokio::test]
async fn test_start_returns_ok_on_shutdown() {
    let host = host(vec![descriptor("alpha")]);
    let alpha = MockPlugin::new("alpha");
    host.register(alpha.clone()).await.unwrap();

    let token = host.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    host.start().await.unwrap();
    host.shutdown().await;
    assert_eq!(alpha.start_call_count(), 1);
    assert!(!alpha.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_status_is_polled_periodically() {
    let mut config = config(vec![descriptor("alpha"), descriptor("beta")]);
    config.host.poll_interval = Duration::from_secs(5);
    config.host.poll_stagger = Duration::from_secs(1);
    let (caps, _cluster) = test_capabilities(PodIdentity::new("default", "web-0"));
    let host = SidecarHost::new(config, caps);

    let alpha = MockPlugin::new("alpha");
    let beta = MockPlugin::new("beta");
    host.register(alpha.clone()).await.unwrap();
    host.register(beta.clone()).await.unwrap();

    host.start_polling();

    // alpha polls at 0s and 5s, beta at 1s and 6s
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(alpha.status_call_count(), 1);
    assert_eq!(beta.status_call_count(), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(alpha.status_call_count(), 2);
    assert_eq!(beta.status_call_count(), 2);

    let status = host.plugin_status("alpha").await.unwrap();
    assert_eq!(status.name, "alpha");
    assert_eq!(status.infos, vec!["alpha".to_string()]);
    assert_eq!(alpha.status_call_count(), 2);

    host.shutdown().await;
}

#[tokio::test]
async fn test_plugin_status_polls_when_uncached() {
    let host = host(vec![descriptor("alpha"), descriptor("broken")]);
    let alpha = MockPlugin::new("alpha");
    host.register(alpha.clone()).await.unwrap();
    host.register(MockPlugin::new("broken").failing_status("no data"))
        .await
        .unwrap();

    let status = host.plugin_status("alpha").await.unwrap();
    assert!(!status.running);
    assert_eq!(alpha.status_call_count(), 1);

    // cached now
    host.plugin_status("alpha").await.unwrap();
    assert_eq!(alpha.status_call_count(), 1);

    let err = host.plugin_status("broken").await.unwrap_err();
    assert!(matches!(err, HostError::StatusUnavailable { .. }));

    let err = host.plugin_status("missing").await.unwrap_err();
    assert!(matches!(err, HostError::PluginNotFound(ref name) if name == "missing"));
}

#[tokio::test]
async fn test_remove_plugin() {
    let host = host(vec![descriptor("alpha"), descriptor("sticky")]);
    let alpha = MockPlugin::new("alpha");
    host.register(alpha.clone()).await.unwrap();
    host.register(MockPlugin::new("sticky").failing_stop("busy"))
        .await
        .unwrap();

    host.remove_plugin("alpha").await.unwrap();
    assert!(!host.is_registered("alpha"));
    assert_eq!(alpha.stop_call_count(), 1);

    let err = host.remove_plugin("sticky").await.unwrap_err();
    assert!(matches!(err, HostError::PluginStop { .. }));
    assert!(host.is_registered("sticky"));

    let err = host.remove_plugin("alpha").await.unwrap_err();
    assert!(matches!(err, HostError::PluginNotFound(_)));
}

#[tokio::test]
async fn test_stop_all_collects_failures() {
    let host = host(vec![descriptor("alpha"), descriptor("beta"), descriptor("gamma")]);
    let alpha = MockPlugin::new("alpha");
    let gamma = MockPlugin::new("gamma");
    host.register(alpha.clone()).await.unwrap();
    host.register(MockPlugin::new("beta").failing_stop("busy"))
        .await
        .unwrap();
    host.register(gamma.clone()).await.unwrap();

    host.start_all();
    tokio::task::yield_now().await;

    let err = host.stop_all().await.unwrap_err();
    match err {
        HostError::StopAll(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].plugin(), Some("beta"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(alpha.stop_call_count(), 1);
    assert_eq!(gamma.stop_call_count(), 1);
    assert_eq!(host.plugin_state("alpha"), Some(PluginState::Stopped));

    host.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_bounded_by_stop_timeout() {
    let host = host(vec![descriptor("alpha")]);
    let alpha = MockPlugin::new("alpha").slow_stop(Duration::from_secs(60));
    host.register(alpha.clone()).await.unwrap();

    let err = host.remove_plugin("alpha").await.unwrap_err();
    match err {
        HostError::PluginStop { ref plugin, ref source } => {
            assert_eq!(plugin, "alpha");
            assert!(source.to_string().contains("stop did not complete within 1s"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(host.is_registered("alpha"));
    assert_eq!(alpha.stop_call_count(), 1);
}

#[tokio::test]
async fn test_liveness_endpoint_bind_failure() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = config(vec![descriptor("alpha")]);
    config.host.web_server.enabled = true;
    config.host.web_server.listen = occupied.local_addr().unwrap();

    let (caps, _cluster) = test_capabilities(PodIdentity::new("default", "web-0"));
    let host = SidecarHost::new(config, caps);

    let err = host.start().await.unwrap_err();
    assert!(matches!(err, HostError::Server(_)));
}
