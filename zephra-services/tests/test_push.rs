//! Push notification handler integration tests.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use zephra_core::error::ZephraError;
use zephra_models::{NotificationPayload, PermissionState};
use zephra_services::event_bus::{AppEvent, EventBus};
use zephra_services::service::Service;
use zephra_services::PushService;

use common::{drain_events, MockNotificationSink, MockPushPlatform, MockPushRegistry, TEST_VAPID_KEY};

struct Fixture {
    platform: Arc<MockPushPlatform>,
    registry: Arc<MockPushRegistry>,
    notifier: Arc<MockNotificationSink>,
    bus: EventBus,
    push: PushService,
}

fn fixture(platform: MockPushPlatform, vapid_key: &str) -> Fixture {
    let platform = Arc::new(platform);
    let registry = Arc::new(MockPushRegistry::default());
    let notifier = Arc::new(MockNotificationSink::default());
    let bus = common::create_test_event_bus();
    let push = PushService::new(platform.clone(), registry.clone(), notifier.clone(), vapid_key, bus.clone());
    Fixture { platform, registry, notifier, bus, push }
}

#[tokio::test]
async fn permission_prompt_happens_once() {
    let f = fixture(MockPushPlatform::new(PermissionState::Granted), TEST_VAPID_KEY);
    let mut rx = f.bus.subscribe();
    f.push.init().await.unwrap();

    assert_eq!(f.push.request_permission().await.unwrap(), PermissionState::Granted);
    assert_eq!(f.push.request_permission().await.unwrap(), PermissionState::Granted);
    assert_eq!(f.platform.prompts.load(Ordering::SeqCst), 1);
    assert_eq!(
        drain_events(&mut rx),
        vec![AppEvent::PermissionChanged { permission: PermissionState::Granted }]
    );
}

#[tokio::test]
async fn subscribe_requests_permission_and_uploads() {
    let f = fixture(MockPushPlatform::new(PermissionState::Granted), TEST_VAPID_KEY);
    let mut rx = f.bus.subscribe();
    f.push.init().await.unwrap();

    let sub = f.push.subscribe().await.unwrap().expect("subscription");
    assert_eq!(sub.endpoint, "https://push.example.com/send/device-1");
    assert_eq!(f.registry.registered.lock().unwrap().as_slice(), &[sub.clone()]);

    let status = f.push.push_status();
    assert!(status.subscribed);
    assert_eq!(status.permission, PermissionState::Granted);
    assert_eq!(status.endpoint.as_deref(), Some(sub.endpoint.as_str()));

    let events = drain_events(&mut rx);
    assert!(events.contains(&AppEvent::PushSubscribed { endpoint: sub.endpoint.clone() }));
}

#[tokio::test]
async fn refused_permission_yields_no_subscription() {
    let f = fixture(MockPushPlatform::new(PermissionState::Denied), TEST_VAPID_KEY);
    f.push.init().await.unwrap();

    assert!(f.push.subscribe().await.unwrap().is_none());
    assert_eq!(f.platform.subscribe_calls.load(Ordering::SeqCst), 0);
    assert!(f.registry.registered.lock().unwrap().is_empty());

    // A denial is final: no second prompt.
    assert_eq!(f.push.request_permission().await.unwrap(), PermissionState::Denied);
    assert_eq!(f.platform.prompts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subscribe_requires_valid_server_key() {
    let f = fixture(MockPushPlatform::granted(), "");
    let err = f.push.subscribe().await.unwrap_err();
    assert!(matches!(err, ZephraError::MissingConfig(_)));

    let f = fixture(MockPushPlatform::granted(), "not base64!");
    let err = f.push.subscribe().await.unwrap_err();
    assert!(matches!(err, ZephraError::Push(_)));
    assert_eq!(f.platform.subscribe_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let f = fixture(MockPushPlatform::granted(), TEST_VAPID_KEY);
    f.push.init().await.unwrap();
    f.push.subscribe().await.unwrap().unwrap();

    f.registry.fail_unregister.store(true, Ordering::SeqCst);
    assert!(f.push.unsubscribe().await.unwrap());
    assert!(!f.platform.has_subscription());
    assert!(!f.push.push_status().subscribed);

    f.registry.fail_unregister.store(false, Ordering::SeqCst);
    assert!(!f.push.unsubscribe().await.unwrap());
    assert!(f.registry.unregistered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_unsubscribe_keeps_local_record() {
    let f = fixture(MockPushPlatform::granted(), TEST_VAPID_KEY);
    f.push.init().await.unwrap();
    let sub = f.push.subscribe().await.unwrap().unwrap();

    f.platform.fail_unsubscribe.store(true, Ordering::SeqCst);
    assert!(matches!(f.push.unsubscribe().await, Err(ZephraError::Push(_))));
    assert!(f.platform.has_subscription());
    assert_eq!(f.push.subscription().map(|s| s.endpoint), Some(sub.endpoint.clone()));
    assert!(f.push.push_status().subscribed);
    assert!(f.registry.unregistered.lock().unwrap().is_empty());

    f.platform.fail_unsubscribe.store(false, Ordering::SeqCst);
    assert!(f.push.unsubscribe().await.unwrap());
    assert!(f.push.subscription().is_none());
    assert_eq!(f.registry.unregistered.lock().unwrap().as_slice(), &[sub.endpoint]);
}

#[tokio::test]
async fn existing_subscription_restored_on_init() {
    let f = fixture(MockPushPlatform::granted(), TEST_VAPID_KEY);
    f.push.subscribe().await.unwrap();

    let restored = PushService::new(
        f.platform.clone(),
        f.registry.clone(),
        f.notifier.clone(),
        TEST_VAPID_KEY,
        EventBus::new(16),
    );
    restored.init().await.unwrap();
    assert!(restored.push_status().subscribed);

    assert!(restored.unsubscribe().await.unwrap());
    assert_eq!(
        f.registry.unregistered.lock().unwrap().as_slice(),
        &["https://push.example.com/send/device-1".to_string()]
    );
}

#[tokio::test]
async fn show_notification_requires_registration_and_permission() {
    let f = fixture(MockPushPlatform::new(PermissionState::Granted), TEST_VAPID_KEY);
    let mut rx = f.bus.subscribe();
    f.push.init().await.unwrap();
    let payload = NotificationPayload::new("Hello", "World");

    let err = f.push.show_notification(&payload).await.unwrap_err();
    assert!(matches!(err, ZephraError::Notification(_)));

    f.push.set_registration_active(true);
    let err = f.push.show_notification(&payload).await.unwrap_err();
    assert!(matches!(err, ZephraError::PermissionDenied(_)));

    let errors = drain_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, AppEvent::NotificationError { .. }))
        .count();
    assert_eq!(errors, 2);
    assert!(f.notifier.shown().is_empty());

    f.push.request_permission().await.unwrap();
    f.push.show_notification(&payload).await.unwrap();
    assert_eq!(f.notifier.shown(), vec![payload]);
    let shown = common::wait_for(&mut rx, Duration::from_secs(1), |e| matches!(e, AppEvent::NotificationShown { .. })).await;
    assert_eq!(shown, Some(AppEvent::NotificationShown { title: "Hello".into(), tag: None }));
}

#[tokio::test]
async fn unsupported_platform_degrades() {
    let f = fixture(MockPushPlatform::unsupported(), TEST_VAPID_KEY);
    f.push.init().await.unwrap();

    assert_eq!(f.push.request_permission().await.unwrap(), PermissionState::Denied);
    assert!(f.push.subscribe().await.unwrap().is_none());
    assert!(!f.push.unsubscribe().await.unwrap());
    assert!(!f.push.push_status().supported);
    assert_eq!(f.platform.prompts.load(Ordering::SeqCst), 0);

    f.push.set_registration_active(true);
    let err = f.push.show_notification(&NotificationPayload::new("a", "b")).await.unwrap_err();
    assert!(matches!(err, ZephraError::Unsupported(_)));
}
