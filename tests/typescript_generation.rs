//! TypeScript Generation Tests
//!
//! Validates that snapshot and status types can be exported to TypeScript when the
//! tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, the types are configured for TypeScript export.
    fn assert_type<T: Type>() {}

    // Stream snapshots
    assert_type::<corelink::SkeletonCollection>();
    assert_type::<corelink::TrackerCollection>();
    assert_type::<corelink::HandGestures>();
    assert_type::<corelink::ErgonomicsSnapshot>();
    assert_type::<corelink::LandscapeSnapshot>();
    assert_type::<corelink::SystemMessage>();

    // Connection status
    assert_type::<corelink::StreamKind>();
    assert_type::<corelink::ConnectionMode>();
    assert_type::<corelink::LifecycleStatus>();
    assert_type::<corelink::HostDescriptor>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type.
    let _ = corelink::StreamKind::Skeleton;
}
