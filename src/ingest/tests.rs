use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

use super::*;
use crate::test_utils::{
    FakeDeviceHost, RecordingErrorSink, StagedGestures, sample_host, sample_skeleton,
    sample_tracker,
};
use crate::types::{ErgonomicsEntry, GestureDefinition, GloveDevice, TrackerKind};

struct Harness {
    host: Arc<FakeDeviceHost>,
    ingestor: Arc<StreamIngestor<FakeDeviceHost>>,
    events: mpsc::UnboundedReceiver<HostEvent>,
    errors: Arc<RecordingErrorSink>,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt::try_init();
    let host = FakeDeviceHost::shared();
    let (tx, events) = mpsc::unbounded_channel();
    let errors = Arc::new(RecordingErrorSink::default());
    let ingestor = Arc::new(
        StreamIngestor::new(Arc::clone(&host), tx).with_error_sink(errors.clone()),
    );
    ingestor.register().expect("callbacks register");
    Harness { host, ingestor, events, errors }
}

fn gloves(left: u32, right: u32) -> Landscape {
    Landscape {
        gloves: vec![
            GloveDevice { id: left, side: Side::Left, is_haptic: false, battery_percentage: 90 },
            GloveDevice { id: right, side: Side::Right, is_haptic: false, battery_percentage: 90 },
        ],
        ..Landscape::default()
    }
}

fn ergonomics_entry(id: u32, is_user_id: bool, value: f32) -> ErgonomicsEntry {
    ErgonomicsEntry { id, is_user_id, values: vec![value; ERGONOMICS_VALUE_COUNT] }
}

#[test]
fn registers_all_nine_callbacks() {
    let h = harness();
    assert_eq!(h.host.registered_callbacks(), 9);
}

#[test]
fn registration_failure_names_the_callback() {
    let host = FakeDeviceHost::shared();
    host.fail_registration(Some("tracker stream"));
    let (tx, _rx) = mpsc::unbounded_channel();
    let ingestor = Arc::new(StreamIngestor::new(Arc::clone(&host), tx));

    let err = ingestor.register().unwrap_err();
    assert!(matches!(err, ClientError::Initialization { .. }));
    assert!(err.to_string().contains("tracker stream"));
    assert!(err.is_fatal());
}

#[test]
fn skeleton_event_builds_complete_collection() {
    let h = harness();
    h.host.emit_skeletons(vec![sample_skeleton(10, 21), sample_skeleton(11, 6)]);

    let collection = h.ingestor.buffers().skeletons.take().expect("published");
    let summary: Vec<_> = collection.skeletons.iter().map(|s| (s.id(), s.nodes.len())).collect();
    assert_eq!(summary, vec![(10, 21), (11, 6)]);
    assert!(h.errors.reports().is_empty());
}

#[test]
fn failed_node_pull_drops_event_and_keeps_pending_value() {
    let h = harness();
    h.host.emit_skeletons(vec![sample_skeleton(1, 3)]);

    h.host.fail_pull(Some((StreamKind::Skeleton, 1)));
    h.host.emit_skeletons(vec![sample_skeleton(2, 3), sample_skeleton(3, 3)]);

    let pending = h.ingestor.buffers().skeletons.take().expect("earlier value kept");
    assert_eq!(pending.skeletons[0].id(), 1);

    let reports = h.errors.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, StreamKind::Skeleton);
    assert!(reports[0].1.contains("skeleton 3"));
}

#[test]
fn raw_skeletons_use_their_own_buffer() {
    let h = harness();
    h.host.emit_raw_skeletons(vec![sample_skeleton(5, 2)]);

    assert!(h.ingestor.buffers().skeletons.take().is_none());
    let raw = h.ingestor.buffers().raw_skeletons.take().expect("raw published");
    assert_eq!(raw.find(5).map(|s| s.nodes.len()), Some(2));
}

#[test]
fn tracker_event_keeps_host_order() {
    let h = harness();
    h.host.emit_trackers(vec![
        sample_tracker("hmd", TrackerKind::Head),
        sample_tracker("waist", TrackerKind::Waist),
    ]);

    let trackers = h.ingestor.buffers().trackers.take().expect("published");
    let ids: Vec<_> = trackers.trackers.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["hmd", "waist"]);
    assert_eq!(trackers.by_kind(TrackerKind::Head).count(), 1);
}

#[test]
fn gestures_are_reassembled_across_chunks_for_each_hand() {
    let h = harness();
    h.ingestor.set_glove_ids(GloveIds { left: 20, right: 21 });
    h.host.set_gesture_chunk_size(4);

    let left: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
    let right: Vec<f32> = (0..7).map(|i| 1.0 - i as f32 / 10.0).collect();
    h.host.emit_gestures(vec![
        StagedGestures { id: 3, is_user_id: true, probabilities: vec![0.5; 10] },
        StagedGestures { id: 21, is_user_id: false, probabilities: right.clone() },
        StagedGestures { id: 20, is_user_id: false, probabilities: left.clone() },
        StagedGestures { id: 99, is_user_id: false, probabilities: vec![0.1; 3] },
    ]);

    let left_hand = h.ingestor.buffers().left_gestures.take().expect("left published");
    let right_hand = h.ingestor.buffers().right_gestures.take().expect("right published");
    assert_eq!(left_hand.probabilities, left);
    assert_eq!(left_hand.glove_id, 20);
    assert_eq!(right_hand.probabilities, right);

    // Entity 2 (left, 10 values) is pulled at offsets 0, 4 and 8.
    assert_eq!(h.host.count_calls("gesture_chunk:2@"), 3);
    assert_eq!(h.host.count_calls("gesture_chunk:0@"), 1);
}

#[test]
fn gestures_without_known_gloves_publish_nothing() {
    let h = harness();
    h.host.emit_gestures(vec![StagedGestures {
        id: 20,
        is_user_id: false,
        probabilities: vec![1.0],
    }]);

    assert!(h.ingestor.buffers().left_gestures.take().is_none());
    assert!(h.ingestor.buffers().right_gestures.take().is_none());
}

#[test]
fn stalled_gesture_chunks_are_reported() {
    let h = harness();
    h.ingestor.set_glove_ids(GloveIds { left: 20, right: 0 });
    h.host.set_gesture_chunk_size(0);
    h.host.emit_gestures(vec![StagedGestures {
        id: 20,
        is_user_id: false,
        probabilities: vec![0.2; 5],
    }]);

    assert!(h.ingestor.buffers().left_gestures.take().is_none());
    let reports = h.errors.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].1.contains("0 of 5"));
}

#[test]
fn oversized_stream_counts_are_reported_as_pull_failures() {
    let h = harness();
    let header = SkeletonStreamInfo { skeletons_count: u32::MAX, publish_time: 1 };
    h.ingestor.on_skeleton_stream(&header);

    h.ingestor.set_glove_ids(GloveIds { left: 20, right: 0 });
    h.host.claim_gesture_total(Some(u32::MAX));
    h.host.emit_gestures(vec![StagedGestures {
        id: 20,
        is_user_id: false,
        probabilities: vec![0.2; 3],
    }]);

    assert!(h.ingestor.buffers().skeletons.take().is_none());
    assert!(h.ingestor.buffers().left_gestures.take().is_none());
    let reports = h.errors.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].0, StreamKind::Skeleton);
    assert!(reports[0].1.contains("header of skeleton 0"));
    assert_eq!(reports[1].0, StreamKind::Gesture);
    assert!(reports[1].1.contains(&format!("3 of {}", u32::MAX)));
}

#[test]
fn ergonomics_pairs_first_gloves_and_skips_user_entries() {
    let h = harness();
    h.ingestor.set_glove_ids(GloveIds { left: 20, right: 21 });

    h.host.emit_ergonomics(ErgonomicsStream {
        entries: vec![
            ergonomics_entry(20, true, 9.0),
            ergonomics_entry(21, false, 0.25),
            ergonomics_entry(20, false, 0.5),
        ],
        publish_time: 4,
    });

    let snapshot = h.ingestor.buffers().ergonomics.take().expect("published");
    assert_eq!(snapshot.left.as_ref().map(|hand| hand.values[0]), Some(0.5));
    assert_eq!(snapshot.right.as_ref().map(|hand| hand.values[0]), Some(0.25));
}

#[test]
fn short_ergonomics_entry_drops_event() {
    let h = harness();
    h.ingestor.set_glove_ids(GloveIds { left: 20, right: 0 });
    h.host.emit_ergonomics(ErgonomicsStream {
        entries: vec![ErgonomicsEntry { id: 20, is_user_id: false, values: vec![0.0; 12] }],
        publish_time: 1,
    });

    assert!(h.ingestor.buffers().ergonomics.take().is_none());
    assert_eq!(h.errors.reports()[0].0, StreamKind::Ergonomics);
}

#[test]
fn landscape_fetches_definitions_sized_to_gesture_count() {
    let h = harness();
    let definitions = vec![
        GestureDefinition { id: 1, name: "Fist".into() },
        GestureDefinition { id: 2, name: "Point".into() },
    ];
    h.host.emit_landscape(Landscape { gesture_count: 2, ..gloves(20, 21) }, definitions.clone());

    let snapshot = h.ingestor.buffers().landscape.take().expect("published");
    assert_eq!(snapshot.gestures, definitions);
    let ids = GloveIds::from_landscape(Some(&snapshot.landscape));
    assert_eq!(ids, GloveIds { left: 20, right: 21 });
}

#[test]
fn landscape_with_short_definition_table_is_dropped() {
    let h = harness();
    h.host.emit_landscape(
        Landscape { gesture_count: 3, ..gloves(20, 21) },
        vec![GestureDefinition { id: 1, name: "Fist".into() }],
    );

    assert!(h.ingestor.buffers().landscape.take().is_none());
    assert!(h.errors.reports()[0].1.contains("expected 3"));
}

#[test]
fn temporary_skeleton_notice_is_routed_to_its_own_slot() {
    let h = harness();
    h.host.set_session_id(42);
    h.host.emit_connected(&sample_host("core"));

    h.host.emit_system_message(SystemMessage {
        kind: SystemMessageKind::TemporarySkeletonModified,
        text: String::new(),
        info: 3,
    });
    h.host.emit_system_message(SystemMessage {
        kind: SystemMessageKind::LibDebugReplugged,
        text: "replugged".into(),
        info: 0,
    });

    assert_eq!(
        h.ingestor.buffers().modified_temporary_skeleton.take(),
        Some(TemporarySkeletonHandle { index: 3, session_id: 42 })
    );
    let message = h.ingestor.buffers().system_messages.take().expect("published");
    assert_eq!(message.text, "replugged");
}

#[test]
fn connection_events_are_forwarded_in_order() {
    let mut h = harness();
    h.host.set_session_id(0);
    h.host.emit_connected(&sample_host("core"));
    h.host.emit_disconnected(&sample_host("core"));

    match h.events.try_recv().expect("connected event") {
        HostEvent::Connected { host, session_id, versions } => {
            assert_eq!(host.name, "core");
            assert_eq!(session_id, None);
            assert!(versions.is_some_and(|v| v.compatible));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(matches!(h.events.try_recv(), Ok(HostEvent::Disconnected { .. })));
}

#[test]
fn callbacks_after_ingestor_drop_are_ignored() {
    let h = harness();
    let Harness { host, ingestor, .. } = h;
    drop(ingestor);

    // Would panic if the callback dereferenced a dead ingestor.
    host.emit_skeletons(vec![sample_skeleton(1, 1)]);
}

#[test]
fn concurrent_streams_do_not_interfere() {
    let h = harness();
    h.ingestor.set_glove_ids(GloveIds { left: 20, right: 21 });

    let skeleton_host = Arc::clone(&h.host);
    let skeletons = thread::spawn(move || {
        for id in 0..200 {
            skeleton_host.emit_skeletons(vec![sample_skeleton(id, 4)]);
        }
    });
    let ergonomics_host = Arc::clone(&h.host);
    let ergonomics = thread::spawn(move || {
        for step in 0..200 {
            ergonomics_host.emit_ergonomics(ErgonomicsStream {
                entries: vec![ergonomics_entry(20, false, step as f32)],
                publish_time: step,
            });
        }
    });
    skeletons.join().expect("skeleton thread");
    ergonomics.join().expect("ergonomics thread");

    let collection = h.ingestor.buffers().skeletons.take().expect("skeletons");
    assert_eq!(collection.skeletons[0].id(), 199);
    let snapshot = h.ingestor.buffers().ergonomics.take().expect("ergonomics");
    assert_eq!(snapshot.publish_time, 199);
    assert!(h.errors.reports().is_empty());
}
