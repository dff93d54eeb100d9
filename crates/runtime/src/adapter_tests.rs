// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::plugin::PluginInstance;
use crate::sim::{SimApp, SimDriver};
use axon_bus::EndpointReceiver;
use axon_core::{DataType, FakeClock, GroupTagValues, Tag, TagAttr, TagValue, Value};
use axon_storage::MemStore;

struct Harness {
    deps: AdapterDeps,
    mgr_rx: EndpointReceiver,
    clock: FakeClock,
}

fn harness() -> Harness {
    let (mgr_tx, mgr_rx) = endpoint();
    Harness {
        deps: AdapterDeps {
            reactor: Arc::new(Reactor::new()),
            ports: PortTable::new(),
            store: Arc::new(MemStore::new()),
            registry: axon_metrics::Registry::new(),
            manager_tx: mgr_tx,
        },
        mgr_rx,
        clock: FakeClock::new(),
    }
}

impl Harness {
    fn spawn_driver(&self, name: &str) -> Adapter<FakeClock> {
        let (adapter, _control) = Adapter::spawn(
            name,
            "sim-driver",
            PluginInstance::Driver(Box::new(SimDriver::new())),
            self.deps.clone(),
            self.clock.clone(),
            0,
        )
        .unwrap();
        // Consume the NODE_INIT announcement
        let init = self.mgr_rx.recv_timeout().unwrap();
        assert!(matches!(init.message, Message::NodeInit { .. }));
        adapter
    }

    fn spawn_app(&self, name: &str) -> (Adapter<FakeClock>, Arc<crate::sim::SimAppState>) {
        let plugin = SimApp::new();
        let state = plugin.state();
        let (adapter, _control) = Adapter::spawn(
            name,
            "sim-app",
            PluginInstance::App(Box::new(plugin)),
            self.deps.clone(),
            self.clock.clone(),
            7000,
        )
        .unwrap();
        let init = self.mgr_rx.recv_timeout().unwrap();
        assert!(matches!(init.message, Message::NodeInit { .. }));
        (adapter, state)
    }

    /// Dispatch a request and return the adapter's reply.
    fn request(&self, adapter: &Adapter<FakeClock>, message: Message) -> Message {
        adapter.dispatch(Envelope::new("test", adapter.name(), message).with_context(99));
        let reply = self.mgr_rx.recv_timeout().expect("no reply");
        assert_eq!(reply.context, 99, "correlation context must pass through");
        reply.message
    }

    fn expect_error(&self, adapter: &Adapter<FakeClock>, message: Message, code: ErrorCode) {
        match self.request(adapter, message) {
            Message::Error { code: got } => assert_eq!(got, code),
            other => panic!("expected error reply, got {}", other.name()),
        }
    }
}

fn ready(h: &Harness, adapter: &Adapter<FakeClock>) {
    h.expect_error(
        adapter,
        Message::NodeSetting {
            node: adapter.name(),
            setting: "{\"host\":\"device\"}".into(),
        },
        ErrorCode::Success,
    );
}

fn start(h: &Harness, adapter: &Adapter<FakeClock>) {
    h.expect_error(
        adapter,
        Message::NodeCtl {
            node: adapter.name(),
            cmd: axon_core::NodeCtlCmd::Start,
        },
        ErrorCode::Success,
    );
}

fn add_group(h: &Harness, adapter: &Adapter<FakeClock>, group: &str, interval_ms: u32) {
    h.expect_error(
        adapter,
        Message::AddGroup {
            driver: adapter.name(),
            group: group.into(),
            interval_ms,
            context: None,
        },
        ErrorCode::Success,
    );
}

fn writable_tag(name: &str) -> Tag {
    Tag::new(name, "400001", DataType::Int16).with_attribute(TagAttr::READ | TagAttr::WRITE)
}

#[test]
fn lifecycle_follows_the_state_machine() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    assert_eq!(adapter.running_state(), RunningState::Init);

    // Start before setting: NOT_READY
    h.expect_error(
        &adapter,
        Message::NodeCtl {
            node: "d1".into(),
            cmd: axon_core::NodeCtlCmd::Start,
        },
        ErrorCode::NodeNotReady,
    );

    // Rejected setting leaves INIT
    h.expect_error(
        &adapter,
        Message::NodeSetting {
            node: "d1".into(),
            setting: "reject this".into(),
        },
        ErrorCode::NodeSettingInvalid,
    );
    assert_eq!(adapter.running_state(), RunningState::Init);

    ready(&h, &adapter);
    assert_eq!(adapter.running_state(), RunningState::Ready);

    // Stop before start: NOT_RUNNING
    h.expect_error(
        &adapter,
        Message::NodeCtl {
            node: "d1".into(),
            cmd: axon_core::NodeCtlCmd::Stop,
        },
        ErrorCode::NodeNotRunning,
    );

    start(&h, &adapter);
    assert_eq!(adapter.running_state(), RunningState::Running);

    // Start while running
    h.expect_error(
        &adapter,
        Message::NodeCtl {
            node: "d1".into(),
            cmd: axon_core::NodeCtlCmd::Start,
        },
        ErrorCode::NodeIsRunning,
    );

    h.expect_error(
        &adapter,
        Message::NodeCtl {
            node: "d1".into(),
            cmd: axon_core::NodeCtlCmd::Stop,
        },
        ErrorCode::Success,
    );
    assert_eq!(adapter.running_state(), RunningState::Stopped);

    // Stop while stopped
    h.expect_error(
        &adapter,
        Message::NodeCtl {
            node: "d1".into(),
            cmd: axon_core::NodeCtlCmd::Stop,
        },
        ErrorCode::NodeIsStopped,
    );

    // Stopped -> Running again
    start(&h, &adapter);
    assert_eq!(adapter.running_state(), RunningState::Running);
}

#[test]
fn setting_round_trip() {
    let h = harness();
    let adapter = h.spawn_driver("d1");

    match h.request(
        &adapter,
        Message::GetNodeSetting { node: "d1".into() },
    ) {
        Message::Error { code } => assert_eq!(code, ErrorCode::NodeSettingNotFound),
        other => panic!("unexpected {}", other.name()),
    }

    ready(&h, &adapter);
    match h.request(&adapter, Message::GetNodeSetting { node: "d1".into() }) {
        Message::GetNodeSettingResp { setting, .. } => {
            assert_eq!(setting, "{\"host\":\"device\"}")
        }
        other => panic!("unexpected {}", other.name()),
    }
}

#[test]
fn app_rejects_driver_requests() {
    let h = harness();
    let (app, _) = h.spawn_app("app1");
    h.expect_error(
        &app,
        Message::AddGroup {
            driver: "app1".into(),
            group: "g1".into(),
            interval_ms: 1000,
            context: None,
        },
        ErrorCode::GroupNotAllow,
    );
    h.expect_error(
        &app,
        Message::ReadGroup {
            driver: "app1".into(),
            group: "g1".into(),
            name_filter: None,
            desc_filter: None,
            sync: false,
            tags: Vec::new(),
        },
        ErrorCode::GroupNotAllow,
    );
}

#[test]
fn group_interval_boundaries() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    h.expect_error(
        &adapter,
        Message::AddGroup {
            driver: "d1".into(),
            group: "g1".into(),
            interval_ms: 99,
            context: None,
        },
        ErrorCode::GroupParameterInvalid,
    );
    add_group(&h, &adapter, "g1", 100);
}

#[test]
fn tag_crud_with_persistence() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    add_group(&h, &adapter, "g1", 1000);

    match h.request(
        &adapter,
        Message::AddTag {
            driver: "d1".into(),
            group: "g1".into(),
            tags: vec![writable_tag("t1"), writable_tag("t2")],
        },
    ) {
        Message::AddTagResp { added, error } => {
            assert_eq!(error, ErrorCode::Success);
            assert_eq!(added, 2);
        }
        other => panic!("unexpected {}", other.name()),
    }
    assert_eq!(h.deps.store.load_tags("d1", "g1").unwrap().len(), 2);

    // Plugin validation failure rejects the whole batch
    match h.request(
        &adapter,
        Message::AddTag {
            driver: "d1".into(),
            group: "g1".into(),
            tags: vec![writable_tag("t3"), Tag::new("t4", "bad-addr", DataType::Int16)],
        },
    ) {
        Message::AddTagResp { added, error } => {
            assert_eq!(error, ErrorCode::TagAddressFormatInvalid);
            assert_eq!(added, 0);
        }
        other => panic!("unexpected {}", other.name()),
    }
    assert_eq!(h.deps.store.load_tags("d1", "g1").unwrap().len(), 2);

    h.expect_error(
        &adapter,
        Message::DelTag {
            driver: "d1".into(),
            group: "g1".into(),
            tags: vec!["t1".into()],
        },
        ErrorCode::Success,
    );
    assert_eq!(h.deps.store.load_tags("d1", "g1").unwrap().len(), 1);
}

#[test]
fn gtag_add_is_atomic_across_groups() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    add_group(&h, &adapter, "g2", 1000);

    let mk = |group: &str, bad: Option<usize>| axon_core::GtagGroup {
        group: group.into(),
        interval_ms: 200,
        tags: (0..4)
            .map(|i| {
                if bad == Some(i) {
                    Tag::new(format!("t{i}"), "bad-addr", DataType::Int16)
                } else {
                    writable_tag(&format!("t{i}"))
                }
            })
            .collect(),
    };

    // Failure in group 2 tag 3 reverts everything, including the group
    // created for entry 1
    match h.request(
        &adapter,
        Message::AddGtag {
            driver: "d1".into(),
            groups: vec![mk("g1", None), mk("g2", Some(2)), mk("g3", None)],
        },
    ) {
        Message::AddGtagResp { added, error } => {
            assert_eq!(error, ErrorCode::TagAddressFormatInvalid);
            assert_eq!(added, 0);
        }
        other => panic!("unexpected {}", other.name()),
    }
    match h.request(&adapter, Message::GetGroup { driver: "d1".into() }) {
        Message::GetGroupResp { groups, .. } => {
            assert_eq!(groups.len(), 1, "created groups must be reverted");
            assert_eq!(groups[0].name, "g2");
            assert_eq!(groups[0].tag_count, 0, "partial tags must be reverted");
        }
        other => panic!("unexpected {}", other.name()),
    }
    assert!(h.deps.store.load_groups("d1").unwrap().iter().all(|g| g.name == "g2"));

    // The clean variant succeeds atomically
    match h.request(
        &adapter,
        Message::AddGtag {
            driver: "d1".into(),
            groups: vec![mk("g1", None), mk("g3", None)],
        },
    ) {
        Message::AddGtagResp { added, error } => {
            assert_eq!(error, ErrorCode::Success);
            assert_eq!(added, 8);
        }
        other => panic!("unexpected {}", other.name()),
    }
}

#[test]
fn write_path_validates_and_responds() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    ready(&h, &adapter);
    add_group(&h, &adapter, "g1", 1000);
    h.request(
        &adapter,
        Message::AddTag {
            driver: "d1".into(),
            group: "g1".into(),
            tags: vec![
                writable_tag("rw"),
                Tag::new("ro", "400002", DataType::Int16),
            ],
        },
    );

    // Writes need a running node
    h.expect_error(
        &adapter,
        Message::WriteTag {
            driver: "d1".into(),
            group: "g1".into(),
            tag: "rw".into(),
            value: Value::I16(7),
        },
        ErrorCode::NodeNotRunning,
    );

    start(&h, &adapter);
    h.expect_error(
        &adapter,
        Message::WriteTag {
            driver: "d1".into(),
            group: "g1".into(),
            tag: "rw".into(),
            value: Value::I16(7),
        },
        ErrorCode::Success,
    );
    h.expect_error(
        &adapter,
        Message::WriteTag {
            driver: "d1".into(),
            group: "g1".into(),
            tag: "ro".into(),
            value: Value::I16(7),
        },
        ErrorCode::TagNotAllowWrite,
    );
    h.expect_error(
        &adapter,
        Message::WriteTag {
            driver: "d1".into(),
            group: "g1".into(),
            tag: "ghost".into(),
            value: Value::I16(7),
        },
        ErrorCode::TagNotExist,
    );
}

#[test]
fn gtags_write_reports_first_failure_once() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    ready(&h, &adapter);
    start(&h, &adapter);
    add_group(&h, &adapter, "g1", 1000);
    add_group(&h, &adapter, "g2", 1000);
    for group in ["g1", "g2"] {
        h.request(
            &adapter,
            Message::AddTag {
                driver: "d1".into(),
                group: group.into(),
                tags: vec![writable_tag("t")],
            },
        );
    }

    h.expect_error(
        &adapter,
        Message::WriteGtags {
            driver: "d1".into(),
            groups: vec![
                GroupTagValues {
                    group: "g1".into(),
                    tags: vec![TagValue {
                        tag: "t".into(),
                        value: Value::I16(1),
                    }],
                },
                GroupTagValues {
                    group: "g2".into(),
                    tags: vec![TagValue {
                        tag: "t".into(),
                        value: Value::I16(2),
                    }],
                },
            ],
        },
        ErrorCode::Success,
    );

    // A missing tag anywhere fails the whole request before dispatch
    h.expect_error(
        &adapter,
        Message::WriteGtags {
            driver: "d1".into(),
            groups: vec![GroupTagValues {
                group: "g1".into(),
                tags: vec![TagValue {
                    tag: "ghost".into(),
                    value: Value::I16(1),
                }],
            }],
        },
        ErrorCode::TagNotExist,
    );
}

#[test]
fn test_read_round_trips_value() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    ready(&h, &adapter);
    start(&h, &adapter);

    match h.request(
        &adapter,
        Message::TestReadTag {
            driver: "d1".into(),
            group: "g1".into(),
            tag: Tag::new("probe", "400001", DataType::Int16),
        },
    ) {
        Message::TestReadTagResp {
            data_type,
            json_kind,
            value,
            error,
        } => {
            assert_eq!(error, ErrorCode::Success);
            assert_eq!(data_type, DataType::Int16);
            assert_eq!(json_kind, axon_core::JsonKind::Int);
            assert_eq!(value, Value::I16(1));
        }
        other => panic!("unexpected {}", other.name()),
    }
}

#[test]
fn scan_tags_pages_until_last() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    ready(&h, &adapter);
    start(&h, &adapter);

    let mut ctx = String::new();
    let mut discovered = Vec::new();
    loop {
        match h.request(
            &adapter,
            Message::ScanTags {
                driver: "d1".into(),
                ctx: ctx.clone(),
            },
        ) {
            Message::ScanTagsResp {
                tags,
                error,
                is_last,
                ctx: next,
                ..
            } => {
                assert_eq!(error, ErrorCode::Success);
                discovered.extend(tags.into_iter().map(|t| t.name));
                if is_last {
                    break;
                }
                ctx = next;
            }
            other => panic!("unexpected {}", other.name()),
        }
    }
    assert_eq!(
        discovered,
        vec!["discovered0", "discovered1", "discovered2", "discovered3"]
    );
}

#[test]
fn rename_updates_name_and_metrics() {
    let h = harness();
    let adapter = h.spawn_driver("d1");

    match h.request(
        &adapter,
        Message::NodeRename {
            new_name: "d2".into(),
        },
    ) {
        Message::NodeRenameResp {
            node,
            new_name,
            error,
        } => {
            assert_eq!(error, ErrorCode::Success);
            assert_eq!(node, "d1");
            assert_eq!(new_name, "d2");
        }
        other => panic!("unexpected {}", other.name()),
    }
    assert_eq!(adapter.name(), "d2");
    assert_eq!(adapter.metrics().unwrap().node_name(), "d2");

    // Over-long rename is refused
    match h.request(
        &adapter,
        Message::NodeRename {
            new_name: "x".repeat(129),
        },
    ) {
        Message::NodeRenameResp { error, .. } => {
            assert_eq!(error, ErrorCode::NodeNameTooLong)
        }
        other => panic!("unexpected {}", other.name()),
    }
    assert_eq!(adapter.name(), "d2");
}

#[test]
fn uninit_stops_and_acknowledges() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    ready(&h, &adapter);
    start(&h, &adapter);

    adapter.dispatch(Envelope::new(
        MANAGER_NAME,
        "d1",
        Message::NodeUninit { node: "d1".into() },
    ));
    let resp = h.mgr_rx.recv_timeout().unwrap();
    assert!(matches!(resp.message, Message::NodeUninitResp { ref node } if node == "d1"));

    adapter.destroy();
}

#[test]
fn stop_resets_metrics_except_no_reset() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    ready(&h, &adapter);
    add_group(&h, &adapter, "g1", 1000);
    start(&h, &adapter);

    let metrics = adapter.metrics().unwrap();
    let recv_before = metrics
        .value(axon_metrics::names::RECV_MSGS_TOTAL, 0)
        .unwrap();
    assert!(recv_before > 0);

    h.expect_error(
        &adapter,
        Message::NodeCtl {
            node: "d1".into(),
            cmd: axon_core::NodeCtlCmd::Stop,
        },
        ErrorCode::Success,
    );
    // Counters reset on stop (recv counts the stop request itself afterward)
    let recv_after = metrics
        .value(axon_metrics::names::RECV_MSGS_TOTAL, 0)
        .unwrap();
    assert!(recv_after < recv_before);
}

#[test]
fn persisted_config_reloads_on_spawn() {
    let h = harness();
    {
        let adapter = h.spawn_driver("d1");
        ready(&h, &adapter);
        add_group(&h, &adapter, "g1", 500);
        h.request(
            &adapter,
            Message::AddTag {
                driver: "d1".into(),
                group: "g1".into(),
                tags: vec![writable_tag("t1")],
            },
        );
        adapter.destroy();
    }

    // A fresh adapter against the same store comes back READY with its
    // groups and tags
    let adapter = h.spawn_driver("d1");
    assert_eq!(adapter.running_state(), RunningState::Ready);
    match h.request(&adapter, Message::GetGroup { driver: "d1".into() }) {
        Message::GetGroupResp { groups, .. } => {
            assert_eq!(groups.len(), 1);
            assert_eq!(groups[0].interval_ms, 500);
            assert_eq!(groups[0].tag_count, 1);
        }
        other => panic!("unexpected {}", other.name()),
    }
}

#[test]
fn telemetry_endpoint_closed_match() {
    let h = harness();
    let (app, state) = h.spawn_app("app1");
    let port = app.telemetry_port().unwrap();
    let tele = h.deps.ports.lookup(port).unwrap();

    // TransData flows through mailbox and consumer to the plugin
    let payload = axon_core::envelope::TransPayload::new(
        "d1",
        "g1",
        vec![axon_core::TagValueMeta::new("t1", Value::I16(1))],
    );
    tele.send(Envelope::new(
        "d1",
        "app1",
        Message::TransData {
            payload: Arc::clone(&payload),
        },
    ))
    .unwrap();

    // Errors dispatch inline
    tele.send(Envelope::new(
        "d1",
        "app1",
        Message::Error {
            code: ErrorCode::TagValueExpired,
        },
    ))
    .unwrap();

    // Anything else is dropped
    tele.send(Envelope::new("d1", "app1", Message::GetNodesState))
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(200));
    let requests = state.requests.lock();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .any(|e| matches!(e.message, Message::TransData { .. })));
    assert!(requests
        .iter()
        .any(|e| matches!(e.message, Message::Error { .. })));
    drop(requests);

    app.destroy();
    // The recorded envelope clone holds the only other reference; dropping
    // the observation log releases the payload
    state.requests.lock().clear();
    assert_eq!(Arc::strong_count(&payload), 1);
}

#[test]
fn node_state_snapshot() {
    let h = harness();
    let adapter = h.spawn_driver("d1");
    ready(&h, &adapter);
    start(&h, &adapter);

    match h.request(&adapter, Message::GetNodeState { node: "d1".into() }) {
        Message::GetNodeStateResp {
            running,
            link,
            log_level,
        } => {
            assert_eq!(running, RunningState::Running);
            assert_eq!(link, axon_core::LinkState::Connected);
            assert_eq!(log_level, LogLevel::Info);
        }
        other => panic!("unexpected {}", other.name()),
    }
}
