// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: a manager over simulator plugins with an observable app
//! state and an attached api client.

use axon_bus::{EndpointReceiver, PortTable, Reactor};
use axon_core::{
    DataType, Envelope, ErrorCode, Message, NodeCtlCmd, PluginDescriptor, PluginKind, SystemClock,
    Tag, TagAttr,
};
use axon_manager::{Manager, PluginRegistry};
use axon_metrics::Registry;
use axon_runtime::sim::{SimApp, SimAppState, SimDriver};
use axon_runtime::{PluginInstance, MANAGER_NAME};
use axon_storage::{MemStore, Store};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Fleet {
    pub manager: Manager<SystemClock>,
    pub api: EndpointReceiver,
    pub app_state: Arc<SimAppState>,
    pub store: Arc<dyn Store>,
    pub metrics: Arc<Registry>,
    _reactor: Arc<Reactor>,
}

pub fn fleet() -> Fleet {
    fleet_with_store(Arc::new(MemStore::new()))
}

pub fn fleet_with_store(store: Arc<dyn Store>) -> Fleet {
    let app_state = Arc::new(SimAppState::default());
    let plugins = Arc::new(PluginRegistry::new());
    plugins
        .register(
            PluginDescriptor {
                name: "sim-driver".into(),
                library: "libplugin-sim-driver".into(),
                schema: "sim-driver".into(),
                kind: PluginKind::System,
                node_kind: axon_core::NodeKind::Driver,
                version: "2.0.0".into(),
                single_instance: false,
                display: true,
                single_instance_name: None,
                description: String::new(),
            },
            || PluginInstance::Driver(Box::new(SimDriver::new())),
        )
        .unwrap();
    {
        let app_state = Arc::clone(&app_state);
        plugins
            .register(
                PluginDescriptor {
                    name: "sim-app".into(),
                    library: "libplugin-sim-app".into(),
                    schema: "sim-app".into(),
                    kind: PluginKind::System,
                    node_kind: axon_core::NodeKind::App,
                    version: "2.0.0".into(),
                    single_instance: false,
                    display: true,
                    single_instance_name: None,
                    description: String::new(),
                },
                move || PluginInstance::App(Box::new(SimApp::with_state(Arc::clone(&app_state)))),
            )
            .unwrap();
    }

    let reactor = Arc::new(Reactor::new());
    let metrics = Registry::new();
    let manager = Manager::new(
        Arc::clone(&reactor),
        PortTable::new(),
        Arc::clone(&store),
        Arc::clone(&metrics),
        plugins,
        SystemClock,
    )
    .unwrap();
    let api = manager.attach_client("api");
    Fleet {
        manager,
        api,
        app_state,
        store,
        metrics,
        _reactor: reactor,
    }
}

impl Fleet {
    pub fn request(&self, message: Message) -> Message {
        self.manager
            .sender()
            .send(Envelope::new("api", MANAGER_NAME, message))
            .unwrap();
        self.api.recv_timeout().expect("no reply").message
    }

    pub fn expect_success(&self, message: Message) {
        match self.request(message) {
            Message::Error { code } => assert_eq!(code, ErrorCode::Success),
            other => panic!("expected error reply, got {}", other.name()),
        }
    }

    pub fn add_driver(&self, name: &str) {
        self.expect_success(Message::AddNode {
            node: name.into(),
            plugin: "sim-driver".into(),
        });
        self.expect_success(Message::NodeSetting {
            node: name.into(),
            setting: "{\"host\":\"sim\"}".into(),
        });
    }

    pub fn add_app(&self, name: &str) {
        self.expect_success(Message::AddNode {
            node: name.into(),
            plugin: "sim-app".into(),
        });
    }

    pub fn start(&self, node: &str) {
        self.expect_success(Message::NodeCtl {
            node: node.into(),
            cmd: NodeCtlCmd::Start,
        });
    }

    pub fn add_group(&self, driver: &str, group: &str, interval_ms: u32) {
        self.expect_success(Message::AddGroup {
            driver: driver.into(),
            group: group.into(),
            interval_ms,
            context: None,
        });
    }

    pub fn add_tags(&self, driver: &str, group: &str, names: &[&str]) {
        let tags: Vec<Tag> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Tag::new(*name, format!("40000{i}"), DataType::Int16)
                    .with_attribute(TagAttr::READ | TagAttr::WRITE)
            })
            .collect();
        match self.request(Message::AddTag {
            driver: driver.into(),
            group: group.into(),
            tags,
        }) {
            Message::AddTagResp { error, .. } => assert_eq!(error, ErrorCode::Success),
            other => panic!("unexpected {}", other.name()),
        }
    }

    pub fn subscribe(&self, app: &str, driver: &str, group: &str) {
        self.expect_success(Message::SubscribeGroup {
            app: app.into(),
            driver: driver.into(),
            group: group.into(),
            port: 0,
            params: None,
            static_tags: None,
        });
    }

    /// Telemetry envelopes delivered to one app.
    pub fn trans_data_for(&self, app: &str) -> usize {
        self.app_state
            .requests
            .lock()
            .iter()
            .filter(|env| {
                env.receiver == app && matches!(env.message, Message::TransData { .. })
            })
            .count()
    }

    /// Values one app saw for one tag, in arrival order.
    pub fn values_for(&self, app: &str, tag: &str) -> Vec<axon_core::Value> {
        self.app_state
            .requests
            .lock()
            .iter()
            .filter(|env| env.receiver == app)
            .filter_map(|env| match &env.message {
                Message::TransData { payload } => payload
                    .tags
                    .iter()
                    .find(|s| s.tag == tag)
                    .map(|s| s.value.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Poll until `cond` holds or the deadline passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}
