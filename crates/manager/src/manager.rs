// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The manager: node directory, envelope router, port assigner.
//!
//! Every control envelope flows through here. Envelopes addressed to a node
//! are forwarded to its control endpoint; envelopes addressed to the manager
//! run the directory operations. Deletion and rename complete in two steps:
//! the manager forwards the request to the adapter and finishes its own
//! bookkeeping when the adapter's acknowledgement comes back.

use crate::registry::PluginRegistry;
use axon_bus::{
    endpoint, EndpointReceiver, EndpointSender, IoHandle, PortTable, Reactor, TimerHandle,
    TimerMode,
};
use axon_core::{
    limits, log_category, Clock, Envelope, ErrorCode, LogLevel, Message, NodeInfo, NodeKind,
    NodeStateInfo, RunningState, SubDriverTags,
};
use axon_metrics::Registry;
use axon_runtime::{Adapter, AdapterDeps, MANAGER_NAME};
use axon_storage::{NodeRecord, Store};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// First telemetry port handed out.
const PORT_BASE: u16 = 7000;

/// Client name that receives the periodic fleet-state push.
const MONITOR_CLIENT: &str = "monitor";

type CoreLevelHook = Box<dyn Fn(LogLevel) + Send + Sync>;

struct NodeHandle<C: Clock> {
    adapter: Adapter<C>,
    control: EndpointSender,
}

#[derive(Default)]
struct PendingOps {
    /// node -> original UPDATE_NODE request
    renames: HashMap<String, Envelope>,
    /// node -> original DEL_NODE request
    deletes: HashMap<String, Envelope>,
}

struct Shared<C: Clock> {
    reactor: Arc<Reactor>,
    ports: Arc<PortTable>,
    store: Arc<dyn Store>,
    metrics: Arc<Registry>,
    plugins: Arc<PluginRegistry>,
    clock: C,
    nodes: RwLock<HashMap<String, NodeHandle<C>>>,
    /// Non-node peers (control surfaces, tests) that can receive replies.
    clients: RwLock<HashMap<String, EndpointSender>>,
    self_tx: EndpointSender,
    next_port: AtomicU16,
    pending: Mutex<PendingOps>,
    core_level_hook: Mutex<Option<CoreLevelHook>>,
    io_handle: Mutex<Option<IoHandle>>,
    state_timer: Mutex<Option<TimerHandle>>,
}

/// The central router and directory owner.
pub struct Manager<C: Clock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for Manager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Clock> Manager<C> {
    /// Bring up the manager endpoint, reload the persisted fleet, restore
    /// subscriptions, and auto-start nodes that were running.
    pub fn new(
        reactor: Arc<Reactor>,
        ports: Arc<PortTable>,
        store: Arc<dyn Store>,
        metrics: Arc<Registry>,
        plugins: Arc<PluginRegistry>,
        clock: C,
    ) -> Result<Self, ErrorCode> {
        let (self_tx, self_rx) = endpoint();
        let manager = Self {
            shared: Arc::new(Shared {
                reactor: Arc::clone(&reactor),
                ports,
                store,
                metrics,
                plugins,
                clock,
                nodes: RwLock::new(HashMap::new()),
                clients: RwLock::new(HashMap::new()),
                self_tx,
                next_port: AtomicU16::new(PORT_BASE),
                pending: Mutex::new(PendingOps::default()),
                core_level_hook: Mutex::new(None),
                io_handle: Mutex::new(None),
                state_timer: Mutex::new(None),
            }),
        };

        let handle = {
            let m = manager.clone();
            self_rx
                .register(&reactor, move |env| m.dispatch(env), |_| {})
                .map_err(|e| {
                    warn!(error = %e, "manager endpoint registration failed");
                    ErrorCode::Internal
                })?
        };
        manager.shared.io_handle.lock().replace(handle);

        let timer = {
            let m = manager.clone();
            reactor.add_timer(Duration::from_secs(1), TimerMode::NonBlock, move || {
                m.push_states()
            })
        };
        match timer {
            Ok(handle) => {
                manager.shared.state_timer.lock().replace(handle);
            }
            Err(e) => warn!(error = %e, "state push timer registration failed"),
        }

        manager.reload_fleet();
        Ok(manager)
    }

    /// Install the hook `UPDATE_LOG_LEVEL{core}` applies to the daemon-wide
    /// filter.
    pub fn set_core_level_hook(&self, hook: impl Fn(LogLevel) + Send + Sync + 'static) {
        self.shared.core_level_hook.lock().replace(Box::new(hook));
    }

    /// Sender peers use to reach the manager.
    pub fn sender(&self) -> EndpointSender {
        self.shared.self_tx.clone()
    }

    /// Register a non-node peer so replies can route back to it.
    pub fn attach_client(&self, name: &str) -> EndpointReceiver {
        let (tx, rx) = endpoint();
        self.shared.clients.write().insert(name.to_string(), tx);
        rx
    }

    pub fn node_names(&self) -> Vec<String> {
        self.shared.nodes.read().keys().cloned().collect()
    }

    fn adapter_of(&self, name: &str) -> Option<Adapter<C>> {
        self.shared.nodes.read().get(name).map(|h| h.adapter.clone())
    }

    fn reload_fleet(&self) {
        let records = self.shared.store.load_nodes().unwrap_or_else(|e| {
            warn!(error = %e, "node reload failed");
            Vec::new()
        });
        for record in &records {
            if let Err(code) = self.spawn_node(&record.name, &record.plugin) {
                warn!(node = %log_category(&record.name), code = %code, "node restore failed");
            }
        }

        // Singleton plugins materialize their fixed node unprompted
        for descriptor in self.shared.plugins.descriptors() {
            let Some(name) = &descriptor.single_instance_name else {
                continue;
            };
            if self.adapter_of(name).is_some() {
                continue;
            }
            if let Err(code) = self.spawn_node(name, &descriptor.name) {
                warn!(node = %log_category(name), code = %code, "singleton bring-up failed");
            }
        }

        // Subscriptions come back once both ends exist
        let subs = self
            .shared
            .store
            .load_all_subscriptions()
            .unwrap_or_default();
        for sub in subs {
            let Some(app) = self.adapter_of(&sub.app) else {
                continue;
            };
            let Some(port) = app.telemetry_port() else {
                continue;
            };
            self.forward(
                &sub.driver.clone(),
                Envelope::new(
                    MANAGER_NAME,
                    sub.driver.clone(),
                    Message::SubscribeGroup {
                        app: sub.app,
                        driver: sub.driver,
                        group: sub.group,
                        port,
                        params: sub.params,
                        static_tags: sub.static_tags,
                    },
                ),
            );
        }

        // Nodes that were running resume running
        for record in records {
            if record.running == RunningState::Running {
                self.forward(
                    &record.name.clone(),
                    Envelope::new(
                        MANAGER_NAME,
                        record.name.clone(),
                        Message::NodeCtl {
                            node: record.name,
                            cmd: axon_core::NodeCtlCmd::Start,
                        },
                    ),
                );
            }
        }
    }

    fn spawn_node(&self, name: &str, plugin: &str) -> Result<(), ErrorCode> {
        let (descriptor, instance) = self.shared.plugins.instantiate(plugin)?;
        if descriptor.single_instance {
            let nodes = self.shared.nodes.read();
            if nodes.values().any(|h| h.adapter.plugin_name() == plugin) {
                return Err(ErrorCode::PluginSingleInstanceOnly);
            }
        }
        let port_hint = self.shared.next_port.fetch_add(1, Ordering::Relaxed);
        let deps = AdapterDeps {
            reactor: Arc::clone(&self.shared.reactor),
            ports: Arc::clone(&self.shared.ports),
            store: Arc::clone(&self.shared.store),
            registry: Arc::clone(&self.shared.metrics),
            manager_tx: self.shared.self_tx.clone(),
        };
        let (adapter, control) = Adapter::spawn(
            name,
            plugin,
            instance,
            deps,
            self.shared.clock.clone(),
            port_hint,
        )?;
        self.shared
            .nodes
            .write()
            .insert(name.to_string(), NodeHandle { adapter, control });
        Ok(())
    }

    // -- routing -------------------------------------------------------------

    fn peer_sender(&self, name: &str) -> Option<EndpointSender> {
        if let Some(handle) = self.shared.nodes.read().get(name) {
            return Some(handle.control.clone());
        }
        self.shared.clients.read().get(name).cloned()
    }

    fn forward(&self, target: &str, envelope: Envelope) {
        let Some(sender) = self.peer_sender(target) else {
            debug!(target = %log_category(target), message = envelope.message.name(), "no route");
            if !matches!(envelope.message, Message::Error { .. }) {
                self.reply_to_sender(&envelope, ErrorCode::NodeNotExist);
            }
            return;
        };
        if let Err(e) = sender.send(envelope) {
            warn!(target = %log_category(target), error = %e, "forward failed");
        }
    }

    fn reply_to_sender(&self, request: &Envelope, code: ErrorCode) {
        let Some(sender) = self.peer_sender(&request.sender) else {
            return;
        };
        let _ = sender.send(request.reply_error(code));
    }

    fn reply(&self, request: &Envelope, message: Message) {
        let reply = request.reply(message);
        let Some(sender) = self.peer_sender(&reply.receiver) else {
            debug!(receiver = %log_category(&reply.receiver), "reply has no route");
            return;
        };
        if let Err(e) = sender.send(reply) {
            warn!(error = %e, "reply send failed");
        }
    }

    /// Periodic fleet-state push to the monitor client.
    fn push_states(&self) {
        let Some(sender) = self.shared.clients.read().get(MONITOR_CLIENT).cloned() else {
            return;
        };
        let states = self.node_states();
        let _ = sender.send(Envelope::new(
            MANAGER_NAME,
            MONITOR_CLIENT,
            Message::NodesState { states },
        ));
    }

    fn node_states(&self) -> Vec<NodeStateInfo> {
        self.shared
            .nodes
            .read()
            .iter()
            .map(|(name, handle)| NodeStateInfo {
                node: name.clone(),
                running: handle.adapter.running_state(),
                link: handle.adapter.link_state(),
                log_level: handle.adapter.log_level(),
            })
            .collect()
    }

    // -- dispatch ------------------------------------------------------------

    /// Envelopes addressed elsewhere are routed; the rest run the directory.
    pub fn dispatch(&self, env: Envelope) {
        if env.receiver != MANAGER_NAME {
            self.forward(&env.receiver.clone(), env);
            return;
        }

        match &env.message {
            // -- directory CRUD --
            Message::AddNode { node, plugin } => {
                let code = self.handle_add_node(node, plugin);
                self.reply(&env, Message::Error { code });
            }
            Message::DelNode { node } => self.handle_del_node(&env, node),
            Message::UpdateNode { node, new_name } => self.handle_update_node(&env, node, new_name),
            Message::GetNode { kind, filter } => {
                let nodes = self.list_nodes(*kind, filter.as_deref());
                self.reply(&env, Message::GetNodeResp { nodes });
            }
            Message::GetNodesState => {
                let states = self.node_states();
                self.reply(&env, Message::GetNodesStateResp { states });
            }

            // -- two-step completions coming back from adapters --
            Message::NodeRenameResp {
                node,
                new_name,
                error,
            } => self.finish_rename(node, new_name, *error),
            Message::NodeUninitResp { node } => self.finish_delete(node),
            Message::NodeInit { node } => {
                debug!(node = %log_category(node), "node announced itself");
            }

            // -- node-directed requests carried via the manager --
            Message::NodeCtl { node, .. }
            | Message::NodeSetting { node, .. }
            | Message::GetNodeSetting { node }
            | Message::GetNodeState { node } => {
                let mut forwarded = env.clone();
                forwarded.receiver = node.clone();
                self.forward(node, forwarded);
            }
            Message::UpdateLogLevel { node, level, core } => {
                if *core {
                    if let Some(hook) = self.shared.core_level_hook.lock().as_ref() {
                        hook(*level);
                    }
                }
                let mut forwarded = env.clone();
                forwarded.receiver = node.clone();
                self.forward(node, forwarded);
            }

            // -- driver-directed requests carried via the manager --
            Message::ReadGroup { driver, .. }
            | Message::ReadGroupPaged { driver, .. }
            | Message::TestReadTag { driver, .. }
            | Message::WriteTag { driver, .. }
            | Message::WriteTags { driver, .. }
            | Message::WriteGtags { driver, .. }
            | Message::AddGroup { driver, .. }
            | Message::DelGroup { driver, .. }
            | Message::UpdateGroup { driver, .. }
            | Message::GetGroup { driver }
            | Message::UpdateDriverGroup { driver, .. }
            | Message::GetDriverGroup { driver }
            | Message::AddTag { driver, .. }
            | Message::DelTag { driver, .. }
            | Message::UpdateTag { driver, .. }
            | Message::AddGtag { driver, .. }
            | Message::GetTag { driver, .. }
            | Message::ScanTags { driver, .. }
            | Message::PrgFileUpload { driver, .. }
            | Message::PrgFileProcess { driver }
            | Message::DriverAction { driver, .. } => {
                let mut forwarded = env.clone();
                forwarded.receiver = driver.clone();
                self.forward(driver, forwarded);
            }

            // -- subscriptions --
            Message::SubscribeGroup { .. } => self.handle_subscribe(&env),
            Message::UnsubscribeGroup { driver, .. }
            | Message::UpdateSubscribeGroup { driver, .. } => {
                let mut forwarded = env.clone();
                forwarded.receiver = driver.clone();
                self.forward(driver, forwarded);
            }
            Message::SubscribeGroups { app, groups, .. } => {
                self.handle_subscribe_bulk(&env, app, groups)
            }
            Message::GetSubscribeGroup { app } => {
                let groups = self
                    .shared
                    .store
                    .load_subscriptions(app)
                    .unwrap_or_default();
                self.reply(&env, Message::GetSubscribeGroupResp { groups });
            }
            Message::GetSubDriverTags { app } => {
                let groups = self.sub_driver_tags(app);
                self.reply(&env, Message::GetSubDriverTagsResp { groups });
            }

            // -- plugin catalog --
            Message::AddPlugin { library } | Message::UpdatePlugin { library } => {
                let code = match self.shared.plugins.confirm_library(library) {
                    Ok(descriptor) => {
                        info!(plugin = %descriptor.name, "plugin confirmed");
                        ErrorCode::Success
                    }
                    Err(code) => code,
                };
                self.reply(&env, Message::Error { code });
            }
            Message::DelPlugin { plugin } => {
                let in_use = self
                    .shared
                    .nodes
                    .read()
                    .values()
                    .any(|h| h.adapter.plugin_name() == plugin);
                let code = if in_use {
                    ErrorCode::PluginNotAllowDelete
                } else {
                    ErrorCode::from_result(self.shared.plugins.remove(plugin))
                };
                self.reply(&env, Message::Error { code });
            }
            Message::GetPlugin => {
                let plugins = self.shared.plugins.descriptors();
                self.reply(&env, Message::GetPluginResp { plugins });
            }
            Message::CheckSchema { schema } => {
                let exists = self.shared.plugins.schema_exists(schema);
                self.reply(
                    &env,
                    Message::CheckSchemaResp {
                        schema: schema.clone(),
                        exists,
                    },
                );
            }

            // -- misdirected or informational --
            Message::Error { code } => {
                debug!(sender = %env.sender, code = %code, "error reply reached the manager");
            }
            Message::TransData { .. } => {
                warn!(sender = %env.sender, "trans_data addressed to the manager dropped");
            }
            Message::NodeRename { .. }
            | Message::NodeUninit { .. }
            | Message::NodeDeleted { .. }
            | Message::NodesState { .. }
            | Message::ReadGroupResp { .. }
            | Message::ReadGroupPagedResp { .. }
            | Message::TestReadTagResp { .. }
            | Message::AddTagResp { .. }
            | Message::UpdateTagResp { .. }
            | Message::AddGtagResp { .. }
            | Message::GetTagResp { .. }
            | Message::GetGroupResp { .. }
            | Message::GetDriverGroupResp { .. }
            | Message::GetSubscribeGroupResp { .. }
            | Message::GetSubDriverTagsResp { .. }
            | Message::GetNodeResp { .. }
            | Message::GetNodeSettingResp { .. }
            | Message::GetNodeStateResp { .. }
            | Message::GetNodesStateResp { .. }
            | Message::GetPluginResp { .. }
            | Message::PrgFileProcessResp { .. }
            | Message::ScanTagsResp { .. }
            | Message::CheckSchemaResp { .. }
            | Message::DriverActionResp { .. } => {
                debug!(
                    sender = %env.sender,
                    message = env.message.name(),
                    "unexpected message at the manager",
                );
            }
        }
    }

    // -- directory operations ------------------------------------------------

    fn handle_add_node(&self, node: &str, plugin: &str) -> ErrorCode {
        if !limits::name_fits(node, limits::NODE_NAME_LEN) {
            return ErrorCode::NodeNameTooLong;
        }
        if self.shared.nodes.read().contains_key(node) {
            return ErrorCode::NodeExist;
        }
        match self.spawn_node(node, plugin) {
            Ok(()) => {
                let kind = self
                    .adapter_of(node)
                    .map(|a| a.kind())
                    .unwrap_or(NodeKind::Driver);
                let record = NodeRecord {
                    name: node.to_string(),
                    plugin: plugin.to_string(),
                    kind,
                    running: RunningState::Init,
                };
                if let Err(e) = self.shared.store.add_node(&record) {
                    warn!(node = %log_category(node), error = %e, "node persist failed");
                }
                info!(node = %log_category(node), plugin = %plugin, "node added");
                ErrorCode::Success
            }
            Err(code) => code,
        }
    }

    fn handle_del_node(&self, env: &Envelope, node: &str) {
        if self.adapter_of(node).is_none() {
            self.reply(env, Message::Error { code: ErrorCode::NodeNotExist });
            return;
        }
        self.shared
            .pending
            .lock()
            .deletes
            .insert(node.to_string(), env.clone());
        self.forward(
            node,
            Envelope::new(
                MANAGER_NAME,
                node,
                Message::NodeUninit {
                    node: node.to_string(),
                },
            ),
        );
    }

    /// Runs when the adapter acknowledges `NODE_UNINIT`.
    fn finish_delete(&self, node: &str) {
        let handle = self.shared.nodes.write().remove(node);
        let Some(handle) = handle else {
            return;
        };
        handle.adapter.destroy();
        if let Err(e) = self.shared.store.del_node(node) {
            warn!(node = %log_category(node), error = %e, "node delete persist failed");
        }

        // Every survivor prunes its own view of the deleted node
        let notify: Vec<(String, EndpointSender)> = self
            .shared
            .nodes
            .read()
            .iter()
            .map(|(name, h)| (name.clone(), h.control.clone()))
            .collect();
        for (name, control) in notify {
            let _ = control.send(Envelope::new(
                MANAGER_NAME,
                name,
                Message::NodeDeleted {
                    node: node.to_string(),
                },
            ));
        }

        if let Some(request) = self.shared.pending.lock().deletes.remove(node) {
            self.reply(&request, Message::Error { code: ErrorCode::Success });
        }
        info!(node = %log_category(node), "node deleted");
    }

    fn handle_update_node(&self, env: &Envelope, node: &str, new_name: &str) {
        let code = if self.adapter_of(node).is_none() {
            ErrorCode::NodeNotExist
        } else if self.shared.nodes.read().contains_key(new_name) {
            ErrorCode::NodeExist
        } else if !limits::name_fits(new_name, limits::NODE_NAME_LEN) {
            ErrorCode::NodeNameTooLong
        } else {
            ErrorCode::Success
        };
        if !code.is_success() {
            self.reply(env, Message::Error { code });
            return;
        }
        self.shared
            .pending
            .lock()
            .renames
            .insert(node.to_string(), env.clone());
        self.forward(
            node,
            Envelope::new(
                MANAGER_NAME,
                node,
                Message::NodeRename {
                    new_name: new_name.to_string(),
                },
            ),
        );
    }

    /// Runs when the adapter acknowledges `NODE_RENAME`.
    fn finish_rename(&self, node: &str, new_name: &str, error: ErrorCode) {
        let request = self.shared.pending.lock().renames.remove(node);
        if !error.is_success() {
            if let Some(request) = request {
                self.reply(&request, Message::Error { code: error });
            }
            return;
        }

        {
            let mut nodes = self.shared.nodes.write();
            if let Some(handle) = nodes.remove(node) {
                nodes.insert(new_name.to_string(), handle);
            }
        }
        if let Err(e) = self.shared.store.rename_node(node, new_name) {
            warn!(node = %log_category(node), error = %e, "rename persist failed");
        }
        if let Some(request) = request {
            self.reply(&request, Message::Error { code: ErrorCode::Success });
        }
        info!(from = %log_category(node), to = %log_category(new_name), "node renamed");
    }

    fn list_nodes(&self, kind: Option<NodeKind>, filter: Option<&str>) -> Vec<NodeInfo> {
        self.shared
            .nodes
            .read()
            .iter()
            .filter(|(name, handle)| {
                kind.map(|k| handle.adapter.kind() == k).unwrap_or(true)
                    && filter.map(|f| name.contains(f)).unwrap_or(true)
            })
            .map(|(name, handle)| NodeInfo {
                node: name.clone(),
                plugin: handle.adapter.plugin_name().to_string(),
            })
            .collect()
    }

    // -- subscriptions -------------------------------------------------------

    /// Validate both ends, stamp the app's telemetry port, hand to the driver.
    fn handle_subscribe(&self, env: &Envelope) {
        let Message::SubscribeGroup {
            app,
            driver,
            group,
            params,
            static_tags,
            ..
        } = &env.message
        else {
            return;
        };
        let Some(app_adapter) = self.adapter_of(app) else {
            self.reply(env, Message::Error { code: ErrorCode::NodeNotExist });
            return;
        };
        let Some(port) = app_adapter.telemetry_port() else {
            self.reply(env, Message::Error { code: ErrorCode::GroupNotAllow });
            return;
        };
        let Some(driver_adapter) = self.adapter_of(driver) else {
            self.reply(env, Message::Error { code: ErrorCode::NodeNotExist });
            return;
        };
        if driver_adapter.kind() != NodeKind::Driver {
            self.reply(env, Message::Error { code: ErrorCode::GroupNotAllow });
            return;
        }

        let mut forwarded = env.clone();
        forwarded.receiver = driver.clone();
        forwarded.message = Message::SubscribeGroup {
            app: app.clone(),
            driver: driver.clone(),
            group: group.clone(),
            port,
            params: params.clone(),
            static_tags: static_tags.clone(),
        };
        self.forward(driver, forwarded);
    }

    fn handle_subscribe_bulk(
        &self,
        env: &Envelope,
        app: &str,
        groups: &[axon_core::SubscribeEntry],
    ) {
        // Validate every entry before forwarding any
        for entry in groups {
            if self.adapter_of(&entry.driver).is_none() {
                self.reply(env, Message::Error { code: ErrorCode::NodeNotExist });
                return;
            }
        }
        for entry in groups {
            self.handle_subscribe(&Envelope {
                context: env.context,
                trace: env.trace,
                sender: env.sender.clone(),
                receiver: MANAGER_NAME.to_string(),
                message: Message::SubscribeGroup {
                    app: app.to_string(),
                    driver: entry.driver.clone(),
                    group: entry.group.clone(),
                    port: 0,
                    params: entry.params.clone(),
                    static_tags: entry.static_tags.clone(),
                },
            });
        }
    }

    fn sub_driver_tags(&self, app: &str) -> Vec<SubDriverTags> {
        let subs = self
            .shared
            .store
            .load_subscriptions(app)
            .unwrap_or_default();
        subs.into_iter()
            .map(|sub| {
                let tags = self
                    .shared
                    .store
                    .load_tags(&sub.driver, &sub.group)
                    .unwrap_or_default();
                SubDriverTags {
                    driver: sub.driver,
                    group: sub.group,
                    tags,
                }
            })
            .collect()
    }

    /// Tear down the manager's reactor registrations.
    pub fn close(&self) {
        if let Some(handle) = self.shared.state_timer.lock().take() {
            self.shared.reactor.del_timer(&handle);
        }
        if let Some(handle) = self.shared.io_handle.lock().take() {
            self.shared.reactor.del_io(&handle);
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
