// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The adapter: one plugin instance bound to a name, driven by the reactor.
//!
//! Control traffic lands in `dispatch`, one exhaustive match over the whole
//! message taxonomy. App adapters own a second endpoint for bulk telemetry
//! whose handler accepts a closed set of shapes and feeds the mailbox; a
//! dedicated consumer thread drains it into the plugin.

use crate::driver::DriverCore;
use crate::plugin::{PluginInstance, WriteResponder};
use axon_bus::{
    endpoint, EndpointSender, IoHandle, Mailbox, PortTable, PushError, Reactor, TimerHandle,
    TimerMode,
};
use axon_core::limits::{self, POLL_BASE_TICK_MS};
use axon_core::{
    log_category, Clock, Envelope, ErrorCode, LogLevel, Message, NodeKind, RunningState,
};
use axon_metrics::{names, MetricEntry, MetricType, MetricsError, NodeMetrics, Registry};
use axon_storage::Store;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The manager's well-known node name.
pub const MANAGER_NAME: &str = "manager";

/// How many rising ports an app tries before giving up on a bind.
const PORT_BIND_ATTEMPTS: u16 = 64;

/// Shared services an adapter is constructed against.
#[derive(Clone)]
pub struct AdapterDeps {
    pub reactor: Arc<Reactor>,
    pub ports: Arc<PortTable>,
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    /// Control path to the manager; every reply routes through it.
    pub manager_tx: EndpointSender,
}

pub(crate) struct AppCore {
    pub mailbox: Mailbox<Envelope>,
    pub consumer: Mutex<Option<JoinHandle<()>>>,
    pub telemetry_port: u16,
}

pub(crate) struct Shared<C: Clock> {
    pub name: RwLock<String>,
    pub plugin_name: String,
    pub kind: NodeKind,
    pub clock: C,
    pub state: Mutex<RunningState>,
    pub plugin: Mutex<PluginInstance>,
    pub setting: Mutex<Option<String>>,
    pub log_level: Mutex<LogLevel>,
    pub metrics: Mutex<Option<Arc<NodeMetrics>>>,
    pub store: Arc<dyn Store>,
    pub ports: Arc<PortTable>,
    pub out: EndpointSender,
    pub responder: WriteResponder,
    pub driver: Option<DriverCore>,
    pub app: Option<AppCore>,
    pub reactor: Arc<Reactor>,
    pub io_handles: Mutex<Vec<IoHandle>>,
    pub poll_timer: Mutex<Option<TimerHandle>>,
}

/// A running node.
pub struct Adapter<C: Clock> {
    pub(crate) shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for Adapter<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Clock> Adapter<C> {
    /// Construct and wire a node; returns the adapter and the control sender
    /// the manager routes envelopes through.
    ///
    /// `telemetry_port_hint` is the first port an app adapter tries; bind
    /// conflicts retry upward.
    pub fn spawn(
        name: &str,
        plugin_name: &str,
        instance: PluginInstance,
        deps: AdapterDeps,
        clock: C,
        telemetry_port_hint: u16,
    ) -> Result<(Self, EndpointSender), ErrorCode> {
        if !limits::name_fits(name, limits::NODE_NAME_LEN) {
            return Err(ErrorCode::NodeNameTooLong);
        }
        let kind = match &instance {
            PluginInstance::Driver(_) => NodeKind::Driver,
            PluginInstance::App(_) => NodeKind::App,
        };

        let (control_tx, control_rx) = endpoint();

        // App shape: telemetry endpoint bound to a port, plus the mailbox
        let mut telemetry = None;
        let app = if kind == NodeKind::App {
            let (tele_tx, tele_rx) = endpoint();
            let mut port = telemetry_port_hint;
            loop {
                match deps.ports.bind(port, tele_tx.clone()) {
                    Ok(()) => break,
                    Err(_) if port < telemetry_port_hint + PORT_BIND_ATTEMPTS => port += 1,
                    Err(e) => return Err(e),
                }
            }
            telemetry = Some(tele_rx);
            Some(AppCore {
                mailbox: Mailbox::new(),
                consumer: Mutex::new(None),
                telemetry_port: port,
            })
        } else {
            None
        };

        let metrics = register_metrics(&deps.registry, name, kind);
        let driver = (kind == NodeKind::Driver).then(DriverCore::new);

        let shared = Arc::new(Shared {
            name: RwLock::new(name.to_string()),
            plugin_name: plugin_name.to_string(),
            kind,
            clock,
            state: Mutex::new(RunningState::Init),
            plugin: Mutex::new(instance),
            setting: Mutex::new(None),
            log_level: Mutex::new(LogLevel::default()),
            metrics: Mutex::new(metrics),
            store: Arc::clone(&deps.store),
            ports: Arc::clone(&deps.ports),
            out: deps.manager_tx.clone(),
            responder: WriteResponder::new(deps.manager_tx.clone()),
            driver,
            app,
            reactor: Arc::clone(&deps.reactor),
            io_handles: Mutex::new(Vec::new()),
            poll_timer: Mutex::new(None),
        });
        let adapter = Self { shared };

        // Exactly one control registration per node
        let control = {
            let a = adapter.clone();
            map_reactor_err(control_rx.register(
                &deps.reactor,
                move |env| a.dispatch(env),
                |_| {},
            ))?
        };
        adapter.shared.io_handles.lock().push(control);

        // ...and one extra for an app's telemetry socket
        if let Some(tele_rx) = telemetry {
            let handle = {
                let a = adapter.clone();
                map_reactor_err(tele_rx.register(
                    &deps.reactor,
                    move |env| a.on_telemetry(env),
                    |_| {},
                ))?
            };
            adapter.shared.io_handles.lock().push(handle);
        }

        adapter.boot(name)?;
        Ok((adapter.clone(), control_tx))
    }

    /// Plugin bring-up, persisted-state reload, NODE_INIT announcement.
    fn boot(&self, name: &str) -> Result<(), ErrorCode> {
        let has_setting = self
            .shared
            .store
            .setting(name)
            .unwrap_or_else(|e| {
                warn!(node = %log_category(name), error = %e, "setting load failed");
                None
            });

        let accepted = {
            let mut plugin = self.shared.plugin.lock();
            plugin.as_plugin().open()?;
            plugin.as_plugin().init(has_setting.is_some())?;
            match &has_setting {
                Some(setting) => plugin.as_plugin().setting(setting).is_ok(),
                None => false,
            }
        };
        if accepted {
            *self.shared.setting.lock() = has_setting;
            *self.shared.state.lock() = RunningState::Ready;
        }

        if self.shared.kind == NodeKind::Driver {
            self.reload_driver_config(name);
            self.start_poll_timer();
        }
        if let Some(app) = &self.shared.app {
            self.start_consumer(app);
        }

        self.send(Envelope::new(
            name,
            MANAGER_NAME,
            Message::NodeInit { node: name.to_string() },
        ));
        info!(node = %log_category(name), kind = ?self.shared.kind, "node initialized");
        Ok(())
    }

    fn reload_driver_config(&self, name: &str) {
        let Some(driver) = &self.shared.driver else {
            return;
        };
        let now_ms = self.shared.clock.epoch_ms();
        let now_us = self.shared.clock.epoch_us();
        let groups = self.shared.store.load_groups(name).unwrap_or_else(|e| {
            warn!(node = %log_category(name), error = %e, "group reload failed");
            Vec::new()
        });
        for record in groups {
            match driver.add_group(&record.name, record.interval_ms, record.context.clone(), now_ms)
            {
                Ok(group) => {
                    let tags = self
                        .shared
                        .store
                        .load_tags(name, &record.name)
                        .unwrap_or_default();
                    if let Err(e) = group.add_tags(tags, now_us) {
                        warn!(node = %log_category(name), group = %record.name, error = %e, "tag reload failed");
                    }
                }
                Err(e) => {
                    warn!(node = %log_category(name), group = %record.name, error = %e, "group reload failed")
                }
            }
        }
    }

    fn start_poll_timer(&self) {
        let a = self.clone();
        // BLOCK mode: a slow device read defers the next inspection instead
        // of stacking them
        match self.shared.reactor.add_timer(
            Duration::from_millis(POLL_BASE_TICK_MS),
            TimerMode::Block,
            move || a.on_poll_tick(),
        ) {
            Ok(handle) => {
                self.shared.poll_timer.lock().replace(handle);
            }
            Err(e) => warn!(error = %e, "failed to register poll timer"),
        }
    }

    fn start_consumer(&self, app: &AppCore) {
        let mailbox = app.mailbox.clone();
        let shared = Arc::clone(&self.shared);
        let thread = std::thread::Builder::new()
            .name(format!("axon-consumer-{}", self.name()))
            .spawn(move || {
                while let Some(env) = mailbox.pop() {
                    {
                        let mut plugin = shared.plugin.lock();
                        if let Err(code) = plugin.as_plugin().request(&env) {
                            debug!(code = %code, "app plugin rejected telemetry");
                        }
                    }
                    if let Some(metrics) = shared.metrics.lock().as_ref() {
                        let _ = metrics.update(
                            names::TRANS_DATA_TOTAL,
                            shared.clock.epoch_ms(),
                            1,
                        );
                    }
                    // env drops here, releasing its payload reference
                }
            });
        match thread {
            Ok(handle) => {
                app.consumer.lock().replace(handle);
            }
            Err(e) => warn!(error = %e, "failed to spawn consumer thread"),
        }
    }

    // -- accessors -----------------------------------------------------------

    pub fn name(&self) -> String {
        self.shared.name.read().clone()
    }

    pub fn kind(&self) -> NodeKind {
        self.shared.kind
    }

    pub fn plugin_name(&self) -> &str {
        &self.shared.plugin_name
    }

    pub fn running_state(&self) -> RunningState {
        *self.shared.state.lock()
    }

    pub fn link_state(&self) -> axon_core::LinkState {
        self.shared.plugin.lock().link_state()
    }

    pub fn log_level(&self) -> LogLevel {
        *self.shared.log_level.lock()
    }

    /// The port an app's telemetry endpoint is bound to.
    pub fn telemetry_port(&self) -> Option<u16> {
        self.shared.app.as_ref().map(|a| a.telemetry_port)
    }

    pub fn metrics(&self) -> Option<Arc<NodeMetrics>> {
        self.shared.metrics.lock().clone()
    }

    pub(crate) fn bump_metric(&self, name: &str, value: u64) {
        if let Some(metrics) = self.shared.metrics.lock().as_ref() {
            let _ = metrics.update(name, self.shared.clock.epoch_ms(), value);
        }
    }

    pub(crate) fn set_gauge(&self, name: &str, value: u64) {
        self.bump_metric(name, value);
    }

    /// Send through the manager, counting it.
    pub(crate) fn send(&self, envelope: Envelope) {
        self.bump_metric(names::SEND_MSGS_TOTAL, 1);
        if let Err(e) = self.out_send(envelope) {
            warn!(node = %log_category(&self.name()), error = %e, "control send failed");
        }
    }

    fn out_send(&self, envelope: Envelope) -> Result<(), axon_bus::SendError> {
        self.shared.out.send(envelope)
    }

    // -- telemetry path ------------------------------------------------------

    /// The telemetry endpoint accepts a closed set: data to the mailbox,
    /// errors inline, everything else logged and dropped.
    fn on_telemetry(&self, env: Envelope) {
        match &env.message {
            Message::TransData { .. } => {
                self.bump_metric(names::TRANS_DATA_RATE_1M, 1);
                let Some(app) = &self.shared.app else {
                    return;
                };
                match app.mailbox.push(env) {
                    Ok(()) => {}
                    Err(PushError::Full(env)) | Err(PushError::Closed(env)) => {
                        warn!(
                            node = %log_category(&self.name()),
                            sender = %env.sender,
                            "mailbox full, telemetry dropped",
                        );
                        self.bump_metric(names::TRANS_DATA_DROPPED_TOTAL, 1);
                        // env drops here, releasing its payload reference
                    }
                }
            }
            Message::Error { .. } => {
                // Errors may need prompt reaction; bypass the mailbox
                let mut plugin = self.shared.plugin.lock();
                let _ = plugin.as_plugin().request(&env);
            }
            other => {
                warn!(
                    node = %log_category(&self.name()),
                    message = other.name(),
                    "unexpected message on telemetry endpoint",
                );
            }
        }
    }

    // -- lifecycle operations ------------------------------------------------

    fn handle_start(&self) -> ErrorCode {
        let mut state = self.shared.state.lock();
        if let Err(code) = state.check_start() {
            return code;
        }
        if let Err(code) = self.shared.plugin.lock().as_plugin().start() {
            // A failed start keeps the previous state
            return code;
        }
        *state = RunningState::Running;
        drop(state);
        self.persist_state(RunningState::Running);
        info!(node = %log_category(&self.name()), "node started");
        ErrorCode::Success
    }

    fn handle_stop(&self) -> ErrorCode {
        let mut state = self.shared.state.lock();
        if let Err(code) = state.check_stop() {
            return code;
        }
        if let Err(code) = self.shared.plugin.lock().as_plugin().stop() {
            return code;
        }
        *state = RunningState::Stopped;
        drop(state);
        if let Some(metrics) = self.shared.metrics.lock().as_ref() {
            metrics.reset();
        }
        self.persist_state(RunningState::Stopped);
        info!(node = %log_category(&self.name()), "node stopped");
        ErrorCode::Success
    }

    fn persist_state(&self, running: RunningState) {
        if let Err(e) = self.shared.store.set_node_state(&self.name(), running) {
            warn!(node = %log_category(&self.name()), error = %e, "state persist failed");
        }
    }

    fn handle_setting(&self, setting: &str) -> ErrorCode {
        if let Err(code) = self.shared.plugin.lock().as_plugin().setting(setting) {
            return code;
        }
        *self.shared.setting.lock() = Some(setting.to_string());
        {
            let mut state = self.shared.state.lock();
            if *state == RunningState::Init {
                *state = RunningState::Ready;
            }
        }
        if let Err(e) = self.shared.store.set_setting(&self.name(), setting) {
            warn!(node = %log_category(&self.name()), error = %e, "setting persist failed");
        }
        ErrorCode::Success
    }

    /// Rename pauses polling so no tick fires against a half-renamed node.
    fn handle_rename(&self, new_name: &str) -> Result<String, ErrorCode> {
        if !limits::name_fits(new_name, limits::NODE_NAME_LEN) {
            return Err(ErrorCode::NodeNameTooLong);
        }
        let timer = self.shared.poll_timer.lock();
        if let Some(handle) = timer.as_ref() {
            self.shared.reactor.pause_timer(handle);
        }

        let old = {
            let mut name = self.shared.name.write();
            let old = name.clone();
            *name = new_name.to_string();
            old
        };
        if let Some(metrics) = self.shared.metrics.lock().as_ref() {
            metrics.rename(new_name);
        }

        if let Some(handle) = timer.as_ref() {
            self.shared.reactor.resume_timer(handle);
        }
        info!(from = %log_category(&old), to = %log_category(new_name), "node renamed");
        Ok(old)
    }

    fn handle_uninit(&self) -> Envelope {
        let name = self.name();
        {
            let state = *self.shared.state.lock();
            let mut plugin = self.shared.plugin.lock();
            if state == RunningState::Running {
                let _ = plugin.as_plugin().stop();
            }
            plugin.as_plugin().uninit();
        }
        Envelope::new(
            name.clone(),
            MANAGER_NAME,
            Message::NodeUninitResp { node: name },
        )
    }

    /// Release every runtime resource. The manager calls this after it
    /// observes `NodeUninitResp`.
    pub fn destroy(&self) {
        for handle in self.shared.io_handles.lock().drain(..) {
            self.shared.reactor.del_io(&handle);
        }
        if let Some(handle) = self.shared.poll_timer.lock().take() {
            self.shared.reactor.del_timer(&handle);
        }
        if let Some(app) = &self.shared.app {
            let dropped = app.mailbox.close();
            if dropped > 0 {
                debug!(node = %log_category(&self.name()), dropped, "mailbox drained at teardown");
            }
            if let Some(consumer) = app.consumer.lock().take() {
                let _ = consumer.join();
            }
            self.shared.ports.unbind(app.telemetry_port);
        }
        debug!(node = %log_category(&self.name()), "node destroyed");
    }

    // -- dispatch ------------------------------------------------------------

    /// One arm per message shape; the compiler keeps this exhaustive.
    pub fn dispatch(&self, env: Envelope) {
        self.bump_metric(names::RECV_MSGS_TOTAL, 1);

        if env.message.is_driver_only() && self.shared.kind == NodeKind::App {
            self.send(env.reply_error(ErrorCode::GroupNotAllow));
            return;
        }

        match &env.message {
            // -- node lifecycle --
            Message::NodeCtl { cmd, .. } => {
                let code = match cmd {
                    axon_core::NodeCtlCmd::Start => self.handle_start(),
                    axon_core::NodeCtlCmd::Stop => self.handle_stop(),
                };
                self.send(env.reply_error(code));
            }
            Message::NodeSetting { setting, .. } => {
                let code = self.handle_setting(setting);
                self.send(env.reply_error(code));
            }
            Message::GetNodeSetting { .. } => {
                let reply = match self.shared.setting.lock().clone() {
                    Some(setting) => env.reply(Message::GetNodeSettingResp {
                        node: self.name(),
                        setting,
                    }),
                    None => env.reply_error(ErrorCode::NodeSettingNotFound),
                };
                self.send(reply);
            }
            Message::GetNodeState { .. } => {
                let reply = env.reply(Message::GetNodeStateResp {
                    running: self.running_state(),
                    link: self.link_state(),
                    log_level: self.log_level(),
                });
                self.send(reply);
            }
            Message::NodeRename { new_name } => {
                let reply = match self.handle_rename(new_name) {
                    Ok(old) => env.reply(Message::NodeRenameResp {
                        node: old,
                        new_name: new_name.clone(),
                        error: ErrorCode::Success,
                    }),
                    Err(code) => env.reply(Message::NodeRenameResp {
                        node: self.name(),
                        new_name: new_name.clone(),
                        error: code,
                    }),
                };
                self.send(reply);
            }
            Message::NodeUninit { .. } => {
                let resp = self.handle_uninit();
                self.send(resp);
            }
            Message::UpdateLogLevel { level, .. } => {
                *self.shared.log_level.lock() = *level;
                self.send(env.reply_error(ErrorCode::Success));
            }
            Message::NodeDeleted { node } => {
                if let Some(driver) = &self.shared.driver {
                    driver.remove_app(node, self.shared.clock.epoch_us());
                }
                let mut plugin = self.shared.plugin.lock();
                let _ = plugin.as_plugin().request(&env);
            }

            // -- driver data plane --
            Message::ReadGroup { .. } | Message::ReadGroupPaged { .. } => self.driver_read(&env),
            Message::TestReadTag { .. } => self.driver_test_read(&env),
            Message::WriteTag { .. } | Message::WriteTags { .. } | Message::WriteGtags { .. } => {
                self.driver_write(&env)
            }

            // -- driver configuration --
            Message::SubscribeGroup { .. }
            | Message::UnsubscribeGroup { .. }
            | Message::UpdateSubscribeGroup { .. } => self.driver_subscribe(&env),
            Message::AddGroup { .. }
            | Message::DelGroup { .. }
            | Message::UpdateGroup { .. }
            | Message::GetGroup { .. }
            | Message::UpdateDriverGroup { .. }
            | Message::GetDriverGroup { .. } => self.driver_group_op(&env),
            Message::AddTag { .. }
            | Message::DelTag { .. }
            | Message::UpdateTag { .. }
            | Message::AddGtag { .. }
            | Message::GetTag { .. } => self.driver_tag_op(&env),
            Message::ScanTags { .. }
            | Message::PrgFileUpload { .. }
            | Message::PrgFileProcess { .. }
            | Message::DriverAction { .. } => self.driver_misc(&env),

            // -- responses and notifications: the plugin's business --
            Message::Error { .. }
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
            | Message::NodeRenameResp { .. }
            | Message::NodeUninitResp { .. }
            | Message::GetPluginResp { .. }
            | Message::PrgFileProcessResp { .. }
            | Message::ScanTagsResp { .. }
            | Message::CheckSchemaResp { .. }
            | Message::DriverActionResp { .. }
            | Message::NodesState { .. } => {
                let mut plugin = self.shared.plugin.lock();
                if let Err(code) = plugin.as_plugin().request(&env) {
                    debug!(code = %code, message = env.message.name(), "plugin rejected response");
                }
            }

            // -- bulk telemetry never belongs on the control endpoint --
            Message::TransData { .. } => {
                warn!(node = %log_category(&self.name()), "trans_data on control endpoint dropped");
            }

            // -- manager-directory traffic misrouted to a node --
            Message::AddNode { .. }
            | Message::DelNode { .. }
            | Message::UpdateNode { .. }
            | Message::GetNode { .. }
            | Message::GetNodesState
            | Message::NodeInit { .. }
            | Message::SubscribeGroups { .. }
            | Message::GetSubscribeGroup { .. }
            | Message::GetSubDriverTags { .. }
            | Message::AddPlugin { .. }
            | Message::DelPlugin { .. }
            | Message::UpdatePlugin { .. }
            | Message::GetPlugin
            | Message::CheckSchema { .. } => {
                warn!(
                    node = %log_category(&self.name()),
                    message = env.message.name(),
                    "directory request sent to a node",
                );
                self.send(env.reply_error(ErrorCode::BodyInvalid));
            }
        }
    }

    /// Scheduler tick: poll due groups and push telemetry straight to the
    /// subscribers' ports.
    fn on_poll_tick(&self) {
        if self.running_state() != RunningState::Running {
            return;
        }
        let Some(driver) = &self.shared.driver else {
            return;
        };
        let name = self.name();
        let now_ms = self.shared.clock.epoch_ms();
        let out = {
            let mut plugin = self.shared.plugin.lock();
            let Some(plugin) = plugin.as_driver() else {
                return;
            };
            driver.on_tick(now_ms, &name, plugin)
        };

        if out.tag_reads > 0 {
            self.bump_metric(names::TAG_READS_TOTAL, out.tag_reads);
        }
        if out.read_errors > 0 {
            self.bump_metric(names::TAG_READ_ERRORS_TOTAL, out.read_errors);
        }
        for emission in out.emissions {
            let Some(sender) = self.shared.ports.lookup(emission.port) else {
                warn!(app = %emission.app, port = emission.port, "no endpoint bound to port");
                continue;
            };
            self.bump_metric(names::SEND_MSGS_TOTAL, 1);
            if let Err(e) = sender.send(emission.envelope) {
                warn!(app = %emission.app, error = %e, "telemetry send failed");
            }
        }
        self.set_gauge(names::GROUPS_TOTAL, driver.group_count() as u64);
        self.set_gauge(names::GROUP_TAGS_TOTAL, driver.tag_total() as u64);
    }
}

fn map_reactor_err(
    result: Result<IoHandle, axon_bus::ReactorError>,
) -> Result<IoHandle, ErrorCode> {
    result.map_err(|e| {
        warn!(error = %e, "reactor registration failed");
        ErrorCode::Internal
    })
}

/// Register the driver or app metric set. A failure leaves the node without
/// metrics rather than without a life.
fn register_metrics(
    registry: &Arc<Registry>,
    name: &str,
    kind: NodeKind,
) -> Option<Arc<NodeMetrics>> {
    let metrics = NodeMetrics::new(Arc::clone(registry), name);
    let result: Result<(), MetricsError> = (|| {
        metrics.register(MetricEntry::new(
            names::RECV_MSGS_TOTAL,
            names::RECV_MSGS_TOTAL_HELP,
            MetricType::Counter,
            0,
        )?)?;
        metrics.register(MetricEntry::new(
            names::SEND_MSGS_TOTAL,
            names::SEND_MSGS_TOTAL_HELP,
            MetricType::Counter,
            0,
        )?)?;
        match kind {
            NodeKind::Driver => {
                metrics.register(MetricEntry::new(
                    names::TAG_READS_TOTAL,
                    names::TAG_READS_TOTAL_HELP,
                    MetricType::Counter,
                    0,
                )?)?;
                metrics.register(MetricEntry::new(
                    names::TAG_READ_ERRORS_TOTAL,
                    names::TAG_READ_ERRORS_TOTAL_HELP,
                    MetricType::Counter,
                    0,
                )?)?;
                metrics.register(MetricEntry::new(
                    names::TAG_WRITES_TOTAL,
                    names::TAG_WRITES_TOTAL_HELP,
                    MetricType::Counter,
                    0,
                )?)?;
                metrics.register(MetricEntry::new(
                    names::CACHE_HITS_TOTAL,
                    names::CACHE_HITS_TOTAL_HELP,
                    MetricType::Counter,
                    0,
                )?)?;
                metrics.register(
                    MetricEntry::new(
                        names::GROUPS_TOTAL,
                        names::GROUPS_TOTAL_HELP,
                        MetricType::Gauge,
                        0,
                    )?
                    .no_reset(),
                )?;
                metrics.register(
                    MetricEntry::new(
                        names::GROUP_TAGS_TOTAL,
                        names::GROUP_TAGS_TOTAL_HELP,
                        MetricType::Gauge,
                        0,
                    )?
                    .no_reset(),
                )?;
            }
            NodeKind::App => {
                metrics.register(MetricEntry::new(
                    names::TRANS_DATA_TOTAL,
                    names::TRANS_DATA_TOTAL_HELP,
                    MetricType::Counter,
                    0,
                )?)?;
                metrics.register(MetricEntry::new(
                    names::TRANS_DATA_DROPPED_TOTAL,
                    names::TRANS_DATA_DROPPED_TOTAL_HELP,
                    MetricType::Counter,
                    0,
                )?)?;
                metrics.register(MetricEntry::new(
                    names::TRANS_DATA_RATE_1M,
                    names::TRANS_DATA_RATE_1M_HELP,
                    MetricType::RollingCounter,
                    0,
                )?)?;
            }
        }
        Ok(())
    })();
    match result {
        Ok(()) => Some(metrics),
        Err(e) => {
            warn!(node = %log_category(name), error = %e, "metrics registration failed, continuing without");
            None
        }
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
