// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The message taxonomy exchanged between nodes.
//!
//! Every request/response shape is one variant of `Message`; consumers
//! dispatch with a single exhaustive match so the compiler flags any variant
//! a handler forgot. Messages move through in-memory channels as owned
//! values; nothing here is serialized.

use crate::envelope::TransPayload;
use crate::error::ErrorCode;
use crate::node::{LinkState, LogLevel, NodeKind, RunningState};
use crate::plugin::PluginDescriptor;
use crate::subscription::Subscription;
use crate::tag::Tag;
use crate::value::{DataType, Value};
use std::sync::Arc;

/// One tag name paired with a value to write.
#[derive(Debug, Clone, PartialEq)]
pub struct TagValue {
    pub tag: String,
    pub value: Value,
}

/// One telemetry sample: tag name, value, and driver-attached metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TagValueMeta {
    pub tag: String,
    pub value: Value,
    /// At most 32 entries of driver-opaque per-sample metadata.
    pub metas: Vec<(String, Value)>,
}

impl TagValueMeta {
    pub fn new(tag: impl Into<String>, value: Value) -> Self {
        Self {
            tag: tag.into(),
            value,
            metas: Vec::new(),
        }
    }
}

/// Per-group batch inside a multi-group write.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTagValues {
    pub group: String,
    pub tags: Vec<TagValue>,
}

/// Per-group batch inside a multi-group tag add.
#[derive(Debug, Clone, PartialEq)]
pub struct GtagGroup {
    pub group: String,
    pub interval_ms: u32,
    pub tags: Vec<Tag>,
}

/// One entry of a bulk subscribe.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeEntry {
    pub driver: String,
    pub group: String,
    pub params: Option<String>,
    pub static_tags: Option<String>,
}

/// Node directory listing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub node: String,
    pub plugin: String,
}

/// Per-node lifecycle snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStateInfo {
    pub node: String,
    pub running: RunningState,
    pub link: LinkState,
    pub log_level: LogLevel,
}

/// Group listing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    pub name: String,
    pub interval_ms: u32,
    pub tag_count: usize,
    pub context: Option<String>,
}

/// Subscribed group with its current tag snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SubDriverTags {
    pub driver: String,
    pub group: String,
    pub tags: Vec<Tag>,
}

/// Start/stop command carried by `NodeCtl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCtlCmd {
    Start,
    Stop,
}

/// Program-file delivery state reported by a driver plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrgFileState {
    Idle,
    Transferring,
    Done,
    Failed,
}

/// JSON rendering class of a test-read value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Bool,
    Int,
    Float,
    Str,
    Array,
    Object,
}

impl JsonKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => JsonKind::Bool,
            Value::F32(_) | Value::F64(_) => JsonKind::Float,
            Value::Str(_) => JsonKind::Str,
            Value::Custom(v) if v.is_object() => JsonKind::Object,
            Value::Custom(v) if v.is_array() => JsonKind::Array,
            Value::Custom(v) if v.is_string() => JsonKind::Str,
            Value::Custom(v) if v.is_boolean() => JsonKind::Bool,
            Value::Custom(v) if v.is_f64() => JsonKind::Float,
            Value::Custom(_) => JsonKind::Int,
            Value::Bytes(_)
            | Value::BoolArray(_)
            | Value::I8Array(_)
            | Value::I16Array(_)
            | Value::I32Array(_)
            | Value::I64Array(_)
            | Value::U8Array(_)
            | Value::U16Array(_)
            | Value::U32Array(_)
            | Value::U64Array(_)
            | Value::F32Array(_)
            | Value::F64Array(_)
            | Value::StrArray(_) => JsonKind::Array,
            _ => JsonKind::Int,
        }
    }
}

/// The closed set of message shapes routed between nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // -- errors / acks --
    Error {
        code: ErrorCode,
    },

    // -- reads --
    ReadGroup {
        driver: String,
        group: String,
        name_filter: Option<String>,
        desc_filter: Option<String>,
        /// Bypass the tag cache and hit the device.
        sync: bool,
        /// Explicit tag-name set; empty means "all readable".
        tags: Vec<String>,
    },
    ReadGroupResp {
        driver: String,
        group: String,
        tags: Vec<TagValueMeta>,
    },
    ReadGroupPaged {
        driver: String,
        group: String,
        name_filter: Option<String>,
        desc_filter: Option<String>,
        current_page: u32,
        page_size: u32,
        /// Keep only error-valued tags.
        is_error: bool,
    },
    ReadGroupPagedResp {
        driver: String,
        group: String,
        tags: Vec<TagValueMeta>,
        /// Size of the whole filtered set, not the page.
        total_count: u32,
    },
    TestReadTag {
        driver: String,
        group: String,
        /// Synthetic descriptor; never persisted.
        tag: Tag,
    },
    TestReadTagResp {
        data_type: DataType,
        json_kind: JsonKind,
        value: Value,
        error: ErrorCode,
    },

    // -- writes --
    WriteTag {
        driver: String,
        group: String,
        tag: String,
        value: Value,
    },
    WriteTags {
        driver: String,
        group: String,
        tags: Vec<TagValue>,
    },
    WriteGtags {
        driver: String,
        groups: Vec<GroupTagValues>,
    },

    // -- subscribe --
    SubscribeGroup {
        app: String,
        driver: String,
        group: String,
        /// Telemetry port the app's mailbox endpoint is bound to.
        port: u16,
        params: Option<String>,
        static_tags: Option<String>,
    },
    UnsubscribeGroup {
        app: String,
        driver: String,
        group: String,
    },
    UpdateSubscribeGroup {
        app: String,
        driver: String,
        group: String,
        params: Option<String>,
        static_tags: Option<String>,
    },
    SubscribeGroups {
        app: String,
        port: u16,
        groups: Vec<SubscribeEntry>,
    },
    GetSubscribeGroup {
        app: String,
    },
    GetSubscribeGroupResp {
        groups: Vec<Subscription>,
    },
    GetSubDriverTags {
        app: String,
    },
    GetSubDriverTagsResp {
        groups: Vec<SubDriverTags>,
    },

    // -- node CRUD + state --
    AddNode {
        node: String,
        plugin: String,
    },
    DelNode {
        node: String,
    },
    UpdateNode {
        node: String,
        new_name: String,
    },
    GetNode {
        kind: Option<NodeKind>,
        filter: Option<String>,
    },
    GetNodeResp {
        nodes: Vec<NodeInfo>,
    },
    NodeSetting {
        node: String,
        setting: String,
    },
    GetNodeSetting {
        node: String,
    },
    GetNodeSettingResp {
        node: String,
        setting: String,
    },
    GetNodeState {
        node: String,
    },
    GetNodeStateResp {
        running: RunningState,
        link: LinkState,
        log_level: LogLevel,
    },
    GetNodesState,
    GetNodesStateResp {
        states: Vec<NodeStateInfo>,
    },
    NodeCtl {
        node: String,
        cmd: NodeCtlCmd,
    },
    NodeRename {
        new_name: String,
    },
    NodeRenameResp {
        node: String,
        new_name: String,
        error: ErrorCode,
    },
    NodeInit {
        node: String,
    },
    NodeUninit {
        node: String,
    },
    NodeUninitResp {
        node: String,
    },

    // -- group CRUD --
    AddGroup {
        driver: String,
        group: String,
        interval_ms: u32,
        context: Option<String>,
    },
    DelGroup {
        driver: String,
        group: String,
    },
    UpdateGroup {
        driver: String,
        group: String,
        new_name: Option<String>,
        interval_ms: Option<u32>,
    },
    GetGroup {
        driver: String,
    },
    GetGroupResp {
        driver: String,
        groups: Vec<GroupInfo>,
    },
    UpdateDriverGroup {
        driver: String,
        group: String,
        new_name: Option<String>,
        interval_ms: Option<u32>,
    },
    GetDriverGroup {
        driver: String,
    },
    GetDriverGroupResp {
        driver: String,
        groups: Vec<GroupInfo>,
    },

    // -- tag CRUD --
    AddTag {
        driver: String,
        group: String,
        tags: Vec<Tag>,
    },
    AddTagResp {
        added: u16,
        error: ErrorCode,
    },
    DelTag {
        driver: String,
        group: String,
        tags: Vec<String>,
    },
    UpdateTag {
        driver: String,
        group: String,
        tags: Vec<Tag>,
    },
    UpdateTagResp {
        updated: u16,
        error: ErrorCode,
    },
    AddGtag {
        driver: String,
        groups: Vec<GtagGroup>,
    },
    AddGtagResp {
        added: u16,
        error: ErrorCode,
    },
    GetTag {
        driver: String,
        group: String,
        filter: Option<String>,
    },
    GetTagResp {
        tags: Vec<Tag>,
    },

    // -- plugin CRUD --
    AddPlugin {
        library: String,
    },
    DelPlugin {
        plugin: String,
    },
    UpdatePlugin {
        library: String,
    },
    GetPlugin,
    GetPluginResp {
        plugins: Vec<PluginDescriptor>,
    },

    // -- telemetry & lifecycle --
    TransData {
        payload: Arc<TransPayload>,
    },
    NodesState {
        states: Vec<NodeStateInfo>,
    },
    NodeDeleted {
        node: String,
    },

    // -- ops --
    UpdateLogLevel {
        node: String,
        level: LogLevel,
        /// Also apply the level to the daemon-wide filter.
        core: bool,
    },
    PrgFileUpload {
        driver: String,
        name: String,
        data: Vec<u8>,
    },
    PrgFileProcess {
        driver: String,
    },
    PrgFileProcessResp {
        state: PrgFileState,
        reason: Option<String>,
    },
    ScanTags {
        driver: String,
        /// Driver-opaque scan position.
        ctx: String,
    },
    ScanTagsResp {
        tags: Vec<Tag>,
        error: ErrorCode,
        data_type: Option<DataType>,
        is_array: bool,
        /// No more tags behind `ctx`; the scan is complete.
        is_last: bool,
        ctx: String,
    },
    CheckSchema {
        schema: String,
    },
    CheckSchemaResp {
        schema: String,
        exists: bool,
    },
    DriverAction {
        driver: String,
        action: String,
    },
    DriverActionResp {
        error: ErrorCode,
        data: Option<String>,
    },
}

impl Message {
    /// Stable name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Error { .. } => "error",
            Message::ReadGroup { .. } => "read_group",
            Message::ReadGroupResp { .. } => "read_group_resp",
            Message::ReadGroupPaged { .. } => "read_group_paged",
            Message::ReadGroupPagedResp { .. } => "read_group_paged_resp",
            Message::TestReadTag { .. } => "test_read_tag",
            Message::TestReadTagResp { .. } => "test_read_tag_resp",
            Message::WriteTag { .. } => "write_tag",
            Message::WriteTags { .. } => "write_tags",
            Message::WriteGtags { .. } => "write_gtags",
            Message::SubscribeGroup { .. } => "subscribe_group",
            Message::UnsubscribeGroup { .. } => "unsubscribe_group",
            Message::UpdateSubscribeGroup { .. } => "update_subscribe_group",
            Message::SubscribeGroups { .. } => "subscribe_groups",
            Message::GetSubscribeGroup { .. } => "get_subscribe_group",
            Message::GetSubscribeGroupResp { .. } => "get_subscribe_group_resp",
            Message::GetSubDriverTags { .. } => "get_sub_driver_tags",
            Message::GetSubDriverTagsResp { .. } => "get_sub_driver_tags_resp",
            Message::AddNode { .. } => "add_node",
            Message::DelNode { .. } => "del_node",
            Message::UpdateNode { .. } => "update_node",
            Message::GetNode { .. } => "get_node",
            Message::GetNodeResp { .. } => "get_node_resp",
            Message::NodeSetting { .. } => "node_setting",
            Message::GetNodeSetting { .. } => "get_node_setting",
            Message::GetNodeSettingResp { .. } => "get_node_setting_resp",
            Message::GetNodeState { .. } => "get_node_state",
            Message::GetNodeStateResp { .. } => "get_node_state_resp",
            Message::GetNodesState => "get_nodes_state",
            Message::GetNodesStateResp { .. } => "get_nodes_state_resp",
            Message::NodeCtl { .. } => "node_ctl",
            Message::NodeRename { .. } => "node_rename",
            Message::NodeRenameResp { .. } => "node_rename_resp",
            Message::NodeInit { .. } => "node_init",
            Message::NodeUninit { .. } => "node_uninit",
            Message::NodeUninitResp { .. } => "node_uninit_resp",
            Message::AddGroup { .. } => "add_group",
            Message::DelGroup { .. } => "del_group",
            Message::UpdateGroup { .. } => "update_group",
            Message::GetGroup { .. } => "get_group",
            Message::GetGroupResp { .. } => "get_group_resp",
            Message::UpdateDriverGroup { .. } => "update_driver_group",
            Message::GetDriverGroup { .. } => "get_driver_group",
            Message::GetDriverGroupResp { .. } => "get_driver_group_resp",
            Message::AddTag { .. } => "add_tag",
            Message::AddTagResp { .. } => "add_tag_resp",
            Message::DelTag { .. } => "del_tag",
            Message::UpdateTag { .. } => "update_tag",
            Message::UpdateTagResp { .. } => "update_tag_resp",
            Message::AddGtag { .. } => "add_gtag",
            Message::AddGtagResp { .. } => "add_gtag_resp",
            Message::GetTag { .. } => "get_tag",
            Message::GetTagResp { .. } => "get_tag_resp",
            Message::AddPlugin { .. } => "add_plugin",
            Message::DelPlugin { .. } => "del_plugin",
            Message::UpdatePlugin { .. } => "update_plugin",
            Message::GetPlugin => "get_plugin",
            Message::GetPluginResp { .. } => "get_plugin_resp",
            Message::TransData { .. } => "trans_data",
            Message::NodesState { .. } => "nodes_state",
            Message::NodeDeleted { .. } => "node_deleted",
            Message::UpdateLogLevel { .. } => "update_log_level",
            Message::PrgFileUpload { .. } => "prg_file_upload",
            Message::PrgFileProcess { .. } => "prg_file_process",
            Message::PrgFileProcessResp { .. } => "prg_file_process_resp",
            Message::ScanTags { .. } => "scan_tags",
            Message::ScanTagsResp { .. } => "scan_tags_resp",
            Message::CheckSchema { .. } => "check_schema",
            Message::CheckSchemaResp { .. } => "check_schema_resp",
            Message::DriverAction { .. } => "driver_action",
            Message::DriverActionResp { .. } => "driver_action_resp",
        }
    }

    /// Requests that only a driver node can serve; an app replies
    /// `GroupNotAllow` without touching its plugin.
    pub fn is_driver_only(&self) -> bool {
        matches!(
            self,
            Message::ReadGroup { .. }
                | Message::ReadGroupPaged { .. }
                | Message::TestReadTag { .. }
                | Message::WriteTag { .. }
                | Message::WriteTags { .. }
                | Message::WriteGtags { .. }
                | Message::AddGroup { .. }
                | Message::DelGroup { .. }
                | Message::UpdateGroup { .. }
                | Message::GetGroup { .. }
                | Message::UpdateDriverGroup { .. }
                | Message::GetDriverGroup { .. }
                | Message::AddTag { .. }
                | Message::DelTag { .. }
                | Message::UpdateTag { .. }
                | Message::AddGtag { .. }
                | Message::GetTag { .. }
                | Message::SubscribeGroup { .. }
                | Message::UnsubscribeGroup { .. }
                | Message::UpdateSubscribeGroup { .. }
                | Message::ScanTags { .. }
                | Message::PrgFileUpload { .. }
                | Message::PrgFileProcess { .. }
                | Message::DriverAction { .. }
        )
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
