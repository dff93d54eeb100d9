// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! axon-core: data model and message taxonomy for the Axon broker

pub mod clock;
pub mod envelope;
pub mod error;
pub mod group;
pub mod limits;
pub mod message;
pub mod node;
pub mod plugin;
pub mod subscription;
pub mod tag;
pub mod value;

pub use clock::{Clock, FakeClock, SystemClock};
pub use envelope::{Envelope, TraceKind, TransPayload};
pub use error::ErrorCode;
pub use group::{Group, GroupSnapshot, TagQuery};
pub use message::{
    GroupInfo, GroupTagValues, GtagGroup, JsonKind, Message, NodeCtlCmd, NodeInfo, NodeStateInfo,
    PrgFileState, SubDriverTags, SubscribeEntry, TagValue, TagValueMeta,
};
pub use node::{log_category, LinkState, LogLevel, NodeKind, RunningState};
pub use plugin::{PluginDescriptor, PluginKind};
pub use subscription::Subscription;
pub use tag::{AddrOption, ByteOrder16, ByteOrder32, ByteOrder64, StrEncoding, Tag, TagAttr};
pub use value::{DataType, Value};
