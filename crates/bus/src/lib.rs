// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! axon-bus: event reactor, node endpoints and telemetry mailbox

pub mod channel;
pub mod mailbox;
pub mod reactor;

pub use channel::{endpoint, EndpointReceiver, EndpointSender, PortTable, SendError};
pub use mailbox::{Mailbox, PushError};
pub use reactor::{
    IoEvent, IoHandle, IoNotifier, IoRegistration, Reactor, ReactorError, TimerHandle, TimerMode,
};
