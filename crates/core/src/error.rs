// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-level error taxonomy.
//!
//! Every control-plane response can carry one of these codes. Codes are
//! grouped by the entity they describe (1xxx internal/resource, 2xxx node,
//! 3xxx group, 4xxx tag, 5xxx plugin, 6xxx subscription) and are part of the
//! external contract, so variants keep their numeric value forever.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result-of-operation code carried inside response messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error, Default, PartialOrd, Ord,
)]
#[repr(u32)]
pub enum ErrorCode {
    #[default]
    #[error("success")]
    Success = 0,

    // -- internal / resource --
    #[error("internal error")]
    Internal = 1001,
    #[error("message body malformed")]
    BodyInvalid = 1002,
    #[error("mailbox full, message dropped")]
    MailboxFull = 1010,
    #[error("endpoint send timed out")]
    SendTimeout = 1011,
    #[error("telemetry port already bound")]
    PortInUse = 1012,
    #[error("message exceeds size limit")]
    MsgTooLong = 1013,

    // -- node --
    #[error("node already exists")]
    NodeExist = 2002,
    #[error("node not found")]
    NodeNotExist = 2003,
    #[error("node not ready")]
    NodeNotReady = 2011,
    #[error("node already running")]
    NodeIsRunning = 2012,
    #[error("node not running")]
    NodeNotRunning = 2013,
    #[error("node already stopped")]
    NodeIsStopped = 2014,
    #[error("node name too long")]
    NodeNameTooLong = 2020,
    #[error("node setting rejected")]
    NodeSettingInvalid = 2021,
    #[error("node setting not found")]
    NodeSettingNotFound = 2022,

    // -- group --
    #[error("group already exists")]
    GroupExist = 3002,
    #[error("group not found")]
    GroupNotExist = 3003,
    #[error("group parameter invalid")]
    GroupParameterInvalid = 3011,
    #[error("group operation not allowed on this node")]
    GroupNotAllow = 3012,
    #[error("group limit reached")]
    GroupMaxGroups = 3013,
    #[error("group name too long")]
    GroupNameTooLong = 3014,

    // -- tag --
    #[error("tag name already in use")]
    TagNameConflict = 4002,
    #[error("tag not found")]
    TagNotExist = 4003,
    #[error("tag name too long")]
    TagNameTooLong = 4011,
    #[error("tag address malformed")]
    TagAddressFormatInvalid = 4012,
    #[error("tag attribute not supported")]
    TagAttributeNotSupport = 4013,
    #[error("tag type not supported")]
    TagTypeNotSupport = 4014,
    #[error("tag value expired")]
    TagValueExpired = 4015,
    #[error("tag metadata too long")]
    TagMetaTooLong = 4016,
    #[error("tag is not writable")]
    TagNotAllowWrite = 4017,
    #[error("tag precision out of range")]
    TagPrecisionInvalid = 4018,
    #[error("tag format descriptor too long")]
    TagFormatTooLong = 4019,

    // -- plugin --
    #[error("plugin not found")]
    PluginNotExist = 5003,
    #[error("plugin name too long")]
    PluginNameTooLong = 5011,
    #[error("plugin cannot be removed")]
    PluginNotAllowDelete = 5012,
    #[error("plugin allows a single instance only")]
    PluginSingleInstanceOnly = 5013,
    #[error("plugin schema not found")]
    PluginSchemaNotFound = 5014,
    #[error("plugin library name too long")]
    LibraryNameTooLong = 5015,

    // -- subscription --
    #[error("group not subscribed")]
    GroupNotSubscribe = 6003,
    #[error("group already subscribed")]
    GroupAlreadySubscribed = 6002,
}

impl ErrorCode {
    /// Numeric wire value of the code.
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }

    /// Collapse a `Result` carrying a code into the code itself.
    pub fn from_result(res: Result<(), ErrorCode>) -> Self {
        match res {
            Ok(()) => ErrorCode::Success,
            Err(code) => code,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
