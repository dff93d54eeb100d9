// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn codes_are_stable() {
    assert_eq!(ErrorCode::Success.code(), 0);
    assert_eq!(ErrorCode::NodeNotReady.code(), 2011);
    assert_eq!(ErrorCode::GroupNotAllow.code(), 3012);
    assert_eq!(ErrorCode::TagValueExpired.code(), 4015);
    assert_eq!(ErrorCode::GroupNotSubscribe.code(), 6003);
}

#[test]
fn success_helpers() {
    assert!(ErrorCode::Success.is_success());
    assert!(!ErrorCode::Internal.is_success());
    assert_eq!(ErrorCode::from_result(Ok(())), ErrorCode::Success);
    assert_eq!(
        ErrorCode::from_result(Err(ErrorCode::TagNotExist)),
        ErrorCode::TagNotExist
    );
}

#[test]
fn display_is_human_readable() {
    assert_eq!(ErrorCode::MailboxFull.to_string(), "mailbox full, message dropped");
}
