// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox overflow arithmetic: exactly the capacity is admitted, every
//! rejected delivery releases its payload reference, and the shared payload
//! is freed exactly once.

use axon_bus::{Mailbox, PushError};
use axon_core::envelope::TransPayload;
use axon_core::{Envelope, Message, TagValueMeta, Value};
use std::sync::Arc;

#[test]
fn burst_of_2000_admits_1024_and_balances_refcounts() {
    let mailbox: Mailbox<Envelope> = Mailbox::new();
    let payload = TransPayload::new(
        "d1",
        "g1",
        vec![TagValueMeta::new("t1", Value::I16(1))],
    );
    let weak = Arc::downgrade(&payload);

    let mut dropped = 0;
    for _ in 0..2000 {
        let env = Envelope::new(
            "d1",
            "app1",
            Message::TransData {
                payload: Arc::clone(&payload),
            },
        );
        match mailbox.push(env) {
            Ok(()) => {}
            Err(PushError::Full(env)) => {
                dropped += 1;
                drop(env); // the drop releases this delivery's reference
            }
            Err(PushError::Closed(_)) => panic!("mailbox closed unexpectedly"),
        }
    }
    assert_eq!(dropped, 976);
    assert_eq!(mailbox.len(), 1024);

    // 1024 queued references + the local one
    assert_eq!(Arc::strong_count(&payload), 1025);

    // The consumer drains each message exactly once
    let mut consumed = 0;
    while !mailbox.is_empty() {
        let env = mailbox.pop().expect("queued message vanished");
        assert!(matches!(env.message, Message::TransData { .. }));
        consumed += 1;
    }
    assert_eq!(consumed, 1024);

    drop(payload);
    assert!(
        weak.upgrade().is_none(),
        "payload must be freed exactly once, after the last reference",
    );
}

#[test]
fn multiple_overflowing_mailboxes_balance_one_broadcast() {
    // Three subscribers, all with tiny mailboxes; the same broadcast
    // overflows everywhere and still frees cleanly
    let payload = TransPayload::new("d1", "g1", Vec::new());
    let weak = Arc::downgrade(&payload);
    let mailboxes: Vec<Mailbox<Envelope>> = (0..3).map(|_| Mailbox::with_capacity(1)).collect();

    for (i, mailbox) in mailboxes.iter().enumerate() {
        for _ in 0..5 {
            let env = Envelope::new(
                "d1",
                format!("app{i}"),
                Message::TransData {
                    payload: Arc::clone(&payload),
                },
            );
            // Overflow drops are released at the push site
            let _ = mailbox.push(env);
        }
    }

    // One queued reference per mailbox survives
    assert_eq!(Arc::strong_count(&payload), 4);
    for mailbox in &mailboxes {
        mailbox.close();
    }
    drop(payload);
    assert!(weak.upgrade().is_none());
}
