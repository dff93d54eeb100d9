// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-sender FIFO through the bus: one sender's envelopes arrive in send
//! order regardless of reactor scheduling.

use axon_bus::{endpoint, Reactor};
use axon_core::{Envelope, Message};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn per_sender_fifo_holds_under_concurrency() {
    let reactor = Reactor::new();
    let (tx, rx) = endpoint();
    let seen: Arc<Mutex<Vec<(String, u64)>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let seen = Arc::clone(&seen);
        rx.register(
            &reactor,
            move |env| seen.lock().push((env.sender.clone(), env.context)),
            |_| {},
        )
        .unwrap();
    }

    // Two senders interleave on their own threads
    let threads: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|sender| {
            let tx = tx.clone();
            std::thread::spawn(move || {
                for i in 0..200u64 {
                    tx.send(
                        Envelope::new(sender, "receiver", Message::GetNodesState)
                            .with_context(i),
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    std::thread::sleep(Duration::from_millis(300));
    let seen = seen.lock();
    assert_eq!(seen.len(), 400);

    // Each sender's sequence is strictly increasing; cross-sender order is
    // unconstrained
    for sender in ["a", "b"] {
        let sequence: Vec<u64> = seen
            .iter()
            .filter(|(s, _)| s == sender)
            .map(|(_, i)| *i)
            .collect();
        let expected: Vec<u64> = (0..200).collect();
        assert_eq!(sequence, expected, "sender {sender} reordered");
    }
}
