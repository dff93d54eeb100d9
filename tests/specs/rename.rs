// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Renaming a polling driver mid-flight: subscribers keep their feed, the
//! metrics reappear under the new name, and the fleet view stays coherent.

use super::fixture::{fleet, wait_until};
use axon_core::Message;
use axon_storage::Store;
use std::time::Duration;

#[test]
fn rename_while_polling_keeps_the_feed_alive() {
    let f = fleet();
    f.add_driver("driverA");
    f.add_group("driverA", "g1", 150);
    f.add_tags("driverA", "g1", &["t1"]);
    f.add_app("app1");
    f.subscribe("app1", "driverA", "g1");
    f.start("driverA");

    assert!(wait_until(Duration::from_secs(5), || {
        f.trans_data_for("app1") >= 2
    }));

    f.expect_success(Message::UpdateNode {
        node: "driverA".into(),
        new_name: "driverB".into(),
    });

    // Polling continues under the new identity
    let before = f.trans_data_for("app1");
    assert!(
        wait_until(Duration::from_secs(5), || f.trans_data_for("app1") > before),
        "subscriber feed died across the rename",
    );

    // The ramp has no duplicate and no gap
    let values = f.values_for("app1", "t1");
    for (i, pair) in values.windows(2).enumerate() {
        let (axon_core::Value::I16(a), axon_core::Value::I16(b)) = (&pair[0], &pair[1]) else {
            panic!("unexpected value type");
        };
        assert_eq!(*b, *a + 1, "tick {i} duplicated or skipped across rename");
    }

    // Metrics re-homed under the new name
    let mut nodes_with_reads = Vec::new();
    f.metrics.visit(0, |node, entry, _| {
        if entry == axon_metrics::names::TAG_READS_TOTAL {
            nodes_with_reads.push(node.to_string());
        }
    });
    assert_eq!(nodes_with_reads, vec!["driverB".to_string()]);

    // The directory answers under the new name only
    match f.request(Message::GetNodeState {
        node: "driverB".into(),
    }) {
        Message::GetNodeStateResp { running, .. } => {
            assert_eq!(running, axon_core::RunningState::Running)
        }
        other => panic!("unexpected {}", other.name()),
    }
    match f.request(Message::GetNodeState {
        node: "driverA".into(),
    }) {
        Message::Error { code } => assert_eq!(code, axon_core::ErrorCode::NodeNotExist),
        other => panic!("unexpected {}", other.name()),
    }
}

#[test]
fn rename_round_trip_is_observably_identical() {
    let f = fleet();
    f.add_driver("d1");
    f.add_group("d1", "g1", 1000);
    f.add_tags("d1", "g1", &["t1"]);
    f.add_app("app1");
    f.subscribe("app1", "d1", "g1");

    f.expect_success(Message::UpdateNode {
        node: "d1".into(),
        new_name: "dX".into(),
    });
    f.expect_success(Message::UpdateNode {
        node: "dX".into(),
        new_name: "d1".into(),
    });

    // Same groups, same subscribers, same store keys
    match f.request(Message::GetGroup { driver: "d1".into() }) {
        Message::GetGroupResp { groups, .. } => {
            assert_eq!(groups.len(), 1);
            assert_eq!(groups[0].tag_count, 1);
        }
        other => panic!("unexpected {}", other.name()),
    }
    let subs = f.store.load_subscriptions("app1").unwrap();
    assert_eq!(subs.len(), 1);
    assert!(subs[0].covers("d1", "g1"));
}
