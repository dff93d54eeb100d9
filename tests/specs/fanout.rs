// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two apps on one group: every poll fans out one shared payload per
//! subscriber, values arrive in poll order, and the driver's read counter
//! tracks tags-per-poll.

use super::fixture::{fleet, wait_until};
use axon_core::{Message, Value};
use std::time::Duration;

#[test]
fn two_subscribers_see_the_same_ramp() {
    let f = fleet();
    f.add_driver("d1");
    f.add_group("d1", "g1", 200);
    f.add_tags("d1", "g1", &["t1", "t2", "t3"]);
    f.add_app("app1");
    f.add_app("app2");
    f.subscribe("app1", "d1", "g1");
    f.subscribe("app2", "d1", "g1");
    f.start("d1");

    // Three polls for both apps
    assert!(
        wait_until(Duration::from_secs(5), || {
            f.trans_data_for("app1") >= 3 && f.trans_data_for("app2") >= 3
        }),
        "expected 3 polls for each app, got {}/{}",
        f.trans_data_for("app1"),
        f.trans_data_for("app2"),
    );

    // Per-group ordering: poll i+1 never overtakes poll i
    for app in ["app1", "app2"] {
        for tag in ["t1", "t2", "t3"] {
            let values = f.values_for(app, tag);
            let expected: Vec<Value> = (1..=values.len() as i16).map(Value::I16).collect();
            assert_eq!(values, expected, "{app}/{tag} out of order");
        }
    }

    // The read counter counts tags per poll, not per subscriber; after
    // exactly 3 polls it reads 9
    let polls = f.trans_data_for("app1").min(f.trans_data_for("app2"));
    let mut reads = None;
    f.metrics.visit(0, |node, entry, value| {
        if node == "d1" && entry == axon_metrics::names::TAG_READS_TOTAL {
            reads = Some(value);
        }
    });
    let reads = reads.expect("driver metrics missing");
    assert!(
        reads >= 3 * polls as u64,
        "tag reads {reads} below 3 per poll",
    );
    assert_eq!(reads % 3, 0, "reads must come in whole polls of 3 tags");
}

#[test]
fn unsubscribed_app_stops_receiving() {
    let f = fleet();
    f.add_driver("d1");
    f.add_group("d1", "g1", 150);
    f.add_tags("d1", "g1", &["t1"]);
    f.add_app("app1");
    f.subscribe("app1", "d1", "g1");
    f.start("d1");

    assert!(wait_until(Duration::from_secs(5), || {
        f.trans_data_for("app1") >= 2
    }));

    f.expect_success(Message::UnsubscribeGroup {
        app: "app1".into(),
        driver: "d1".into(),
        group: "g1".into(),
    });

    // Let in-flight deliveries settle, then confirm silence
    std::thread::sleep(Duration::from_millis(300));
    let settled = f.trans_data_for("app1");
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(f.trans_data_for("app1"), settled);
}
