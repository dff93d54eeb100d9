// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interval changes re-pace polling from the last fire, never early.

use super::fixture::{fleet, wait_until};
use axon_core::Message;
use std::time::{Duration, Instant};

#[test]
fn interval_change_defers_the_next_poll() {
    let f = fleet();
    f.add_driver("d1");
    f.add_group("d1", "g1", 200);
    f.add_tags("d1", "g1", &["t1"]);
    f.add_app("app1");
    f.subscribe("app1", "d1", "g1");
    f.start("d1");

    assert!(wait_until(Duration::from_secs(5), || {
        f.trans_data_for("app1") >= 2
    }));

    // Widen the interval right after a poll
    f.expect_success(Message::UpdateGroup {
        driver: "d1".into(),
        group: "g1".into(),
        new_name: None,
        interval_ms: Some(800),
    });
    let at_change = f.trans_data_for("app1");
    let changed_at = Instant::now();

    // The next poll respects the new pace: nothing within the old interval
    std::thread::sleep(Duration::from_millis(300));
    assert!(
        f.trans_data_for("app1") <= at_change + 1,
        "old 200ms cadence persisted after the interval change",
    );

    assert!(wait_until(Duration::from_secs(5), || {
        f.trans_data_for("app1") > at_change
    }));
    // Poll cadence after the change is the new interval, give or take the
    // base tick
    assert!(
        changed_at.elapsed() >= Duration::from_millis(400),
        "next poll arrived on the old cadence",
    );
}
