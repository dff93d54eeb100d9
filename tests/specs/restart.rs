// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart durability on the file store: the fleet, tags and the CID report
//! descriptor come back exactly as configured.

use super::fixture::{fleet_with_store, wait_until};
use axon_core::Message;
use axon_storage::FileStore;
use std::sync::Arc;
use std::time::Duration;

const CID_CONTEXT: &str = "ctl|ied1|ldevice0|PROT|buffered|reportA|rid-7|dataset3";

#[test]
fn cid_group_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("axon.json");

    {
        let f = fleet_with_store(Arc::new(FileStore::open(&path).unwrap()));
        f.add_driver("ied-gw");
        f.expect_success(Message::AddGroup {
            driver: "ied-gw".into(),
            group: "reports".into(),
            interval_ms: 250,
            context: Some(CID_CONTEXT.into()),
        });
        f.add_tags("ied-gw", "reports", &["stVal", "q"]);
        f.add_app("scada");
        f.subscribe("scada", "ied-gw", "reports");
        f.start("ied-gw");
        f.manager.close();
    }

    // Cold start over the same file
    let f = fleet_with_store(Arc::new(FileStore::open(&path).unwrap()));

    // Same descriptor, same tags
    match f.request(Message::GetGroup {
        driver: "ied-gw".into(),
    }) {
        Message::GetGroupResp { groups, .. } => {
            assert_eq!(groups.len(), 1);
            assert_eq!(groups[0].name, "reports");
            assert_eq!(groups[0].interval_ms, 250);
            assert_eq!(groups[0].tag_count, 2);
            assert_eq!(groups[0].context.as_deref(), Some(CID_CONTEXT));
        }
        other => panic!("unexpected {}", other.name()),
    }

    // The subscription was restored and the auto-started driver is feeding
    // the app again
    assert!(
        wait_until(Duration::from_secs(5), || f.trans_data_for("scada") >= 2),
        "restored subscription produced no telemetry",
    );
}

#[test]
fn setting_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("axon.json");

    {
        let f = fleet_with_store(Arc::new(FileStore::open(&path).unwrap()));
        f.add_driver("d1");
        f.manager.close();
    }

    let f = fleet_with_store(Arc::new(FileStore::open(&path).unwrap()));
    match f.request(Message::GetNodeSetting { node: "d1".into() }) {
        Message::GetNodeSettingResp { setting, .. } => {
            assert_eq!(setting, "{\"host\":\"sim\"}")
        }
        other => panic!("unexpected {}", other.name()),
    }
    // A setting on record means the node restarts READY
    match f.request(Message::GetNodeState { node: "d1".into() }) {
        Message::GetNodeStateResp { running, .. } => {
            assert_eq!(running, axon_core::RunningState::Ready)
        }
        other => panic!("unexpected {}", other.name()),
    }
}
