// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriptions: an app's declaration of interest in a driver's group.

use serde::{Deserialize, Serialize};

/// Unique per `(app, driver, group)`; destroyed with the app or the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub app: String,
    pub driver: String,
    pub group: String,
    /// Opaque app-defined JSON blob, e.g. an MQTT topic override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    /// Opaque JSON set of tags served without polling the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_tags: Option<String>,
}

impl Subscription {
    pub fn new(
        app: impl Into<String>,
        driver: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            driver: driver.into(),
            group: group.into(),
            params: None,
            static_tags: None,
        }
    }

    /// True when this subscription names the given driver/group pair.
    pub fn covers(&self, driver: &str, group: &str) -> bool {
        self.driver == driver && self.group == group
    }
}
