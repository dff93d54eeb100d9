// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulator plugins for tests and bench fixtures.
//!
//! `SimDriver` serves ramp values (each read of a tag returns the previous
//! value plus one) so ordering and cadence are observable; `SimApp` records
//! everything delivered to it.

use crate::plugin::{
    CachePolicy, DriverPlugin, Plugin, ScanResult, WriteOutcome, WriteRequest, WriteResponder,
};
use axon_core::{
    DataType, Envelope, ErrorCode, LinkState, Message, PrgFileState, Tag, TagValueMeta, Value,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// South-bound simulator: a device whose registers count upward.
pub struct SimDriver {
    started: bool,
    config: Option<String>,
    cache_policy: CachePolicy,
    ramps: Mutex<HashMap<String, i64>>,
    writes: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDriver {
    pub fn new() -> Self {
        Self {
            started: false,
            config: None,
            cache_policy: CachePolicy::Interval,
            ramps: Mutex::new(HashMap::new()),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Shared view of accepted writes, for assertions.
    pub fn write_log(&self) -> Arc<Mutex<Vec<(String, Value)>>> {
        Arc::clone(&self.writes)
    }

    fn ramp_value(&self, tag: &Tag) -> Value {
        let mut ramps = self.ramps.lock();
        let counter = ramps.entry(tag.name.clone()).or_insert(0);
        *counter += 1;
        let n = *counter;
        match tag.data_type {
            DataType::Bool => Value::Bool(n % 2 == 1),
            DataType::Int8 => Value::I8(n as i8),
            DataType::Int16 => Value::I16(n as i16),
            DataType::Int32 => Value::I32(n as i32),
            DataType::Int64 => Value::I64(n),
            DataType::Uint8 => Value::U8(n as u8),
            DataType::Uint16 => Value::U16(n as u16),
            DataType::Uint32 => Value::U32(n as u32),
            DataType::Uint64 => Value::U64(n as u64),
            DataType::Float => Value::F32(n as f32),
            DataType::Double => Value::F64(n as f64),
            DataType::String => Value::Str(format!("s{n}")),
            _ => Value::I64(n),
        }
    }
}

impl Plugin for SimDriver {
    fn init(&mut self, _load: bool) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), ErrorCode> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ErrorCode> {
        self.started = false;
        Ok(())
    }

    fn setting(&mut self, config: &str) -> Result<(), ErrorCode> {
        if config.trim().is_empty() || config.contains("reject") {
            return Err(ErrorCode::NodeSettingInvalid);
        }
        self.config = Some(config.to_string());
        Ok(())
    }

    fn request(&mut self, _envelope: &Envelope) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn link_state(&self) -> LinkState {
        if self.started {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }
}

impl DriverPlugin for SimDriver {
    fn validate_tag(&self, tag: &Tag) -> Result<(), ErrorCode> {
        tag.validate()?;
        // The simulated device refuses a reserved address range
        if tag.address.starts_with("bad") {
            return Err(ErrorCode::TagAddressFormatInvalid);
        }
        Ok(())
    }

    fn read_batch(&mut self, _group: &str, tags: &[Tag]) -> Vec<TagValueMeta> {
        tags.iter()
            .map(|tag| TagValueMeta::new(tag.name.clone(), self.ramp_value(tag)))
            .collect()
    }

    fn write(&mut self, request: WriteRequest, responder: &WriteResponder) -> WriteOutcome {
        for tv in &request.tags {
            self.writes.lock().push((tv.tag.clone(), tv.value.clone()));
        }
        let _ = responder;
        WriteOutcome::Done(ErrorCode::Success)
    }

    fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    fn test_read(&mut self, tag: &Tag) -> Result<Value, ErrorCode> {
        self.validate_tag(tag)?;
        Ok(self.ramp_value(tag))
    }

    fn scan_tags(&mut self, ctx: &str) -> Result<ScanResult, ErrorCode> {
        // Four discoverable registers, served two per page; ctx is the
        // next scan position
        const DISCOVERABLE: usize = 4;
        const PAGE: usize = 2;
        let start: usize = if ctx.is_empty() {
            0
        } else {
            ctx.parse().map_err(|_| ErrorCode::BodyInvalid)?
        };
        let end = (start + PAGE).min(DISCOVERABLE);
        let tags = (start..end)
            .map(|i| Tag::new(format!("discovered{i}"), format!("4001{i}"), DataType::Int16))
            .collect();
        Ok(ScanResult {
            tags,
            data_type: Some(DataType::Int16),
            is_array: false,
            is_last: end >= DISCOVERABLE,
            ctx: end.to_string(),
        })
    }

    fn action(&mut self, action: &str) -> Result<Option<String>, ErrorCode> {
        Ok(Some(format!("ack:{action}")))
    }

    fn prg_file(&mut self, _name: &str, data: &[u8]) -> Result<(), ErrorCode> {
        if data.is_empty() {
            return Err(ErrorCode::BodyInvalid);
        }
        Ok(())
    }

    fn prg_file_state(&mut self) -> (PrgFileState, Option<String>) {
        (PrgFileState::Done, None)
    }
}

/// Everything a `SimApp` observed, shared with the test.
#[derive(Default)]
pub struct SimAppState {
    pub requests: Mutex<Vec<Envelope>>,
}

impl SimAppState {
    pub fn trans_data_count(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|env| matches!(env.message, Message::TransData { .. }))
            .count()
    }

    /// Telemetry payload values for one tag, in arrival order.
    pub fn values_of(&self, tag: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter_map(|env| match &env.message {
                Message::TransData { payload } => payload
                    .tags
                    .iter()
                    .find(|s| s.tag == tag)
                    .map(|s| s.value.clone()),
                _ => None,
            })
            .collect()
    }
}

/// North-bound simulator: records every delivery.
pub struct SimApp {
    state: Arc<SimAppState>,
    started: bool,
}

impl Default for SimApp {
    fn default() -> Self {
        Self::new()
    }
}

impl SimApp {
    pub fn new() -> Self {
        Self::with_state(Arc::new(SimAppState::default()))
    }

    /// Share one observation log across instances, e.g. when a plugin
    /// factory builds the app and the test needs to see what it received.
    pub fn with_state(state: Arc<SimAppState>) -> Self {
        Self {
            state,
            started: false,
        }
    }

    pub fn state(&self) -> Arc<SimAppState> {
        Arc::clone(&self.state)
    }
}

impl Plugin for SimApp {
    fn init(&mut self, _load: bool) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), ErrorCode> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ErrorCode> {
        self.started = false;
        Ok(())
    }

    fn setting(&mut self, config: &str) -> Result<(), ErrorCode> {
        if config.trim().is_empty() {
            return Err(ErrorCode::NodeSettingInvalid);
        }
        Ok(())
    }

    fn request(&mut self, envelope: &Envelope) -> Result<(), ErrorCode> {
        self.state.requests.lock().push(envelope.clone());
        Ok(())
    }

    fn link_state(&self) -> LinkState {
        if self.started {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }
}
