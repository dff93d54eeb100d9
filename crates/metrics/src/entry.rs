// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric entries: one named observable per node.

use crate::rolling::{RollingCounter, RollingError, WINDOWS_MS};
use thiserror::Error;

/// How an entry reacts to updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Monotone add.
    Counter,
    /// Set to the observed value.
    Gauge,
    /// Add, may be reset by the owner.
    CounterSet,
    /// Record into a sliding window; the value reads as the window sum.
    RollingCounter,
}

/// Errors from metric bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("metric entry not registered: {0}")]
    UnknownEntry(String),
    #[error("metric entry already registered with a different type: {0}")]
    TypeMismatch(String),
    #[error(transparent)]
    Rolling(#[from] RollingError),
}

/// `(name, help, type, init, current)` plus the optional rolling window.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: &'static str,
    pub help: &'static str,
    pub metric_type: MetricType,
    init: u64,
    value: u64,
    /// Survives the reset that node stop performs.
    no_reset: bool,
    rolling: Option<RollingCounter>,
}

impl MetricEntry {
    pub fn new(
        name: &'static str,
        help: &'static str,
        metric_type: MetricType,
        init: u64,
    ) -> Result<Self, MetricsError> {
        let rolling = match metric_type {
            // Default observation window: one minute
            MetricType::RollingCounter => Some(RollingCounter::new(WINDOWS_MS[2])?),
            _ => None,
        };
        Ok(Self {
            name,
            help,
            metric_type,
            init,
            value: init,
            no_reset: false,
            rolling,
        })
    }

    pub fn with_window(mut self, span_ms: u32) -> Result<Self, MetricsError> {
        if self.metric_type == MetricType::RollingCounter {
            self.rolling = Some(RollingCounter::new(span_ms)?);
        }
        Ok(self)
    }

    pub fn no_reset(mut self) -> Self {
        self.no_reset = true;
        self
    }

    pub fn update(&mut self, now_ms: i64, value: u64) {
        match self.metric_type {
            MetricType::Counter | MetricType::CounterSet => self.value += value,
            MetricType::Gauge => self.value = value,
            MetricType::RollingCounter => {
                if let Some(rolling) = self.rolling.as_mut() {
                    rolling.add(now_ms, value as u32);
                    self.value = rolling.total(now_ms);
                }
            }
        }
    }

    pub fn value(&mut self, now_ms: i64) -> u64 {
        if let Some(rolling) = self.rolling.as_mut() {
            self.value = rolling.total(now_ms);
        }
        self.value
    }

    /// Restore the initial value; entries flagged `no_reset` keep counting.
    pub fn reset(&mut self) {
        if self.no_reset {
            return;
        }
        self.value = self.init;
        if let Some(rolling) = self.rolling.as_mut() {
            rolling.clear();
        }
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
