// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-threaded reactor multiplexing I/O readiness and timers.
//!
//! All registrations share one fixed pool of type-tagged slots, so waking up
//! and finding the right callback is O(1). Each slot carries its own mutex;
//! `del_io`/`del_timer` take it before releasing the slot, which makes
//! deletion safe against an in-flight callback from any thread. The loop
//! never sleeps longer than one second so the stop flag is observed promptly.
//!
//! Callbacks run on the reactor thread and must not delete their own
//! registration (the slot mutex is held while they run); deleting any other
//! slot, or registering new ones, is fine.

use axon_core::limits::REACTOR_SLOTS;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Longest kernel-wait before the stop flag is rechecked.
const WAIT_SLICE: Duration = Duration::from_millis(1000);

/// What happened on a registered I/O source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEvent {
    /// Data is ready to drain.
    Read,
    /// The peer endpoint is gone.
    Closed,
    /// The source is unusable and should be deregistered.
    Hup,
}

/// Re-arm discipline of a periodic timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Re-arm on schedule; missed ticks are coalesced into one.
    NonBlock,
    /// Re-arm the full period after the callback returns. Used when the
    /// callback may outlast the period and missed ticks are preferable to
    /// overlapping runs.
    Block,
}

/// Errors from reactor registration and shutdown.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("all {0} reactor slots are in use")]
    SlotsExhausted(usize),
    #[error("reactor is shut down")]
    Closed,
}

type IoCallback = Box<dyn FnMut(IoEvent) + Send>;
type TimerCallback = Box<dyn FnMut() + Send>;

struct IoState {
    callback: IoCallback,
    stopped: bool,
}

struct TimerState {
    callback: TimerCallback,
    period: Duration,
    mode: TimerMode,
    next_fire: Instant,
    stopped: bool,
    paused: bool,
}

enum Slot {
    Io {
        token: u64,
        state: Arc<Mutex<IoState>>,
    },
    Timer {
        token: u64,
        state: Arc<Mutex<TimerState>>,
    },
}

enum Wake {
    Io {
        index: usize,
        token: u64,
        event: IoEvent,
    },
    Recheck,
}

/// Handle to a registered I/O source.
#[derive(Debug, Clone)]
pub struct IoHandle {
    index: usize,
    token: u64,
}

/// Handle to a registered timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    index: usize,
    token: u64,
}

/// Producer-side readiness signal for a registered I/O source.
#[derive(Clone)]
pub struct IoNotifier {
    tx: Sender<Wake>,
    index: usize,
    token: u64,
}

impl IoNotifier {
    pub fn notify(&self, event: IoEvent) {
        let _ = self.tx.send(Wake::Io {
            index: self.index,
            token: self.token,
            event,
        });
    }
}

/// An I/O registration: the deletion handle plus the readiness notifier.
pub struct IoRegistration {
    pub handle: IoHandle,
    pub notifier: IoNotifier,
}

struct Shared {
    slots: Mutex<Vec<Option<Slot>>>,
    next_token: AtomicU64,
    stop: AtomicBool,
    wake_tx: Sender<Wake>,
}

/// One reactor instance owning one loop thread.
pub struct Reactor {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Reactor {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = unbounded();
        let shared = Arc::new(Shared {
            slots: Mutex::new((0..REACTOR_SLOTS).map(|_| None).collect()),
            next_token: AtomicU64::new(1),
            stop: AtomicBool::new(false),
            wake_tx,
        });
        let loop_shared = Arc::clone(&shared);
        let thread = match std::thread::Builder::new()
            .name("axon-reactor".into())
            .spawn(move || run_loop(loop_shared, wake_rx))
        {
            Ok(thread) => Some(thread),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn reactor thread");
                None
            }
        };
        Self {
            shared,
            thread: Mutex::new(thread),
        }
    }

    fn claim_slot(&self, slot: Slot) -> Result<usize, ReactorError> {
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(ReactorError::Closed);
        }
        let mut slots = self.shared.slots.lock();
        let index = slots
            .iter()
            .position(Option::is_none)
            .ok_or(ReactorError::SlotsExhausted(REACTOR_SLOTS))?;
        slots[index] = Some(slot);
        Ok(index)
    }

    /// Register an I/O source; the returned notifier marks it readable.
    pub fn add_io<F>(&self, callback: F) -> Result<IoRegistration, ReactorError>
    where
        F: FnMut(IoEvent) + Send + 'static,
    {
        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(Mutex::new(IoState {
            callback: Box::new(callback),
            stopped: false,
        }));
        let index = self.claim_slot(Slot::Io { token, state })?;
        Ok(IoRegistration {
            handle: IoHandle { index, token },
            notifier: IoNotifier {
                tx: self.shared.wake_tx.clone(),
                index,
                token,
            },
        })
    }

    /// Register a periodic timer; the first fire is one period from now.
    pub fn add_timer<F>(
        &self,
        period: Duration,
        mode: TimerMode,
        callback: F,
    ) -> Result<TimerHandle, ReactorError>
    where
        F: FnMut() + Send + 'static,
    {
        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(Mutex::new(TimerState {
            callback: Box::new(callback),
            period,
            mode,
            next_fire: Instant::now() + period,
            stopped: false,
            paused: false,
        }));
        let index = self.claim_slot(Slot::Timer { token, state })?;
        let _ = self.shared.wake_tx.send(Wake::Recheck);
        Ok(TimerHandle { index, token })
    }

    /// Idempotent removal; blocks until an in-flight callback returns.
    pub fn del_io(&self, handle: &IoHandle) {
        let taken = {
            let mut slots = self.shared.slots.lock();
            let matched = matches!(
                slots.get(handle.index),
                Some(Some(Slot::Io { token, .. })) if *token == handle.token
            );
            if matched {
                slots.get_mut(handle.index).and_then(Option::take)
            } else {
                None
            }
        };
        if let Some(Slot::Io { state, .. }) = taken {
            state.lock().stopped = true;
        }
    }

    /// Idempotent removal; blocks until an in-flight callback returns.
    pub fn del_timer(&self, handle: &TimerHandle) {
        let taken = {
            let mut slots = self.shared.slots.lock();
            let matched = matches!(
                slots.get(handle.index),
                Some(Some(Slot::Timer { token, .. })) if *token == handle.token
            );
            if matched {
                slots.get_mut(handle.index).and_then(Option::take)
            } else {
                None
            }
        };
        if let Some(Slot::Timer { state, .. }) = taken {
            state.lock().stopped = true;
        }
    }

    /// Suspend a timer without releasing its slot.
    pub fn pause_timer(&self, handle: &TimerHandle) {
        if let Some(state) = self.timer_state(handle) {
            state.lock().paused = true;
        }
    }

    /// Resume a paused timer; the next fire is one full period away.
    pub fn resume_timer(&self, handle: &TimerHandle) {
        if let Some(state) = self.timer_state(handle) {
            let mut guard = state.lock();
            guard.paused = false;
            guard.next_fire = Instant::now() + guard.period;
        }
        let _ = self.shared.wake_tx.send(Wake::Recheck);
    }

    fn timer_state(&self, handle: &TimerHandle) -> Option<Arc<Mutex<TimerState>>> {
        let slots = self.shared.slots.lock();
        match slots.get(handle.index) {
            Some(Some(Slot::Timer { token, state })) if *token == handle.token => {
                Some(Arc::clone(state))
            }
            _ => None,
        }
    }

    /// Stop the loop, join the thread and release every slot.
    pub fn close(&self) {
        self.shared.stop.store(true, Ordering::Release);
        let _ = self.shared.wake_tx.send(Wake::Recheck);
        if let Some(thread) = self.thread.lock().take() {
            let _ = thread.join();
        }
        self.shared.slots.lock().iter_mut().for_each(|s| *s = None);
        debug!("reactor closed");
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_loop(shared: Arc<Shared>, wake_rx: Receiver<Wake>) {
    while !shared.stop.load(Ordering::Acquire) {
        let timeout = next_wait(&shared);
        match wake_rx.recv_timeout(timeout) {
            Ok(Wake::Io {
                index,
                token,
                event,
            }) => {
                let state = {
                    let slots = shared.slots.lock();
                    match slots.get(index) {
                        Some(Some(Slot::Io { token: t, state })) if *t == token => {
                            Some(Arc::clone(state))
                        }
                        _ => None,
                    }
                };
                if let Some(state) = state {
                    let mut guard = state.lock();
                    if !guard.stopped {
                        (guard.callback)(event);
                    }
                }
            }
            Ok(Wake::Recheck) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        fire_due_timers(&shared);
    }
}

fn next_wait(shared: &Shared) -> Duration {
    let now = Instant::now();
    let mut next: Option<Instant> = None;
    let slots = shared.slots.lock();
    for slot in slots.iter().flatten() {
        if let Slot::Timer { state, .. } = slot {
            let guard = state.lock();
            if guard.stopped || guard.paused {
                continue;
            }
            next = Some(match next {
                Some(n) => n.min(guard.next_fire),
                None => guard.next_fire,
            });
        }
    }
    match next {
        Some(deadline) => deadline.saturating_duration_since(now).min(WAIT_SLICE),
        None => WAIT_SLICE,
    }
}

fn fire_due_timers(shared: &Shared) {
    let now = Instant::now();
    let due: Vec<Arc<Mutex<TimerState>>> = {
        let slots = shared.slots.lock();
        slots
            .iter()
            .flatten()
            .filter_map(|slot| match slot {
                Slot::Timer { state, .. } => {
                    let guard = state.lock();
                    (!guard.stopped && !guard.paused && guard.next_fire <= now)
                        .then(|| Arc::clone(state))
                }
                Slot::Io { .. } => None,
            })
            .collect()
    };

    for state in due {
        let mut guard = state.lock();
        // Deletion or pause may have won the race since the scan
        if guard.stopped || guard.paused || guard.next_fire > now {
            continue;
        }
        match guard.mode {
            TimerMode::NonBlock => {
                let period = guard.period;
                guard.next_fire += period;
                if guard.next_fire <= now {
                    // Coalesce missed ticks into a single fire
                    guard.next_fire = now + guard.period;
                }
                (guard.callback)();
            }
            TimerMode::Block => {
                (guard.callback)();
                guard.next_fire = Instant::now() + guard.period;
            }
        }
    }
}

#[cfg(test)]
#[path = "reactor_tests.rs"]
mod tests;
