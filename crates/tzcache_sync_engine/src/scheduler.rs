//! Background refresh loop.
//!
//! One thread per store. Each cycle opens a session (taking the store lock),
//! runs [`SyncEngine::synchronize_from_primary`], closes the session and then
//! sleeps on a condition variable for `refresh_delay`, or for
//! `min(refresh_delay, failure_retry_cap)` after a failed cycle. The sleep
//! ends early on [`RefreshScheduler::check_now`], [`RefreshScheduler::refresh_now`]
//! or [`RefreshScheduler::stop`].

use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::transport::PrimarySource;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tzcache_core::Store;

#[derive(Debug, Default)]
struct LoopState {
    stop: bool,
    check_requested: bool,
    running: bool,
    exited: bool,
    cycles_completed: u64,
    last_success: Option<bool>,
    next_wait: Option<Duration>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LoopState>,
    wake: Condvar,
    cycle_done: Condvar,
}

/// Owns the refresh thread of one store.
pub struct RefreshScheduler {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    /// Starts the refresh thread. The first cycle runs immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start<P>(store: Arc<Store>, engine: Arc<SyncEngine<P>>) -> SyncResult<Self>
    where
        P: PrimarySource + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("tzcache-refresh".into())
            .spawn(move || refresh_loop(&worker, &store, &engine))?;
        info!("refresh scheduler started");
        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Wakes the loop so the next cycle starts now. Does not wait for it.
    pub fn check_now(&self) {
        let mut state = self.shared.state.lock();
        state.check_requested = true;
        self.shared.wake.notify_all();
    }

    /// Runs a cycle now and waits for it. Returns whether it succeeded.
    ///
    /// A cycle already in progress does not count; the call waits for one
    /// that started after it. Returns `false` if the scheduler is stopped.
    pub fn refresh_now(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.exited || state.stop {
            return false;
        }
        let target = state.cycles_completed + if state.running { 2 } else { 1 };
        state.check_requested = true;
        self.shared.wake.notify_all();

        while state.cycles_completed < target && !state.exited {
            self.shared.cycle_done.wait(&mut state);
        }
        state.cycles_completed >= target && state.last_success == Some(true)
    }

    /// Stops the loop after the current cycle and joins the thread.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!("refresh thread panicked");
            }
            info!("refresh scheduler stopped");
        }
    }

    /// Whether the thread is still running.
    pub fn is_running(&self) -> bool {
        !self.shared.state.lock().exited
    }

    /// Number of cycles completed so far.
    pub fn cycles_completed(&self) -> u64 {
        self.shared.state.lock().cycles_completed
    }

    /// The wait chosen after the last cycle.
    pub fn next_wait(&self) -> Option<Duration> {
        self.shared.state.lock().next_wait
    }

    /// Whether the last cycle succeeded.
    pub fn last_success(&self) -> Option<bool> {
        self.shared.state.lock().last_success
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("state", &*self.shared.state.lock())
            .finish_non_exhaustive()
    }
}

fn refresh_loop<P: PrimarySource>(shared: &Shared, store: &Store, engine: &SyncEngine<P>) {
    loop {
        {
            let mut state = shared.state.lock();
            if state.stop {
                break;
            }
            state.check_requested = false;
            state.running = true;
        }

        let success = run_cycle(store, engine);
        let wait = store.config().next_wait(success);

        let mut state = shared.state.lock();
        state.running = false;
        state.cycles_completed += 1;
        state.last_success = Some(success);
        state.next_wait = Some(wait);
        shared.cycle_done.notify_all();
        debug!(success, ?wait, "refresh cycle finished");

        let deadline = Instant::now() + wait;
        while !state.stop && !state.check_requested {
            if shared.wake.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
    }

    let mut state = shared.state.lock();
    state.exited = true;
    shared.cycle_done.notify_all();
}

fn run_cycle<P: PrimarySource>(store: &Store, engine: &SyncEngine<P>) -> bool {
    let mut session = match store.session() {
        Ok(session) => session,
        Err(err) => {
            warn!(error = %err, "failed to open store for refresh");
            engine.record_failed_cycle(err.to_string());
            return false;
        }
    };
    match engine.synchronize_from_primary(&mut session) {
        Ok(outcome) => outcome.success,
        Err(err) => {
            error!(error = %err, "refresh cycle failed");
            false
        }
    }
}
